//! Single-flight "new collection" flow: collection, first flow, then the builder.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::protocol::{Collection, CreateCollectionRequest, CreateFlowRequest, Flow};
use tracing::{error, info, warn};

use crate::{
    error::{bounded, ConsoleError, RequestError},
    CollectionStore, NavigationTarget, Navigator, ProjectContext,
};

pub const NEW_COLLECTION_QUERY_PARAM: &str = "newCollection";

#[derive(Debug, Clone, PartialEq)]
pub enum CreationOutcome {
    /// Another creation is still running; nothing was sent.
    AlreadyInProgress,
    Created { collection: Collection, flow: Flow },
}

#[derive(Debug, Clone)]
pub struct CreationNames {
    pub collection: String,
    pub first_flow: String,
}

impl Default for CreationNames {
    fn default() -> Self {
        Self {
            collection: "Untitled".into(),
            first_flow: "Flow 1".into(),
        }
    }
}

struct GuardRelease<'a>(&'a AtomicBool);

impl Drop for GuardRelease<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct CreationFlow {
    store: Arc<dyn CollectionStore>,
    project: Arc<dyn ProjectContext>,
    navigator: Arc<dyn Navigator>,
    names: CreationNames,
    request_timeout: Duration,
    creating: AtomicBool,
}

impl CreationFlow {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        project: Arc<dyn ProjectContext>,
        navigator: Arc<dyn Navigator>,
        names: CreationNames,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            project,
            navigator,
            names,
            request_timeout,
            creating: AtomicBool::new(false),
        }
    }

    pub fn is_creating(&self) -> bool {
        self.creating.load(Ordering::SeqCst)
    }

    pub async fn create_collection(&self) -> Result<CreationOutcome, ConsoleError> {
        if self
            .creating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("collection creation already in progress; skipping duplicate trigger");
            return Ok(CreationOutcome::AlreadyInProgress);
        }
        let _release = GuardRelease(&self.creating);

        let project_id = self
            .project
            .current_project_id()
            .map_err(|err| ConsoleError::Create {
                source: RequestError::Store(err),
            })?;

        let collection = bounded(
            self.request_timeout,
            self.store.create_collection(CreateCollectionRequest {
                project_id,
                display_name: self.names.collection.clone(),
            }),
        )
        .await
        .map_err(|source| {
            warn!(error = %source, "collection create failed");
            ConsoleError::Create { source }
        })?;
        info!(collection_id = %collection.id, "collection created");

        let flow = match bounded(
            self.request_timeout,
            self.store.create_flow(CreateFlowRequest {
                collection_id: collection.id.clone(),
                display_name: self.names.first_flow.clone(),
            }),
        )
        .await
        {
            Ok(flow) => flow,
            Err(source) => {
                let orphan_removed = self.remove_orphan(&collection).await;
                return Err(ConsoleError::PartialSequence {
                    collection_id: collection.id,
                    orphan_removed,
                    source,
                });
            }
        };
        info!(collection_id = %collection.id, flow_id = %flow.id, "first flow created");

        let target = NavigationTarget::flow_builder(&flow.collection_id)
            .with_query(NEW_COLLECTION_QUERY_PARAM, "true");
        self.navigator
            .navigate(target)
            .await
            .map_err(ConsoleError::Navigation)?;

        Ok(CreationOutcome::Created { collection, flow })
    }

    async fn remove_orphan(&self, collection: &Collection) -> bool {
        match bounded(
            self.request_timeout,
            self.store.delete_collection(&collection.id),
        )
        .await
        {
            Ok(()) => {
                warn!(
                    collection_id = %collection.id,
                    "first flow create failed; removed the empty collection"
                );
                true
            }
            Err(err) => {
                error!(
                    collection_id = %collection.id,
                    error = %err,
                    "first flow create failed and the empty collection could not be removed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/creation_tests.rs"]
mod tests;
