//! Confirm -> delete -> refresh sequencing for removing a collection.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{domain::CollectionId, protocol::CollectionListDto};
use tracing::{info, warn};

use crate::{
    error::{bounded, ConsoleError, RequestError},
    refresh::RefreshTrigger,
    CollectionStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub collection_id: CollectionId,
    pub entity_name: String,
}

/// Confirmation UI. `None` (dialog dismissed) and `Some(false)` both mean
/// "not confirmed".
#[async_trait]
pub trait ConfirmationDialog: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> Option<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Dismissed,
}

impl From<Option<bool>> for Confirmation {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Confirmed,
            Some(false) | None => Self::Dismissed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Dismissed,
}

/// A delete bound to one collection; runs at most once.
pub struct DeleteAction {
    store: Arc<dyn CollectionStore>,
    collection_id: CollectionId,
    request_timeout: Duration,
}

impl DeleteAction {
    pub async fn execute(self) -> Result<CollectionId, RequestError> {
        bounded(
            self.request_timeout,
            self.store.delete_collection(&self.collection_id),
        )
        .await?;
        Ok(self.collection_id)
    }
}

pub struct DeletionOrchestrator {
    store: Arc<dyn CollectionStore>,
    dialog: Arc<dyn ConfirmationDialog>,
    refresh: RefreshTrigger,
    request_timeout: Duration,
}

impl DeletionOrchestrator {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        dialog: Arc<dyn ConfirmationDialog>,
        refresh: RefreshTrigger,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            dialog,
            refresh,
            request_timeout,
        }
    }

    fn bind_delete(&self, collection_id: &CollectionId) -> DeleteAction {
        DeleteAction {
            store: Arc::clone(&self.store),
            collection_id: collection_id.clone(),
            request_timeout: self.request_timeout,
        }
    }

    /// Asks for confirmation and deletes on approval. The refresh signal is
    /// emitted only after the delete request succeeded.
    pub async fn request_deletion(
        &self,
        row: &CollectionListDto,
    ) -> Result<DeletionOutcome, ConsoleError> {
        let request = ConfirmationRequest {
            collection_id: row.id.clone(),
            entity_name: row.display_name.clone(),
        };
        let action = self.bind_delete(&row.id);

        match Confirmation::from(self.dialog.confirm(&request).await) {
            Confirmation::Dismissed => {
                info!(collection_id = %row.id, "deletion dismissed");
                Ok(DeletionOutcome::Dismissed)
            }
            Confirmation::Confirmed => match action.execute().await {
                Ok(collection_id) => {
                    info!(collection_id = %collection_id, "collection deleted");
                    self.refresh.collection_deleted(collection_id);
                    Ok(DeletionOutcome::Deleted)
                }
                Err(source) => {
                    warn!(
                        collection_id = %row.id,
                        error = %source,
                        retryable = source.is_retryable(),
                        "collection delete failed"
                    );
                    Err(ConsoleError::Delete {
                        collection_id: row.id.clone(),
                        source,
                    })
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/deletion_tests.rs"]
mod tests;
