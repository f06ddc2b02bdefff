//! Controller core for the paginated collections table: page parameters,
//! supersede-on-refresh fetching, per-row status mutations, confirmed
//! deletion and the single-flight collection creation flow.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{CollectionId, ProjectId},
    protocol::{
        Collection, CollectionListDto, CreateCollectionRequest, CreateFlowRequest, Flow,
        SeekPage, StatusResponse, UpdateStatusRequest,
    },
};
use tokio::sync::watch;

pub mod config;
pub mod controller;
pub mod creation;
pub mod data_source;
pub mod deletion;
pub mod error;
pub mod http;
pub mod page_params;
pub mod refresh;
pub mod row_mutation;

pub use controller::{CollectionsTableController, ControllerDeps};
pub use data_source::{DataSourceHandle, LoadStatus, PageState, PaginatorHandle};
pub use error::{ConsoleError, PaginatorError, RequestError};
pub use page_params::{PageRequest, QueryParams, DEFAULT_PAGE_SIZE};

/// Backing-store access used by the controller. Every call may suspend.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn list_collections(
        &self,
        project_id: &ProjectId,
        request: &PageRequest,
    ) -> Result<SeekPage<CollectionListDto>>;
    async fn create_collection(&self, request: CreateCollectionRequest) -> Result<Collection>;
    async fn delete_collection(&self, collection_id: &CollectionId) -> Result<()>;
    async fn create_flow(&self, request: CreateFlowRequest) -> Result<Flow>;
    async fn update_status(
        &self,
        collection_id: &CollectionId,
        request: UpdateStatusRequest,
    ) -> Result<StatusResponse>;
}

pub trait ProjectContext: Send + Sync {
    fn current_project_id(&self) -> Result<ProjectId>;
}

pub struct FixedProject(pub ProjectId);

impl ProjectContext for FixedProject {
    fn current_project_id(&self) -> Result<ProjectId> {
        Ok(self.0.clone())
    }
}

pub struct MissingProjectContext;

impl ProjectContext for MissingProjectContext {
    fn current_project_id(&self) -> Result<ProjectId> {
        Err(anyhow!("no project is selected"))
    }
}

/// Route plus query parameters pushed to the navigation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationTarget {
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl NavigationTarget {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn flow_builder(collection_id: &CollectionId) -> Self {
        Self::new(format!("/flows/{collection_id}"))
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

#[async_trait]
pub trait Navigator: Send + Sync {
    /// Current query parameters of the collections route; changes on every navigation.
    fn query_params(&self) -> watch::Receiver<QueryParams>;
    /// Route flag resolved before the table is shown. `false` means the
    /// project has no collections yet and the empty state is shown instead.
    fn are_there_collections(&self) -> watch::Receiver<bool>;
    async fn navigate(&self, target: NavigationTarget) -> Result<()>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
