use std::sync::Arc;

use shared::{domain::CollectionId, protocol::CollectionListDto};
use tokio::sync::watch;
use tracing::info;

use crate::{
    config::Settings,
    creation::{CreationFlow, CreationOutcome},
    data_source::{DataSourceHandle, PageState, PaginatedDataSource, PaginatorHandle},
    deletion::{ConfirmationDialog, DeletionOrchestrator, DeletionOutcome},
    error::ConsoleError,
    page_params::page_requests,
    refresh::RefreshTrigger,
    row_mutation::{RowMutationTracker, ToggleControl, ToggleOutcome},
    CollectionStore, NavigationTarget, Navigator, ProjectContext,
};

pub const DISPLAYED_COLUMNS: [&str; 4] = ["name", "created", "status", "action"];

pub struct ControllerDeps {
    pub store: Arc<dyn CollectionStore>,
    pub project: Arc<dyn ProjectContext>,
    pub navigator: Arc<dyn Navigator>,
    pub dialog: Arc<dyn ConfirmationDialog>,
}

/// State behind the collections table. Owns the pending-toggle registry and
/// the creation guard; the view only reads state and forwards interactions.
pub struct CollectionsTableController {
    data_source: DataSourceHandle,
    rows: RowMutationTracker,
    deletion: DeletionOrchestrator,
    creation: CreationFlow,
    navigator: Arc<dyn Navigator>,
    are_there_collections: watch::Receiver<bool>,
}

impl CollectionsTableController {
    /// Connects the data source, so this must run inside a tokio runtime.
    pub fn new(deps: ControllerDeps, settings: &Settings) -> Self {
        let (refresh, refresh_signals) = RefreshTrigger::new();
        let data_source = PaginatedDataSource::connect(
            page_requests(deps.navigator.query_params(), settings.default_page_size),
            refresh_signals,
            Arc::clone(&deps.project),
            Arc::clone(&deps.store),
            settings.request_timeout,
        );
        let rows = RowMutationTracker::new(Arc::clone(&deps.store), settings.request_timeout);
        let deletion = DeletionOrchestrator::new(
            Arc::clone(&deps.store),
            deps.dialog,
            refresh,
            settings.request_timeout,
        );
        let creation = CreationFlow::new(
            deps.store,
            deps.project,
            Arc::clone(&deps.navigator),
            settings.creation_names(),
            settings.request_timeout,
        );

        Self {
            data_source,
            rows,
            deletion,
            creation,
            are_there_collections: deps.navigator.are_there_collections(),
            navigator: deps.navigator,
        }
    }

    pub fn displayed_columns(&self) -> &'static [&'static str] {
        &DISPLAYED_COLUMNS
    }

    /// Picks between the table and the empty state.
    pub fn are_there_collections(&self) -> bool {
        *self.are_there_collections.borrow()
    }

    pub fn watch_are_there_collections(&self) -> watch::Receiver<bool> {
        self.are_there_collections.clone()
    }

    pub fn state(&self) -> PageState {
        self.data_source.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<PageState> {
        self.data_source.subscribe()
    }

    pub fn paginator(&self) -> PaginatorHandle {
        self.data_source.paginator()
    }

    pub async fn wait_until_settled(&self) -> Result<PageState, ConsoleError> {
        self.data_source.wait_until_settled().await
    }

    pub async fn wait_for_fetch_after(&self, generation: u64) -> Result<PageState, ConsoleError> {
        self.data_source.wait_for_fetch_after(generation).await
    }

    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&PageState) -> bool,
    ) -> Result<PageState, ConsoleError> {
        self.data_source.wait_for(predicate).await
    }

    pub fn is_toggle_pending(&self, collection_id: &CollectionId) -> bool {
        self.rows.is_pending(collection_id)
    }

    pub fn is_creating(&self) -> bool {
        self.creation.is_creating()
    }

    fn visible_row(&self, collection_id: &CollectionId) -> Result<CollectionListDto, ConsoleError> {
        self.data_source
            .row(collection_id)
            .ok_or_else(|| ConsoleError::UnknownCollection(collection_id.clone()))
    }

    pub async fn toggle_status(
        &self,
        collection_id: &CollectionId,
        control: &dyn ToggleControl,
    ) -> Result<ToggleOutcome, ConsoleError> {
        let row = self.visible_row(collection_id)?;
        let outcome = self.rows.toggle_status(&row, control).await?;
        if let ToggleOutcome::Updated { status } = outcome {
            self.data_source.apply_status(collection_id, status);
        }
        Ok(outcome)
    }

    pub async fn delete_collection(
        &self,
        collection_id: &CollectionId,
    ) -> Result<DeletionOutcome, ConsoleError> {
        let row = self.visible_row(collection_id)?;
        self.deletion.request_deletion(&row).await
    }

    pub async fn create_collection(&self) -> Result<CreationOutcome, ConsoleError> {
        self.creation.create_collection().await
    }

    pub async fn open_builder(&self, collection_id: &CollectionId) -> Result<(), ConsoleError> {
        info!(collection_id = %collection_id, "opening flow builder");
        self.navigator
            .navigate(NavigationTarget::flow_builder(collection_id))
            .await
            .map_err(ConsoleError::Navigation)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
