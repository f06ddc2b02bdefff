//! Cursor-paginated collections source with supersede-on-newer-trigger fetching.
//!
//! A single driver task owns all fetch bookkeeping. Every trigger (navigation
//! change, refresh signal, paginator request) bumps the generation, aborts the
//! in-flight fetch and spawns a new one; completions carrying an older
//! generation are dropped before they reach the published [`PageState`].

use std::{sync::Arc, time::Duration};

use futures::{stream::BoxStream, Stream, StreamExt};
use shared::{
    domain::{CollectionId, CollectionStatus, Cursor},
    protocol::{CollectionListDto, SeekPage},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::{bounded, ConsoleError, PaginatorError, RequestError},
    page_params::{PageRequest, DEFAULT_PAGE_SIZE},
    refresh::RefreshReason,
    CollectionStore, ProjectContext,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PageState {
    /// Generation of the most recently issued fetch.
    pub generation: u64,
    pub request: Option<PageRequest>,
    pub status: LoadStatus,
    pub rows: Vec<CollectionListDto>,
    pub next: Option<Cursor>,
    pub previous: Option<Cursor>,
    pub page_index: usize,
    /// Cursor of every known page; index 0 is the first page.
    pub page_cursors: Vec<Option<Cursor>>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            generation: 0,
            request: None,
            status: LoadStatus::Idle,
            rows: Vec::new(),
            next: None,
            previous: None,
            page_index: 0,
            page_cursors: vec![None],
        }
    }
}

impl PageState {
    pub fn is_settled(&self) -> bool {
        matches!(self.status, LoadStatus::Ready | LoadStatus::Failed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            LoadStatus::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.request
            .as_ref()
            .map_or(DEFAULT_PAGE_SIZE, |request| request.limit)
    }

    /// Rows on every page up to and including the displayed one.
    pub fn total_rows(&self) -> usize {
        self.page_index * self.page_size() as usize + self.rows.len()
    }

    pub fn row(&self, collection_id: &CollectionId) -> Option<&CollectionListDto> {
        self.rows.iter().find(|row| &row.id == collection_id)
    }
}

struct FetchCompletion {
    generation: u64,
    result: Result<SeekPage<CollectionListDto>, RequestError>,
}

pub struct PaginatedDataSource;

impl PaginatedDataSource {
    /// Spawns the driver task; must be called from within a tokio runtime.
    pub fn connect<R, S>(
        page_requests: R,
        refresh_signals: S,
        project: Arc<dyn ProjectContext>,
        store: Arc<dyn CollectionStore>,
        request_timeout: Duration,
    ) -> DataSourceHandle
    where
        R: Stream<Item = PageRequest> + Send + 'static,
        S: Stream<Item = RefreshReason> + Send + 'static,
    {
        let (state_tx, _) = watch::channel(PageState::default());
        let state = Arc::new(state_tx);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            store,
            project,
            request_timeout,
            state: Arc::clone(&state),
            generation: 0,
            latest: None,
            refreshed: false,
            inflight: None,
            completions: completions_tx,
        };
        tokio::spawn(driver.run(
            page_requests.boxed(),
            refresh_signals.boxed(),
            commands_rx,
            completions_rx,
        ));

        DataSourceHandle {
            state,
            commands: commands_tx,
        }
    }
}

struct Driver {
    store: Arc<dyn CollectionStore>,
    project: Arc<dyn ProjectContext>,
    request_timeout: Duration,
    state: Arc<watch::Sender<PageState>>,
    generation: u64,
    latest: Option<PageRequest>,
    refreshed: bool,
    inflight: Option<JoinHandle<()>>,
    completions: mpsc::UnboundedSender<FetchCompletion>,
}

impl Driver {
    async fn run(
        mut self,
        mut page_requests: BoxStream<'static, PageRequest>,
        mut refresh_signals: BoxStream<'static, RefreshReason>,
        mut commands: mpsc::UnboundedReceiver<PageRequest>,
        mut completions: mpsc::UnboundedReceiver<FetchCompletion>,
    ) {
        loop {
            tokio::select! {
                Some(request) = page_requests.next() => self.on_page_request(request),
                Some(reason) = refresh_signals.next() => self.on_refresh(reason),
                command = commands.recv() => match command {
                    Some(request) => self.issue(request),
                    None => break,
                },
                Some(completion) = completions.recv() => self.on_completion(completion),
            }
        }

        if let Some(inflight) = self.inflight.take() {
            inflight.abort();
        }
        debug!("data source: all handles dropped; driver stopped");
    }

    fn on_page_request(&mut self, request: PageRequest) {
        self.latest = Some(request.clone());
        // Nothing is fetched until the initial refresh signal arrived as well.
        if self.refreshed {
            self.issue(request);
        }
    }

    fn on_refresh(&mut self, reason: RefreshReason) {
        self.refreshed = true;
        let Some(latest) = self.latest.clone() else {
            return;
        };
        let request = if reason.resets_to_first_page() {
            PageRequest::first(latest.limit)
        } else {
            latest
        };
        info!(?reason, limit = request.limit, "data source: refresh");
        self.issue(request);
    }

    fn issue(&mut self, request: PageRequest) {
        self.latest = Some(request.clone());
        self.generation += 1;
        let generation = self.generation;

        if let Some(previous) = self.inflight.take() {
            if !previous.is_finished() {
                debug!(generation, "data source: superseding in-flight fetch");
            }
            previous.abort();
        }

        self.state.send_modify(|state| {
            let same_limit = state
                .request
                .as_ref()
                .map_or(true, |current| current.limit == request.limit);
            let known_index = state
                .page_cursors
                .iter()
                .position(|cursor| *cursor == request.cursor);
            match known_index {
                Some(index) if same_limit => state.page_index = index,
                _ => {
                    state.page_cursors = vec![request.cursor.clone()];
                    state.page_index = 0;
                }
            }
            state.generation = generation;
            state.request = Some(request.clone());
            state.status = LoadStatus::Loading;
        });

        let store = Arc::clone(&self.store);
        let project = Arc::clone(&self.project);
        let completions = self.completions.clone();
        let request_timeout = self.request_timeout;
        self.inflight = Some(tokio::spawn(async move {
            let result = match project.current_project_id() {
                Ok(project_id) => {
                    bounded(request_timeout, store.list_collections(&project_id, &request)).await
                }
                Err(err) => Err(RequestError::Store(err)),
            };
            let _ = completions.send(FetchCompletion { generation, result });
        }));
    }

    fn on_completion(&mut self, completion: FetchCompletion) {
        if completion.generation != self.generation {
            debug!(
                stale = completion.generation,
                current = self.generation,
                "data source: discarding superseded fetch result"
            );
            return;
        }
        self.inflight = None;

        match completion.result {
            Ok(page) => {
                info!(
                    generation = completion.generation,
                    rows = page.data.len(),
                    has_next = page.next.is_some(),
                    "data source: page loaded"
                );
                self.state.send_modify(|state| {
                    state.status = LoadStatus::Ready;
                    state.rows = page.data;
                    state.next = page.next;
                    state.previous = page.previous;
                    state.page_cursors.truncate(state.page_index + 1);
                    if let Some(next) = &state.next {
                        state.page_cursors.push(Some(next.clone()));
                    }
                });
            }
            Err(source) => {
                let retryable = source.is_retryable();
                let err = ConsoleError::Fetch(source);
                warn!(
                    generation = completion.generation,
                    error = %err,
                    retryable,
                    "data source: page load failed"
                );
                self.state.send_modify(|state| {
                    state.status = LoadStatus::Failed(err.to_string());
                    state.rows.clear();
                    state.next = None;
                    state.previous = None;
                    state.page_cursors.truncate(state.page_index + 1);
                });
            }
        }
    }
}

/// View-side handle onto a connected data source. The driver stops once every
/// handle (including paginator handles) is dropped.
#[derive(Clone)]
pub struct DataSourceHandle {
    state: Arc<watch::Sender<PageState>>,
    commands: mpsc::UnboundedSender<PageRequest>,
}

impl DataSourceHandle {
    pub fn state(&self) -> PageState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PageState> {
        self.state.subscribe()
    }

    pub fn row(&self, collection_id: &CollectionId) -> Option<CollectionListDto> {
        self.state.borrow().row(collection_id).cloned()
    }

    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&PageState) -> bool,
    ) -> Result<PageState, ConsoleError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| ConsoleError::DataSourceClosed)?;
        Ok(state.clone())
    }

    /// Waits until the latest fetch the driver has issued so far has completed
    /// or failed. A trigger the driver has not picked up yet is not covered;
    /// use [`Self::wait_for_fetch_after`] for that.
    pub async fn wait_until_settled(&self) -> Result<PageState, ConsoleError> {
        self.wait_for(PageState::is_settled).await
    }

    /// Waits for the first settled state of a fetch issued after `generation`.
    pub async fn wait_for_fetch_after(&self, generation: u64) -> Result<PageState, ConsoleError> {
        self.wait_for(|state| state.generation > generation && state.is_settled())
            .await
    }

    /// Patches the cached status of a visible row. Returns false when the row
    /// is not on the displayed page.
    pub fn apply_status(&self, collection_id: &CollectionId, status: CollectionStatus) -> bool {
        self.state.send_if_modified(|state| {
            match state.rows.iter_mut().find(|row| &row.id == collection_id) {
                Some(row) if row.status != status => {
                    row.status = status;
                    true
                }
                _ => false,
            }
        })
    }

    pub fn paginator(&self) -> PaginatorHandle {
        PaginatorHandle {
            state: self.state.subscribe(),
            commands: self.commands.clone(),
        }
    }
}

/// Connected paginator: reads page-size math from the published state and
/// turns page navigation into new page requests.
#[derive(Clone)]
pub struct PaginatorHandle {
    state: watch::Receiver<PageState>,
    commands: mpsc::UnboundedSender<PageRequest>,
}

impl PaginatorHandle {
    pub fn total_rows(&self) -> usize {
        self.state.borrow().total_rows()
    }

    pub fn page_index(&self) -> usize {
        self.state.borrow().page_index
    }

    pub fn page_size(&self) -> u32 {
        self.state.borrow().page_size()
    }

    pub fn has_next(&self) -> bool {
        self.state.borrow().next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        let state = self.state.borrow();
        state.page_index > 0 || state.previous.is_some()
    }

    pub fn next_page(&self) -> Result<(), PaginatorError> {
        let request = {
            let state = self.state.borrow();
            let next = state.next.clone().ok_or(PaginatorError::NoNextPage)?;
            PageRequest {
                limit: state.page_size(),
                cursor: Some(next),
            }
        };
        self.send(request)
    }

    pub fn previous_page(&self) -> Result<(), PaginatorError> {
        let request = {
            let state = self.state.borrow();
            let cursor = if state.page_index > 0 {
                state.page_cursors[state.page_index - 1].clone()
            } else {
                Some(
                    state
                        .previous
                        .clone()
                        .ok_or(PaginatorError::NoPreviousPage)?,
                )
            };
            PageRequest {
                limit: state.page_size(),
                cursor,
            }
        };
        self.send(request)
    }

    pub fn first_page(&self) -> Result<(), PaginatorError> {
        let limit = self.page_size();
        self.send(PageRequest::first(limit))
    }

    /// Zero-based; only pages whose cursor is already known can be reached.
    pub fn go_to_page(&self, index: usize) -> Result<(), PaginatorError> {
        let request = {
            let state = self.state.borrow();
            let cursor = state
                .page_cursors
                .get(index)
                .cloned()
                .ok_or(PaginatorError::UnknownPage {
                    requested: index,
                    known: state.page_cursors.len(),
                })?;
            PageRequest {
                limit: state.page_size(),
                cursor,
            }
        };
        self.send(request)
    }

    pub fn set_page_size(&self, limit: u32) -> Result<(), PaginatorError> {
        if limit == 0 {
            return Err(PaginatorError::InvalidPageSize);
        }
        self.send(PageRequest::first(limit))
    }

    fn send(&self, request: PageRequest) -> Result<(), PaginatorError> {
        self.commands
            .send(request)
            .map_err(|_| PaginatorError::Closed)
    }
}

#[cfg(test)]
#[path = "tests/data_source_tests.rs"]
mod tests;
