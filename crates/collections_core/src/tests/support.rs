use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{CollectionId, CollectionStatus, Cursor, FlowId, ProjectId},
    protocol::{
        Collection, CollectionListDto, CreateCollectionRequest, CreateFlowRequest, Flow,
        SeekPage, StatusResponse, UpdateStatusRequest,
    },
};
use tokio::sync::{oneshot, watch, Mutex};

use crate::{
    deletion::{ConfirmationDialog, ConfirmationRequest},
    NavigationTarget, Navigator, PageRequest, QueryParams,
};

pub(crate) type ListReply = Result<SeekPage<CollectionListDto>>;

pub(crate) fn row(id: &str, status: CollectionStatus) -> CollectionListDto {
    CollectionListDto {
        id: CollectionId::new(id),
        project_id: ProjectId::new("proj_1"),
        display_name: format!("Collection {id}"),
        created: "2024-01-01T00:00:00Z".parse().expect("timestamp"),
        updated: "2024-01-02T00:00:00Z".parse().expect("timestamp"),
        status,
    }
}

pub(crate) fn page(ids: &[&str], next: Option<&str>) -> SeekPage<CollectionListDto> {
    SeekPage::new(
        ids.iter()
            .map(|id| row(id, CollectionStatus::Enabled))
            .collect(),
        next.map(Cursor::new),
        None,
    )
}

/// Polls until `condition` holds; panics after two seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Async flavour of [`wait_until`] for state behind tokio mutexes.
pub(crate) async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition().await {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub(crate) async fn wait_for_calls<T>(calls: &Mutex<Vec<T>>, count: usize) {
    eventually(move || async move { calls.lock().await.len() >= count }).await;
}

/// In-memory backing store. Listing answers from `pages` (keyed by cursor)
/// unless gated, in which case each call parks until the test replies.
pub(crate) struct FakeStore {
    pub pages: Mutex<HashMap<Option<Cursor>, SeekPage<CollectionListDto>>>,
    pub gate_lists: Mutex<bool>,
    pub list_calls: Mutex<Vec<PageRequest>>,
    pub parked_lists: Mutex<Vec<Option<oneshot::Sender<ListReply>>>>,
    pub fail_lists: Mutex<bool>,

    pub status_calls: Mutex<Vec<(CollectionId, CollectionStatus)>>,
    pub status_reply: Mutex<Option<CollectionStatus>>,
    pub status_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub fail_status: Mutex<bool>,

    pub delete_calls: Mutex<Vec<CollectionId>>,
    pub fail_delete: Mutex<bool>,

    pub create_calls: Mutex<Vec<CreateCollectionRequest>>,
    pub create_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub fail_create: Mutex<bool>,
    pub flow_calls: Mutex<Vec<CreateFlowRequest>>,
    pub fail_flow: Mutex<bool>,
}

impl FakeStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(HashMap::new()),
            gate_lists: Mutex::new(false),
            list_calls: Mutex::new(Vec::new()),
            parked_lists: Mutex::new(Vec::new()),
            fail_lists: Mutex::new(false),
            status_calls: Mutex::new(Vec::new()),
            status_reply: Mutex::new(None),
            status_gate: Mutex::new(None),
            fail_status: Mutex::new(false),
            delete_calls: Mutex::new(Vec::new()),
            fail_delete: Mutex::new(false),
            create_calls: Mutex::new(Vec::new()),
            create_gate: Mutex::new(None),
            fail_create: Mutex::new(false),
            flow_calls: Mutex::new(Vec::new()),
            fail_flow: Mutex::new(false),
        })
    }

    pub(crate) fn gated() -> Arc<Self> {
        let store = Self::new();
        *store.gate_lists.try_lock().expect("fresh store") = true;
        store
    }

    pub(crate) async fn with_page(
        self: &Arc<Self>,
        cursor: Option<&str>,
        page: SeekPage<CollectionListDto>,
    ) {
        self.pages.lock().await.insert(cursor.map(Cursor::new), page);
    }

    pub(crate) async fn list_call_count(&self) -> usize {
        self.list_calls.lock().await.len()
    }

    pub(crate) async fn wait_for_list_calls(&self, count: usize) {
        eventually(move || async move { self.list_call_count().await >= count }).await;
    }

    /// Completes the parked list call with the given index. Returns false if the
    /// call was already abandoned by its caller.
    pub(crate) async fn reply_list(&self, index: usize, reply: ListReply) -> bool {
        let sender = self.parked_lists.lock().await[index]
            .take()
            .expect("list call replied twice");
        sender.send(reply).is_ok()
    }

    pub(crate) async fn block_status_updates(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.status_gate.lock().await = Some(rx);
        tx
    }

    pub(crate) async fn block_creates(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.create_gate.lock().await = Some(rx);
        tx
    }
}

#[async_trait]
impl crate::CollectionStore for FakeStore {
    async fn list_collections(
        &self,
        _project_id: &ProjectId,
        request: &PageRequest,
    ) -> Result<SeekPage<CollectionListDto>> {
        if *self.gate_lists.lock().await {
            let (tx, rx) = oneshot::channel();
            // Parked before the call is counted so a test never replies to a missing slot.
            self.parked_lists.lock().await.push(Some(tx));
            self.list_calls.lock().await.push(request.clone());
            return rx.await.map_err(|_| anyhow!("list reply dropped"))?;
        }
        self.list_calls.lock().await.push(request.clone());
        if *self.fail_lists.lock().await {
            return Err(anyhow!("list unavailable"));
        }
        Ok(self
            .pages
            .lock()
            .await
            .get(&request.cursor)
            .cloned()
            .unwrap_or_else(|| SeekPage::new(Vec::new(), None, None)))
    }

    async fn create_collection(&self, request: CreateCollectionRequest) -> Result<Collection> {
        self.create_calls.lock().await.push(request.clone());
        let gate = self.create_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if *self.fail_create.lock().await {
            return Err(anyhow!("create rejected"));
        }
        let index = self.create_calls.lock().await.len();
        Ok(Collection {
            id: CollectionId::new(format!("new_{index}")),
            project_id: request.project_id,
            display_name: request.display_name,
            created: "2024-01-01T00:00:00Z".parse().expect("timestamp"),
            updated: "2024-01-01T00:00:00Z".parse().expect("timestamp"),
        })
    }

    async fn delete_collection(&self, collection_id: &CollectionId) -> Result<()> {
        self.delete_calls.lock().await.push(collection_id.clone());
        if *self.fail_delete.lock().await {
            return Err(anyhow!("delete rejected"));
        }
        Ok(())
    }

    async fn create_flow(&self, request: CreateFlowRequest) -> Result<Flow> {
        self.flow_calls.lock().await.push(request.clone());
        if *self.fail_flow.lock().await {
            return Err(anyhow!("flow rejected"));
        }
        Ok(Flow {
            id: FlowId::new(format!("flow_for_{}", request.collection_id)),
            collection_id: request.collection_id,
            display_name: request.display_name,
        })
    }

    async fn update_status(
        &self,
        collection_id: &CollectionId,
        request: UpdateStatusRequest,
    ) -> Result<StatusResponse> {
        self.status_calls
            .lock()
            .await
            .push((collection_id.clone(), request.status));
        let gate = self.status_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if *self.fail_status.lock().await {
            return Err(anyhow!("status update rejected"));
        }
        let status = self.status_reply.lock().await.unwrap_or(request.status);
        Ok(StatusResponse { status })
    }
}

pub(crate) struct FakeNavigator {
    pub params: watch::Sender<QueryParams>,
    pub collections_flag: watch::Sender<bool>,
    pub navigations: Mutex<Vec<NavigationTarget>>,
    pub fail: Mutex<bool>,
}

impl FakeNavigator {
    pub(crate) fn new(params: QueryParams) -> Arc<Self> {
        let (params, _) = watch::channel(params);
        let (collections_flag, _) = watch::channel(true);
        Arc::new(Self {
            params,
            collections_flag,
            navigations: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
        })
    }
}

#[async_trait]
impl Navigator for FakeNavigator {
    fn query_params(&self) -> watch::Receiver<QueryParams> {
        self.params.subscribe()
    }

    fn are_there_collections(&self) -> watch::Receiver<bool> {
        self.collections_flag.subscribe()
    }

    async fn navigate(&self, target: NavigationTarget) -> Result<()> {
        if *self.fail.lock().await {
            return Err(anyhow!("router refused navigation"));
        }
        self.navigations.lock().await.push(target);
        Ok(())
    }
}

pub(crate) struct FakeDialog {
    pub answer: Option<bool>,
    pub requests: Mutex<Vec<ConfirmationRequest>>,
}

impl FakeDialog {
    pub(crate) fn answering(answer: Option<bool>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ConfirmationDialog for FakeDialog {
    async fn confirm(&self, request: &ConfirmationRequest) -> Option<bool> {
        self.requests.lock().await.push(request.clone());
        self.answer
    }
}
