use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use futures::{stream, Stream, StreamExt};
use shared::domain::CollectionId;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshReason {
    /// First load after the table is attached.
    Initial,
    /// A row was removed; the data source goes back to the first page.
    CollectionDeleted(CollectionId),
}

impl RefreshReason {
    pub fn resets_to_first_page(&self) -> bool {
        matches!(self, Self::CollectionDeleted(_))
    }
}

#[derive(Clone)]
pub struct RefreshTrigger {
    tx: mpsc::UnboundedSender<RefreshReason>,
    emitted: Arc<AtomicU64>,
}

pub type RefreshSignals = std::pin::Pin<Box<dyn Stream<Item = RefreshReason> + Send>>;

impl RefreshTrigger {
    pub fn new() -> (Self, RefreshSignals) {
        let (tx, rx) = mpsc::unbounded_channel();
        let signals = stream::once(async { RefreshReason::Initial })
            .chain(UnboundedReceiverStream::new(rx))
            .boxed();
        (
            Self {
                tx,
                emitted: Arc::new(AtomicU64::new(0)),
            },
            signals,
        )
    }

    pub fn collection_deleted(&self, collection_id: CollectionId) {
        debug!(collection_id = %collection_id, "refresh: collection deleted");
        // Nobody listening means the table is gone; nothing to refresh.
        if self
            .tx
            .send(RefreshReason::CollectionDeleted(collection_id))
            .is_ok()
        {
            self.emitted.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Number of signals delivered after the initial load.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }
}
