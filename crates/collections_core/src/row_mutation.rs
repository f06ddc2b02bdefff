use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use shared::{
    domain::{CollectionId, CollectionStatus},
    protocol::{CollectionListDto, UpdateStatusRequest},
};
use tracing::{info, warn};

use crate::{
    error::{bounded, ConsoleError},
    CollectionStore,
};

/// The row's enable/disable switch as owned by the view.
pub trait ToggleControl: Send + Sync {
    fn set_enabled(&self, enabled: bool);
    fn set_checked(&self, checked: bool);
}

#[derive(Debug, Default)]
pub struct SwitchControl {
    enabled: AtomicBool,
    checked: AtomicBool,
}

impl SwitchControl {
    pub fn new(checked: bool) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            checked: AtomicBool::new(checked),
        }
    }

    pub fn for_status(status: CollectionStatus) -> Self {
        Self::new(status.is_enabled())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_checked(&self) -> bool {
        self.checked.load(Ordering::SeqCst)
    }
}

impl ToggleControl for SwitchControl {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn set_checked(&self, checked: bool) {
        self.checked.store(checked, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A toggle for this row is still in flight; nothing was sent.
    AlreadyPending,
    /// The server confirmed this status.
    Updated { status: CollectionStatus },
}

type Registry = Arc<Mutex<HashSet<CollectionId>>>;

/// Removes the registry entry however the toggle ends, cancellation included.
struct PendingEntry {
    registry: Registry,
    collection_id: CollectionId,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.collection_id);
    }
}

pub struct RowMutationTracker {
    store: Arc<dyn CollectionStore>,
    pending: Registry,
    request_timeout: Duration,
}

impl RowMutationTracker {
    pub fn new(store: Arc<dyn CollectionStore>, request_timeout: Duration) -> Self {
        Self {
            store,
            pending: Arc::new(Mutex::new(HashSet::new())),
            request_timeout,
        }
    }

    pub fn is_pending(&self, collection_id: &CollectionId) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(collection_id)
    }

    fn try_claim(&self, collection_id: &CollectionId) -> Option<PendingEntry> {
        let inserted = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection_id.clone());
        inserted.then(|| PendingEntry {
            registry: Arc::clone(&self.pending),
            collection_id: collection_id.clone(),
        })
    }

    /// Flips the row's status on the server. The control is disabled for the
    /// duration of the request and afterwards reflects the status the server
    /// returned, or the pre-toggle status when the request failed.
    pub async fn toggle_status(
        &self,
        row: &CollectionListDto,
        control: &dyn ToggleControl,
    ) -> Result<ToggleOutcome, ConsoleError> {
        let Some(_entry) = self.try_claim(&row.id) else {
            info!(
                collection_id = %row.id,
                "status toggle already in progress; skipping duplicate trigger"
            );
            return Ok(ToggleOutcome::AlreadyPending);
        };

        control.set_enabled(false);
        let target = row.status.toggled();
        info!(collection_id = %row.id, from = %row.status, to = %target, "status toggle requested");

        let result = bounded(
            self.request_timeout,
            self.store
                .update_status(&row.id, UpdateStatusRequest { status: target }),
        )
        .await;

        control.set_enabled(true);
        match result {
            Ok(response) => {
                control.set_checked(response.status.is_enabled());
                if response.status != target {
                    warn!(
                        collection_id = %row.id,
                        requested = %target,
                        confirmed = %response.status,
                        "server confirmed a different status than requested"
                    );
                }
                Ok(ToggleOutcome::Updated {
                    status: response.status,
                })
            }
            Err(source) => {
                control.set_checked(row.status.is_enabled());
                warn!(
                    collection_id = %row.id,
                    error = %source,
                    retryable = source.is_retryable(),
                    "status toggle failed"
                );
                Err(ConsoleError::StatusUpdate {
                    collection_id: row.id.clone(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/row_mutation_tests.rs"]
mod tests;
