use std::{future::Future, time::Duration};

use shared::{domain::CollectionId, error::ApiException};
use thiserror::Error;

/// Failure of a single backing-store call.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl RequestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Timeouts and transport failures are worth retrying; API errors only
    /// when their code says so.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TimedOut(_) => true,
            Self::Store(err) => err
                .downcast_ref::<ApiException>()
                .map_or(true, |api| api.code.is_retryable()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("failed to load collections page: {0}")]
    Fetch(#[source] RequestError),
    #[error("failed to update status of collection {collection_id}: {source}")]
    StatusUpdate {
        collection_id: CollectionId,
        source: RequestError,
    },
    #[error("failed to delete collection {collection_id}: {source}")]
    Delete {
        collection_id: CollectionId,
        source: RequestError,
    },
    #[error("failed to create collection: {source}")]
    Create { source: RequestError },
    #[error(
        "collection {collection_id} was created but its first flow was not (orphan removed: {orphan_removed}): {source}"
    )]
    PartialSequence {
        collection_id: CollectionId,
        orphan_removed: bool,
        source: RequestError,
    },
    #[error("navigation failed: {0}")]
    Navigation(#[source] anyhow::Error),
    #[error("collection {0} is not on the displayed page")]
    UnknownCollection(CollectionId),
    #[error("collections data source is no longer running")]
    DataSourceClosed,
}

impl ConsoleError {
    /// True for failures of toggle, delete and create requests.
    pub fn is_mutation_failure(&self) -> bool {
        matches!(
            self,
            Self::StatusUpdate { .. }
                | Self::Delete { .. }
                | Self::Create { .. }
                | Self::PartialSequence { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginatorError {
    #[error("there is no next page")]
    NoNextPage,
    #[error("there is no previous page")]
    NoPreviousPage,
    #[error("page {requested} is not reachable; {known} pages are known")]
    UnknownPage { requested: usize, known: usize },
    #[error("page size must be positive")]
    InvalidPageSize,
    #[error("collections data source is no longer running")]
    Closed,
}

pub(crate) async fn bounded<T, F>(limit: Duration, request: F) -> Result<T, RequestError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result.map_err(RequestError::Store),
        Err(_) => Err(RequestError::TimedOut(limit)),
    }
}
