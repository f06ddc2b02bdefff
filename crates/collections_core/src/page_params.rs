//! Page size and cursor derived from the route's query parameters.

use futures::{Stream, StreamExt};
use shared::domain::Cursor;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub const LIMIT_PARAM: &str = "limit";
pub const CURSOR_PARAM: &str = "cursor";

/// Raw query parameters as handed over by the navigation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

impl QueryParams {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key {
                LIMIT_PARAM => params.limit = Some(value.to_string()),
                CURSOR_PARAM => params.cursor = Some(value.to_string()),
                _ => {}
            }
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    /// `None` requests the first page.
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self {
            limit,
            cursor: None,
        }
    }

    pub fn from_query(params: &QueryParams, default_limit: u32) -> Self {
        let limit = params
            .limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(default_limit);
        let cursor = params
            .cursor
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(Cursor::new);
        Self { limit, cursor }
    }
}

/// Yields the request for the current navigation state, then one per change.
pub fn page_requests(
    params: watch::Receiver<QueryParams>,
    default_limit: u32,
) -> impl Stream<Item = PageRequest> + Send + 'static {
    WatchStream::new(params).map(move |params| PageRequest::from_query(&params, default_limit))
}
