//! Terminal stand-ins for the router and the confirmation dialog.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use collections_core::{
    deletion::{ConfirmationDialog, ConfirmationRequest},
    NavigationTarget, Navigator, QueryParams,
};
use tokio::sync::watch;
use tracing::info;

pub struct HeadlessNavigator {
    params: watch::Sender<QueryParams>,
    has_collections: watch::Sender<bool>,
    visited: Mutex<Vec<NavigationTarget>>,
}

impl HeadlessNavigator {
    pub fn new(initial: QueryParams, has_collections: bool) -> Self {
        let (params, _) = watch::channel(initial);
        let (has_collections, _) = watch::channel(has_collections);
        Self {
            params,
            has_collections,
            visited: Mutex::new(Vec::new()),
        }
    }

    pub fn visited(&self) -> Vec<NavigationTarget> {
        self.visited
            .lock()
            .map(|visited| visited.clone())
            .unwrap_or_default()
    }
}

pub fn describe(target: &NavigationTarget) -> String {
    if target.query.is_empty() {
        return target.path.clone();
    }
    let query = target
        .query
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{query}", target.path)
}

#[async_trait]
impl Navigator for HeadlessNavigator {
    fn query_params(&self) -> watch::Receiver<QueryParams> {
        self.params.subscribe()
    }

    fn are_there_collections(&self) -> watch::Receiver<bool> {
        self.has_collections.subscribe()
    }

    async fn navigate(&self, target: NavigationTarget) -> Result<()> {
        info!(route = %describe(&target), "navigate");
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(target);
        }
        Ok(())
    }
}

/// Confirms only when the user passed `--yes` up front.
pub struct FlagDialog {
    pub assume_yes: bool,
}

#[async_trait]
impl ConfirmationDialog for FlagDialog {
    async fn confirm(&self, request: &ConfirmationRequest) -> Option<bool> {
        if !self.assume_yes {
            eprintln!(
                "Refusing to delete '{}' ({}) without --yes",
                request.entity_name, request.collection_id
            );
            return None;
        }
        Some(true)
    }
}
