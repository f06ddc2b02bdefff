//! REST implementation of [`CollectionStore`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{CollectionId, ProjectId},
    error::{ApiError, ApiException},
    protocol::{
        Collection, CollectionListDto, CreateCollectionRequest, CreateFlowRequest, Flow,
        SeekPage, StatusResponse, UpdateStatusRequest,
    },
};
use tracing::debug;

use crate::{config::Settings, page_params::PageRequest, CollectionStore};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListCollectionsQuery<'a> {
    project_id: &'a str,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
}

pub struct HttpCollectionStore {
    http: Client,
    server_url: String,
    api_token: Option<String>,
}

impl HttpCollectionStore {
    pub fn new(server_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_token,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.server_url.clone(), settings.api_token.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{path}", self.server_url));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api_error) => Err(anyhow::Error::new(ApiException::from(api_error))
            .context(format!("server responded with {status}"))),
        Err(_) => Err(anyhow!("server responded with {status}: {body}")),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    ensure_success(response)
        .await?
        .json()
        .await
        .context("invalid response body")
}

#[async_trait]
impl CollectionStore for HttpCollectionStore {
    async fn list_collections(
        &self,
        project_id: &ProjectId,
        request: &PageRequest,
    ) -> Result<SeekPage<CollectionListDto>> {
        debug!(project_id = %project_id, limit = request.limit, "http: list collections");
        let response = self
            .request(Method::GET, "/v1/collections")
            .query(&ListCollectionsQuery {
                project_id: project_id.as_str(),
                limit: request.limit,
                cursor: request.cursor.as_ref().map(|cursor| cursor.as_str()),
            })
            .send()
            .await?;
        decode(response).await
    }

    async fn create_collection(&self, request: CreateCollectionRequest) -> Result<Collection> {
        let response = self
            .request(Method::POST, "/v1/collections")
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_collection(&self, collection_id: &CollectionId) -> Result<()> {
        let response = self
            .request(Method::DELETE, &format!("/v1/collections/{collection_id}"))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn create_flow(&self, request: CreateFlowRequest) -> Result<Flow> {
        let response = self
            .request(Method::POST, "/v1/flows")
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }

    async fn update_status(
        &self,
        collection_id: &CollectionId,
        request: UpdateStatusRequest,
    ) -> Result<StatusResponse> {
        let response = self
            .request(
                Method::POST,
                &format!("/v1/collections/{collection_id}/status"),
            )
            .json(&request)
            .send()
            .await?;
        decode(response).await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
