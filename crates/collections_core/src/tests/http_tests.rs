use std::{collections::HashMap, sync::Arc};

use super::*;
use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use shared::{
    domain::{CollectionStatus, Cursor, FlowId},
    error::ErrorCode,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    list_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    authorizations: Arc<Mutex<Vec<Option<String>>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

fn timestamp() -> chrono::DateTime<chrono::Utc> {
    "2024-01-01T00:00:00Z".parse().expect("timestamp")
}

async fn list_collections(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<SeekPage<CollectionListDto>> {
    state.authorizations.lock().await.push(
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    );
    let project_id = query.get("projectId").cloned().unwrap_or_default();
    state.list_queries.lock().await.push(query);
    Json(SeekPage::new(
        vec![CollectionListDto {
            id: CollectionId::new("c1"),
            project_id: ProjectId::new(project_id),
            display_name: "Orders".to_string(),
            created: timestamp(),
            updated: timestamp(),
            status: CollectionStatus::Enabled,
        }],
        Some(Cursor::new("next-token")),
        None,
    ))
}

async fn create_collection(Json(body): Json<CreateCollectionRequest>) -> Json<Collection> {
    Json(Collection {
        id: CollectionId::new("created"),
        project_id: body.project_id,
        display_name: body.display_name,
        created: timestamp(),
        updated: timestamp(),
    })
}

async fn delete_collection(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    if id == "missing" {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "collection not found")),
        ));
    }
    state.deleted.lock().await.push(id);
    Ok(StatusCode::NO_CONTENT)
}

async fn create_flow(Json(body): Json<CreateFlowRequest>) -> Json<Flow> {
    Json(Flow {
        id: FlowId::new("flow_1"),
        collection_id: body.collection_id,
        display_name: body.display_name,
    })
}

async fn update_status(
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    if id == "broken" {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()));
    }
    Ok(Json(StatusResponse {
        status: body.status,
    }))
}

async fn spawn_server() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route(
            "/v1/collections",
            get(list_collections).post(create_collection),
        )
        .route("/v1/collections/:id", delete(delete_collection))
        .route("/v1/collections/:id/status", post(update_status))
        .route("/v1/flows", post(create_flow))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[tokio::test]
async fn lists_collections_with_project_limit_cursor_and_token() {
    let (server_url, state) = spawn_server().await.expect("spawn server");
    let store = HttpCollectionStore::new(format!("{server_url}/"), Some("tok".to_string()));

    let page = store
        .list_collections(
            &ProjectId::new("proj_1"),
            &PageRequest {
                limit: 5,
                cursor: Some(Cursor::new("abc")),
            },
        )
        .await
        .expect("list");

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].project_id, ProjectId::new("proj_1"));
    assert_eq!(page.next, Some(Cursor::new("next-token")));

    let queries = state.list_queries.lock().await;
    assert_eq!(queries[0].get("limit").map(String::as_str), Some("5"));
    assert_eq!(queries[0].get("cursor").map(String::as_str), Some("abc"));
    assert_eq!(
        state.authorizations.lock().await[0].as_deref(),
        Some("Bearer tok")
    );
}

#[tokio::test]
async fn first_page_request_omits_cursor() {
    let (server_url, state) = spawn_server().await.expect("spawn server");
    let store = HttpCollectionStore::new(server_url, None);

    store
        .list_collections(&ProjectId::new("proj_1"), &PageRequest::first(10))
        .await
        .expect("list");

    assert!(!state.list_queries.lock().await[0].contains_key("cursor"));
    assert_eq!(state.authorizations.lock().await[0], None);
}

#[tokio::test]
async fn creates_collection_and_flow() {
    let (server_url, _state) = spawn_server().await.expect("spawn server");
    let store = HttpCollectionStore::new(server_url, None);

    let collection = store
        .create_collection(CreateCollectionRequest {
            project_id: ProjectId::new("proj_1"),
            display_name: "Untitled".to_string(),
        })
        .await
        .expect("create collection");
    assert_eq!(collection.display_name, "Untitled");

    let flow = store
        .create_flow(CreateFlowRequest {
            collection_id: collection.id.clone(),
            display_name: "Flow 1".to_string(),
        })
        .await
        .expect("create flow");
    assert_eq!(flow.collection_id, collection.id);
}

#[tokio::test]
async fn delete_surfaces_api_error_body() {
    let (server_url, state) = spawn_server().await.expect("spawn server");
    let store = HttpCollectionStore::new(server_url, None);

    store
        .delete_collection(&CollectionId::new("c1"))
        .await
        .expect("delete");
    assert_eq!(*state.deleted.lock().await, vec!["c1".to_string()]);

    let err = store
        .delete_collection(&CollectionId::new("missing"))
        .await
        .expect_err("missing collection");
    let api = err
        .downcast_ref::<ApiException>()
        .expect("api error in chain");
    assert_eq!(api.code, ErrorCode::NotFound);
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn status_update_round_trips_and_reports_plain_failures() {
    let (server_url, _state) = spawn_server().await.expect("spawn server");
    let store = HttpCollectionStore::new(server_url, None);

    let response = store
        .update_status(
            &CollectionId::new("c1"),
            UpdateStatusRequest {
                status: CollectionStatus::Disabled,
            },
        )
        .await
        .expect("update");
    assert_eq!(response.status, CollectionStatus::Disabled);

    let err = store
        .update_status(
            &CollectionId::new("broken"),
            UpdateStatusRequest {
                status: CollectionStatus::Enabled,
            },
        )
        .await
        .expect_err("server error");
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("boom"));
}
