use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        allocations::{
            AllocationService, AmendmentRequest, CreateAllocationRequest, UpdateRemarksRequest,
        },
        errors::ServiceError,
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update_remarks))
        .route("/:id/amendments", get(list_amendments).post(request_amendment))
        .route("/amendments/:id/approve", post(approve_amendment))
        .route("/amendments/:id/reject", post(reject_amendment))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    financial_year: Option<String>,
    department: Option<Uuid>,
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let allocations = AllocationService::new(state)
        .list(query.financial_year, query.department)
        .await?;
    Ok(Json(serde_json::json!({ "allocations": allocations })))
}

async fn get_one(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let allocation = AllocationService::new(state).get(id).await?;
    Ok(Json(serde_json::json!({ "allocation": allocation })))
}

async fn create(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateAllocationRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let allocation = AllocationService::new(state).create(&user, payload).await?;
    Ok(Json(serde_json::json!({ "allocation": allocation })))
}

async fn update_remarks(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRemarksRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let allocation = AllocationService::new(state)
        .update_remarks(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "allocation": allocation })))
}

async fn list_amendments(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let amendments = AllocationService::new(state).list_amendments(id).await?;
    Ok(Json(serde_json::json!({ "amendments": amendments })))
}

async fn request_amendment(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AmendmentRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let amendment = AllocationService::new(state)
        .request_amendment(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "amendment": amendment })))
}

async fn approve_amendment(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let amendment = AllocationService::new(state)
        .decide_amendment(&user, id, true)
        .await?;
    Ok(Json(serde_json::json!({ "amendment": amendment })))
}

async fn reject_amendment(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let amendment = AllocationService::new(state)
        .decide_amendment(&user, id, false)
        .await?;
    Ok(Json(serde_json::json!({ "amendment": amendment })))
}
