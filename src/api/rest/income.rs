use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::models::IncomeStatus,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        income::{CreateIncomeRequest, IncomeService, ReceiveIncomeRequest},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id/receive", post(receive))
        .route("/:id/verify", post(verify))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    financial_year: Option<String>,
    status: Option<IncomeStatus>,
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let income = IncomeService::new(state)
        .list(query.financial_year, query.status)
        .await?;
    Ok(Json(serde_json::json!({ "income": income })))
}

async fn create(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateIncomeRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let income = IncomeService::new(state).create(&user, payload).await?;
    Ok(Json(serde_json::json!({ "income": income })))
}

async fn receive(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReceiveIncomeRequest>>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let income = IncomeService::new(state).receive(&user, id, payload).await?;
    Ok(Json(serde_json::json!({ "income": income })))
}

async fn verify(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let income = IncomeService::new(state).verify(&user, id).await?;
    Ok(Json(serde_json::json!({ "income": income })))
}
