use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    domain::workflow::FiscalYearAction,
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        fiscal_years::{CreateFinancialYearRequest, FiscalYearService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id/activate", post(activate))
        .route("/:id/lock", post(lock))
        .route("/:id/close", post(close))
        .route("/:id/recalculate", post(recalculate))
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let years = FiscalYearService::new(state).list().await?;
    Ok(Json(serde_json::json!({ "financialYears": years })))
}

async fn create(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateFinancialYearRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let year = FiscalYearService::new(state).create(&user, payload).await?;
    Ok(Json(serde_json::json!({ "financialYear": year })))
}

async fn activate(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let year = FiscalYearService::new(state)
        .apply(&user, id, FiscalYearAction::Activate)
        .await?;
    Ok(Json(serde_json::json!({ "financialYear": year })))
}

async fn lock(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let year = FiscalYearService::new(state)
        .apply(&user, id, FiscalYearAction::Lock)
        .await?;
    Ok(Json(serde_json::json!({ "financialYear": year })))
}

async fn close(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let year = FiscalYearService::new(state)
        .apply(&user, id, FiscalYearAction::Close)
        .await?;
    Ok(Json(serde_json::json!({ "financialYear": year })))
}

async fn recalculate(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let year = FiscalYearService::new(state).recalculate(id).await?;
    Ok(Json(serde_json::json!({ "financialYear": year })))
}
