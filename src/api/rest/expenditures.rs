use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart, Path, Query},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        expenditures::{
            ExpenditureRemarks, ExpenditureService, ListExpendituresQuery,
            RejectExpenditureRequest, ResubmitExpenditureRequest, SubmitExpenditureRequest,
        },
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(submit))
        .route("/:id", get(get_one))
        .route("/:id/verify", post(verify))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/resubmit", post(resubmit))
        .route("/:id/attachments", post(upload_attachment))
        .route("/overrides/:id/approve", post(approve_override))
        .route("/overrides/:id/reject", post(reject_override))
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListExpendituresQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expenditures = ExpenditureService::new(state).list(query).await?;
    Ok(Json(serde_json::json!({ "expenditures": expenditures })))
}

async fn get_one(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expenditure = ExpenditureService::new(state).get(id).await?;
    Ok(Json(serde_json::json!({ "expenditure": expenditure })))
}

async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<SubmitExpenditureRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expenditure = ExpenditureService::new(state).submit(&user, payload).await?;
    Ok(Json(serde_json::json!({ "expenditure": expenditure })))
}

async fn verify(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExpenditureRemarks>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expenditure = ExpenditureService::new(state)
        .verify(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "expenditure": expenditure })))
}

async fn approve(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ExpenditureRemarks>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expenditure = ExpenditureService::new(state)
        .approve(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "expenditure": expenditure })))
}

async fn reject(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectExpenditureRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expenditure = ExpenditureService::new(state)
        .reject(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "expenditure": expenditure })))
}

async fn resubmit(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResubmitExpenditureRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let expenditure = ExpenditureService::new(state)
        .resubmit(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "expenditure": expenditure })))
}

async fn approve_override(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let decided = ExpenditureService::new(state)
        .decide_override(&user, id, true)
        .await?;
    Ok(Json(serde_json::json!({ "override": decided })))
}

async fn reject_override(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let decided = ExpenditureService::new(state)
        .decide_override(&user, id, false)
        .await?;
    Ok(Json(serde_json::json!({ "override": decided })))
}

/// Accepts one multipart field named `file` carrying the document.
async fn upload_attachment(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let service = ExpenditureService::new(state);
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServiceError::Validation(vec![err.to_string()]))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .unwrap_or("attachment")
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|err| ServiceError::Validation(vec![err.to_string()]))?;
        let attachment = service
            .add_attachment(&user, id, file_name, content_type, data)
            .await?;
        return Ok(Json(serde_json::json!({ "attachment": attachment })));
    }
    Err(ServiceError::Validation(vec![
        "multipart field \"file\" is required".to_string(),
    ]))
}
