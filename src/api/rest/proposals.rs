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
        errors::ServiceError,
        proposals::{
            CreateProposalRequest, ListProposalsQuery, ProposalService, RejectRequest,
            RemarksRequest, UpdateProposalRequest,
        },
        reconciliation::ReconciliationService,
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/context", get(department_context))
        .route("/:id", get(get_one).put(update))
        .route("/:id/submit", post(submit))
        .route("/:id/verify", post(verify))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
        .route("/:id/resubmit", post(resubmit))
        .route("/:id/stats", get(stats))
        .route("/:id/items/:item_id/allocate", post(allocate_item))
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListProposalsQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposals = ProposalService::new(state).list(query).await?;
    Ok(Json(serde_json::json!({ "proposals": proposals })))
}

async fn get_one(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposal = ProposalService::new(state).get(id).await?;
    Ok(Json(serde_json::json!({ "proposal": proposal })))
}

async fn create(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateProposalRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposal = ProposalService::new(state).create_draft(&user, payload).await?;
    Ok(Json(serde_json::json!({ "proposal": proposal })))
}

async fn update(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProposalRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposal = ProposalService::new(state)
        .update_draft(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "proposal": proposal })))
}

async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposal = ProposalService::new(state).submit(&user, id).await?;
    Ok(Json(serde_json::json!({ "proposal": proposal })))
}

async fn verify(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RemarksRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposal = ProposalService::new(state).verify(&user, id, payload).await?;
    Ok(Json(serde_json::json!({ "proposal": proposal })))
}

async fn approve(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposal = ProposalService::new(state).approve(&user, id).await?;
    Ok(Json(serde_json::json!({ "proposal": proposal })))
}

async fn reject(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposal = ProposalService::new(state).reject(&user, id, payload).await?;
    Ok(Json(serde_json::json!({ "proposal": proposal })))
}

async fn resubmit(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let proposal = ProposalService::new(state).resubmit(&user, id).await?;
    Ok(Json(serde_json::json!({ "proposal": proposal })))
}

async fn stats(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let stats = ReconciliationService::new(state).proposal_stats(id).await?;
    Ok(Json(serde_json::json!({ "stats": stats })))
}

#[derive(Debug, Deserialize)]
struct ContextQuery {
    department: Uuid,
    financial_year: String,
}

/// Department-wide reconciliation figures for approvers.
async fn department_context(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ContextQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let context = ReconciliationService::new(state)
        .department_context(query.department, &query.financial_year)
        .await?;
    Ok(Json(serde_json::json!({ "context": context })))
}

#[derive(Debug, Deserialize, Default)]
struct AllocateRequest {
    remarks: Option<String>,
}

async fn allocate_item(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AllocateRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let allocation = ProposalService::new(state)
        .allocate_item(&user, id, item_id, payload.remarks)
        .await?;
    Ok(Json(serde_json::json!({ "allocation": allocation })))
}
