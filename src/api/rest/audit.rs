use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{audit::AuditService, errors::ServiceError},
};

pub fn router() -> Router {
    Router::new().route("/", get(list))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    entity_type: Option<String>,
    entity_id: Option<Uuid>,
    limit: Option<i64>,
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let events = AuditService::new(state)
        .list(query.entity_type, query.entity_id, query.limit.unwrap_or(100))
        .await?;
    Ok(Json(serde_json::json!({ "events": events })))
}
