//! Lookup resources: departments, budget heads, categories.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        catalog::{
            CatalogService, CreateCategoryRequest, CreateLookupRequest, UpdateCategoryRequest,
            UpdateLookupRequest,
        },
        errors::ServiceError,
    },
};

pub fn router() -> Router {
    Router::new()
        .route(
            "/departments",
            get(list_departments).post(create_department),
        )
        .route(
            "/departments/:id",
            get(get_department).put(update_department).delete(delete_department),
        )
        .route(
            "/budget-heads",
            get(list_budget_heads).post(create_budget_head),
        )
        .route(
            "/budget-heads/:id",
            get(get_budget_head).put(update_budget_head).delete(delete_budget_head),
        )
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            put(update_category).delete(delete_category),
        )
}

#[derive(Debug, Deserialize, Default)]
struct ListQuery {
    #[serde(default)]
    include_inactive: bool,
}

async fn list_departments(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let rows = CatalogService::new(state)
        .list_departments(query.include_inactive)
        .await?;
    Ok(Json(serde_json::json!({ "departments": rows })))
}

async fn get_department(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = CatalogService::new(state).get_department(id).await?;
    Ok(Json(serde_json::json!({ "department": row })))
}

async fn create_department(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateLookupRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = CatalogService::new(state)
        .create_department(&user, payload)
        .await?;
    Ok(Json(serde_json::json!({ "department": row })))
}

async fn update_department(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLookupRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = CatalogService::new(state)
        .update_department(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "department": row })))
}

async fn delete_department(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    CatalogService::new(state)
        .deactivate_department(&user, id)
        .await?;
    Ok(Json(serde_json::json!({ "deactivated": id })))
}

async fn list_budget_heads(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let rows = CatalogService::new(state)
        .list_budget_heads(query.include_inactive)
        .await?;
    Ok(Json(serde_json::json!({ "budgetHeads": rows })))
}

async fn get_budget_head(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = CatalogService::new(state).get_budget_head(id).await?;
    Ok(Json(serde_json::json!({ "budgetHead": row })))
}

async fn create_budget_head(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateLookupRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = CatalogService::new(state)
        .create_budget_head(&user, payload)
        .await?;
    Ok(Json(serde_json::json!({ "budgetHead": row })))
}

async fn update_budget_head(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLookupRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = CatalogService::new(state)
        .update_budget_head(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "budgetHead": row })))
}

async fn delete_budget_head(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    CatalogService::new(state)
        .deactivate_budget_head(&user, id)
        .await?;
    Ok(Json(serde_json::json!({ "deactivated": id })))
}

async fn list_categories(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let rows = CatalogService::new(state)
        .list_categories(query.include_inactive)
        .await?;
    Ok(Json(serde_json::json!({ "categories": rows })))
}

async fn create_category(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = CatalogService::new(state)
        .create_category(&user, payload)
        .await?;
    Ok(Json(serde_json::json!({ "category": row })))
}

async fn update_category(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = CatalogService::new(state)
        .update_category(&user, id, payload)
        .await?;
    Ok(Json(serde_json::json!({ "category": row })))
}

async fn delete_category(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    CatalogService::new(state)
        .deactivate_category(&user, id)
        .await?;
    Ok(Json(serde_json::json!({ "deactivated": id })))
}
