use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        users::{CreateUserRequest, UpdateUserRequest, UserService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(deactivate))
}

async fn get_one(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let found = UserService::new(state).get(&user, id).await?;
    Ok(Json(serde_json::json!({ "user": found })))
}

async fn deactivate(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    UserService::new(state).deactivate(&user, id).await?;
    Ok(Json(serde_json::json!({ "deactivated": id })))
}

async fn list(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let users = UserService::new(state).list(&user).await?;
    Ok(Json(serde_json::json!({ "users": users })))
}

async fn create(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let created = UserService::new(state).create(&user, payload).await?;
    Ok(Json(serde_json::json!({ "user": created })))
}

async fn update(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let updated = UserService::new(state).update(&user, id, payload).await?;
    Ok(Json(serde_json::json!({ "user": updated })))
}
