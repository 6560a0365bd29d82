use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        settings::{SettingsService, UpdateSettingsRequest},
    },
};

pub fn router() -> Router {
    Router::new().route("/", get(get_settings).put(update_settings))
}

async fn get_settings(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let settings = SettingsService::new(state).get().await?;
    Ok(Json(serde_json::json!({ "settings": settings })))
}

async fn update_settings(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let settings = SettingsService::new(state).update(&user, payload).await?;
    Ok(Json(serde_json::json!({ "settings": settings })))
}
