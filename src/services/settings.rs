use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::{
    domain::models::{OverspendPolicy, Role, Settings},
    infrastructure::{auth::AuthenticatedUser, db::PgPool, state::AppState},
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub overspend_policy: OverspendPolicy,
}

/// Reads the active overspend policy. Used by expenditure submission, which
/// must consult the policy on every request.
pub async fn overspend_policy(pool: &PgPool) -> Result<OverspendPolicy, ServiceError> {
    let settings = sqlx::query_as::<_, Settings>(
        "SELECT overspend_policy, updated_by, updated_at FROM settings WHERE id",
    )
    .fetch_one(pool)
    .await?;
    Ok(settings.overspend_policy)
}

pub struct SettingsService {
    pub state: Arc<AppState>,
}

impl SettingsService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn get(&self) -> Result<Settings, ServiceError> {
        let settings = sqlx::query_as::<_, Settings>(
            "SELECT overspend_policy, updated_by, updated_at FROM settings WHERE id",
        )
        .fetch_one(&self.state.pool)
        .await?;
        Ok(settings)
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        payload: UpdateSettingsRequest,
    ) -> Result<Settings, ServiceError> {
        if actor.role != Role::Admin {
            return Err(ServiceError::Forbidden);
        }
        let settings = sqlx::query_as::<_, Settings>(
            "UPDATE settings SET overspend_policy=$1, updated_by=$2, updated_at=$3 WHERE id
             RETURNING overspend_policy, updated_by, updated_at",
        )
        .bind(payload.overspend_policy)
        .bind(actor.user_id)
        .bind(Utc::now())
        .fetch_one(&self.state.pool)
        .await?;
        Ok(settings)
    }
}
