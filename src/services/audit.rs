//! Append-only audit trail for workflow transitions.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{domain::models::AuditEvent, infrastructure::state::AppState};

use super::errors::ServiceError;

/// Appends one audit event. Takes any executor so callers can write the
/// event inside the same transaction as the transition it records.
pub async fn record<'e, E>(
    executor: E,
    entity_type: &str,
    entity_id: Uuid,
    event: &str,
    actor_id: Option<Uuid>,
    detail: Option<serde_json::Value>,
) -> Result<(), ServiceError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO audit_events (id, entity_type, entity_id, event, actor_id, detail, created_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7)",
    )
    .bind(Uuid::new_v4())
    .bind(entity_type)
    .bind(entity_id)
    .bind(event)
    .bind(actor_id)
    .bind(detail)
    .bind(Utc::now())
    .execute(executor)
    .await?;
    Ok(())
}

pub struct AuditService {
    pub state: Arc<AppState>,
}

impl AuditService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(
        &self,
        entity_type: Option<String>,
        entity_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, ServiceError> {
        let events = sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT id, entity_type, entity_id, event, actor_id, detail, created_at
            FROM audit_events
            WHERE ($1::text IS NULL OR entity_type = $1)
              AND ($2::uuid IS NULL OR entity_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.state.pool)
        .await?;
        Ok(events)
    }
}
