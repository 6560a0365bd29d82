//! Financial-year registry and lifecycle.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::{
        models::{FinancialYear, FiscalYearStatus, Role},
        workflow::{apply_fiscal_year_action, FiscalYearAction},
    },
    infrastructure::{auth::AuthenticatedUser, db::PgPool, state::AppState},
    services::audit,
    validation::rules,
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize)]
pub struct CreateFinancialYearRequest {
    pub label: String,
}

/// Refuses postings against a locked or closed year. Years that were never
/// registered are treated as open: registration is optional bookkeeping.
pub async fn ensure_postable(pool: &PgPool, label: &str) -> Result<(), ServiceError> {
    let status = sqlx::query_scalar::<_, FiscalYearStatus>(
        "SELECT status FROM financial_years WHERE label = $1",
    )
    .bind(label)
    .fetch_optional(pool)
    .await?;
    match status {
        Some(status) if !status.accepts_postings() => Err(ServiceError::InvalidTransition(
            format!("financial year {label} is {}", status.as_str()),
        )),
        _ => Ok(()),
    }
}

pub struct FiscalYearService {
    pub state: Arc<AppState>,
}

impl FiscalYearService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(&self) -> Result<Vec<FinancialYear>, ServiceError> {
        let years = sqlx::query_as::<_, FinancialYear>(
            "SELECT id, label, status, total_allocated_cents, total_spent_cents,
                    total_income_cents, recalculated_at, created_at
             FROM financial_years ORDER BY label DESC",
        )
        .fetch_all(&self.state.pool)
        .await?;
        Ok(years)
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateFinancialYearRequest,
    ) -> Result<FinancialYear, ServiceError> {
        if !matches!(actor.role, Role::Admin | Role::Principal) {
            return Err(ServiceError::Forbidden);
        }
        if let Some(problem) = rules::validate_year_label(&payload.label) {
            return Err(ServiceError::Validation(vec![problem]));
        }
        let year = sqlx::query_as::<_, FinancialYear>(
            "INSERT INTO financial_years (id, label) VALUES ($1,$2)
             RETURNING id, label, status, total_allocated_cents, total_spent_cents,
                       total_income_cents, recalculated_at, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&payload.label)
        .fetch_one(&self.state.pool)
        .await?;
        Ok(year)
    }

    /// Applies a lifecycle action (activate, lock, close). The update is
    /// conditioned on the status the transition was resolved against, so a
    /// concurrent change surfaces as a conflict instead of a double apply.
    pub async fn apply(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        action: FiscalYearAction,
    ) -> Result<FinancialYear, ServiceError> {
        let current = sqlx::query_as::<_, FinancialYear>(
            "SELECT id, label, status, total_allocated_cents, total_spent_cents,
                    total_income_cents, recalculated_at, created_at
             FROM financial_years WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;

        let next = apply_fiscal_year_action(current.status, action, actor.role).map_err(|d| {
            ServiceError::from_denial(d, "financial year", current.status.as_str(), action.as_str())
        })?;

        let year = sqlx::query_as::<_, FinancialYear>(
            "UPDATE financial_years SET status = $2 WHERE id = $1 AND status = $3
             RETURNING id, label, status, total_allocated_cents, total_spent_cents,
                       total_income_cents, recalculated_at, created_at",
        )
        .bind(id)
        .bind(next)
        .bind(current.status)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or_else(|| ServiceError::Conflict("financial year changed concurrently".to_string()))?;

        audit::record(
            &self.state.pool,
            "financial_year",
            id,
            action.as_str(),
            Some(actor.user_id),
            None,
        )
        .await?;

        Ok(year)
    }

    /// Re-aggregates the year's totals from allocations and income. Income
    /// counts once it has actually arrived (received or verified).
    pub async fn recalculate(&self, id: Uuid) -> Result<FinancialYear, ServiceError> {
        let label = sqlx::query_scalar::<_, String>(
            "SELECT label FROM financial_years WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;

        let (allocated, spent) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(SUM(allocated_cents), 0), COALESCE(SUM(spent_cents), 0)
             FROM allocations WHERE financial_year = $1",
        )
        .bind(&label)
        .fetch_one(&self.state.pool)
        .await?;

        let income = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM income
             WHERE financial_year = $1 AND status <> 'expected'",
        )
        .bind(&label)
        .fetch_one(&self.state.pool)
        .await?;

        let year = sqlx::query_as::<_, FinancialYear>(
            "UPDATE financial_years
             SET total_allocated_cents = $2, total_spent_cents = $3,
                 total_income_cents = $4, recalculated_at = $5
             WHERE id = $1
             RETURNING id, label, status, total_allocated_cents, total_spent_cents,
                       total_income_cents, recalculated_at, created_at",
        )
        .bind(id)
        .bind(allocated)
        .bind(spent)
        .bind(income)
        .bind(Utc::now())
        .fetch_one(&self.state.pool)
        .await?;
        Ok(year)
    }
}
