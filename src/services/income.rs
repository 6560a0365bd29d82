use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::models::{Income, IncomeCategory, IncomeSource, IncomeStatus, Role},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::audit,
    validation::rules,
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize)]
pub struct CreateIncomeRequest {
    pub financial_year: String,
    pub source: IncomeSource,
    pub category: IncomeCategory,
    pub amount_cents: i64,
    pub expected_date: NaiveDate,
    pub reference_number: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReceiveIncomeRequest {
    pub received_date: Option<NaiveDate>,
    pub reference_number: Option<String>,
}

pub struct IncomeService {
    pub state: Arc<AppState>,
}

impl IncomeService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(
        &self,
        financial_year: Option<String>,
        status: Option<IncomeStatus>,
    ) -> Result<Vec<Income>, ServiceError> {
        let rows = sqlx::query_as::<_, Income>(
            r#"
            SELECT id, financial_year, source, category, amount_cents, expected_date,
                   received_date, status, reference_number, created_at, updated_at
            FROM income
            WHERE ($1::text IS NULL OR financial_year = $1)
              AND ($2::income_status IS NULL OR status = $2)
            ORDER BY expected_date DESC, id
            "#,
        )
        .bind(financial_year)
        .bind(status)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateIncomeRequest,
    ) -> Result<Income, ServiceError> {
        if !matches!(actor.role, Role::Office | Role::Admin) {
            return Err(ServiceError::Forbidden);
        }
        let mut problems = Vec::new();
        if let Some(problem) = rules::validate_year_label(&payload.financial_year) {
            problems.push(problem);
        }
        if payload.amount_cents <= 0 {
            problems.push("amount must be positive".to_string());
        }
        if !problems.is_empty() {
            return Err(ServiceError::Validation(problems));
        }
        let now = Utc::now();
        let income = sqlx::query_as::<_, Income>(
            "INSERT INTO income (id, financial_year, source, category, amount_cents,
                                 expected_date, reference_number, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
             RETURNING id, financial_year, source, category, amount_cents, expected_date,
                       received_date, status, reference_number, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&payload.financial_year)
        .bind(payload.source)
        .bind(payload.category)
        .bind(payload.amount_cents)
        .bind(payload.expected_date)
        .bind(payload.reference_number)
        .bind(now)
        .fetch_one(&self.state.pool)
        .await?;
        Ok(income)
    }

    /// Marks an expected income as received, defaulting the received date to
    /// today when the caller does not supply one.
    pub async fn receive(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: ReceiveIncomeRequest,
    ) -> Result<Income, ServiceError> {
        if !matches!(actor.role, Role::Office | Role::Admin) {
            return Err(ServiceError::Forbidden);
        }
        let received = payload
            .received_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let income = sqlx::query_as::<_, Income>(
            "UPDATE income
             SET status = 'received', received_date = $2,
                 reference_number = COALESCE($3, reference_number), updated_at = $4
             WHERE id = $1 AND status = 'expected'
             RETURNING id, financial_year, source, category, amount_cents, expected_date,
                       received_date, status, reference_number, created_at, updated_at",
        )
        .bind(id)
        .bind(received)
        .bind(payload.reference_number)
        .bind(Utc::now())
        .fetch_optional(&self.state.pool)
        .await?;

        match income {
            Some(income) => {
                audit::record(
                    &self.state.pool,
                    "income",
                    id,
                    "receive",
                    Some(actor.user_id),
                    None,
                )
                .await?;
                Ok(income)
            }
            None => self.transition_failure(id, "receive").await,
        }
    }

    /// Final confirmation of a received income. Restricted to the principal
    /// and admin.
    pub async fn verify(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<Income, ServiceError> {
        if !matches!(actor.role, Role::Principal | Role::Admin) {
            return Err(ServiceError::Forbidden);
        }
        let income = sqlx::query_as::<_, Income>(
            "UPDATE income SET status = 'verified', updated_at = $2
             WHERE id = $1 AND status = 'received'
             RETURNING id, financial_year, source, category, amount_cents, expected_date,
                       received_date, status, reference_number, created_at, updated_at",
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&self.state.pool)
        .await?;

        match income {
            Some(income) => {
                audit::record(
                    &self.state.pool,
                    "income",
                    id,
                    "verify",
                    Some(actor.user_id),
                    None,
                )
                .await?;
                Ok(income)
            }
            None => self.transition_failure(id, "verify").await,
        }
    }

    /// Distinguishes a missing record from one in the wrong status once a
    /// guarded update matched nothing.
    async fn transition_failure(&self, id: Uuid, action: &str) -> Result<Income, ServiceError> {
        let status = sqlx::query_scalar::<_, IncomeStatus>("SELECT status FROM income WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.state.pool)
            .await?;
        match status {
            None => Err(ServiceError::NotFound),
            Some(status) => Err(ServiceError::InvalidTransition(format!(
                "cannot {action} a {} income record",
                match status {
                    IncomeStatus::Expected => "expected",
                    IncomeStatus::Received => "received",
                    IncomeStatus::Verified => "verified",
                }
            ))),
        }
    }
}
