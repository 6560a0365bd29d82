//! Allocations and the amendment review flow.
//!
//! An allocation's department, budget head, and financial year never change
//! after creation. The allocated amount changes only through an approved
//! amendment; remarks are the single directly-editable field.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{
        models::{Allocation, AllocationAmendment, ReviewStatus, Role},
        policy,
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{audit, fiscal_years},
    validation::rules,
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize)]
pub struct CreateAllocationRequest {
    pub department_id: Uuid,
    pub budget_head_id: Uuid,
    pub financial_year: String,
    pub allocated_cents: i64,
    pub remarks: Option<String>,
    pub source_proposal_id: Option<Uuid>,
    pub source_item_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRemarksRequest {
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AmendmentRequest {
    pub requested_cents: i64,
    pub change_reason: String,
}

/// An allocation with its derived balance fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationView {
    #[serde(flatten)]
    pub allocation: Allocation,
    pub remaining_cents: i64,
    pub remaining_display_cents: i64,
}

impl From<Allocation> for AllocationView {
    fn from(allocation: Allocation) -> Self {
        let remaining_cents = allocation.remaining_cents();
        let remaining_display_cents = allocation.remaining_display_cents();
        Self {
            allocation,
            remaining_cents,
            remaining_display_cents,
        }
    }
}

const ALLOCATION_COLUMNS: &str =
    "id, department_id, budget_head_id, financial_year, allocated_cents, spent_cents,
     remarks, source_proposal_id, source_item_id, created_at, updated_at";

const AMENDMENT_COLUMNS: &str =
    "id, allocation_id, original_cents, requested_cents, change_cents, change_pct,
     change_reason, requested_by, status, decided_by, approved_at, rejected_at, created_at";

pub struct AllocationService {
    pub state: Arc<AppState>,
}

impl AllocationService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(
        &self,
        financial_year: Option<String>,
        department_id: Option<Uuid>,
    ) -> Result<Vec<AllocationView>, ServiceError> {
        let rows = sqlx::query_as::<_, Allocation>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations
             WHERE ($1::text IS NULL OR financial_year = $1)
               AND ($2::uuid IS NULL OR department_id = $2)
             ORDER BY financial_year DESC, created_at"
        ))
        .bind(financial_year)
        .bind(department_id)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows.into_iter().map(AllocationView::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<AllocationView, ServiceError> {
        let allocation = sqlx::query_as::<_, Allocation>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        Ok(allocation.into())
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateAllocationRequest,
    ) -> Result<AllocationView, ServiceError> {
        if !matches!(actor.role, Role::Office | Role::Admin) {
            return Err(ServiceError::Forbidden);
        }
        let mut problems = Vec::new();
        if let Some(problem) = rules::validate_year_label(&payload.financial_year) {
            problems.push(problem);
        }
        if payload.allocated_cents <= 0 {
            problems.push("allocated amount must be positive".to_string());
        }
        if !problems.is_empty() {
            return Err(ServiceError::Validation(problems));
        }
        fiscal_years::ensure_postable(&self.state.pool, &payload.financial_year).await?;

        let now = Utc::now();
        let allocation = sqlx::query_as::<_, Allocation>(&format!(
            "INSERT INTO allocations (id, department_id, budget_head_id, financial_year,
                                      allocated_cents, remarks, source_proposal_id,
                                      source_item_id, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$9)
             RETURNING {ALLOCATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(payload.department_id)
        .bind(payload.budget_head_id)
        .bind(&payload.financial_year)
        .bind(payload.allocated_cents)
        .bind(payload.remarks)
        .bind(payload.source_proposal_id)
        .bind(payload.source_item_id)
        .bind(now)
        .fetch_one(&self.state.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => ServiceError::Conflict(
                "an allocation already exists for this department, budget head and year"
                    .to_string(),
            ),
            other => other.into(),
        })?;

        audit::record(
            &self.state.pool,
            "allocation",
            allocation.id,
            "create",
            Some(actor.user_id),
            Some(serde_json::json!({ "allocatedCents": allocation.allocated_cents })),
        )
        .await?;

        Ok(allocation.into())
    }

    pub async fn update_remarks(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateRemarksRequest,
    ) -> Result<AllocationView, ServiceError> {
        if !matches!(actor.role, Role::Office | Role::Admin) {
            return Err(ServiceError::Forbidden);
        }
        let allocation = sqlx::query_as::<_, Allocation>(&format!(
            "UPDATE allocations SET remarks = $2, updated_at = $3 WHERE id = $1
             RETURNING {ALLOCATION_COLUMNS}"
        ))
        .bind(id)
        .bind(payload.remarks)
        .bind(Utc::now())
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        Ok(allocation.into())
    }

    pub async fn list_amendments(
        &self,
        allocation_id: Uuid,
    ) -> Result<Vec<AllocationAmendment>, ServiceError> {
        let rows = sqlx::query_as::<_, AllocationAmendment>(&format!(
            "SELECT {AMENDMENT_COLUMNS} FROM allocation_amendments
             WHERE allocation_id = $1 ORDER BY created_at DESC"
        ))
        .bind(allocation_id)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows)
    }

    /// Files an amendment against an allocation. The allocation itself is
    /// untouched until the amendment is approved.
    pub async fn request_amendment(
        &self,
        actor: &AuthenticatedUser,
        allocation_id: Uuid,
        payload: AmendmentRequest,
    ) -> Result<AllocationAmendment, ServiceError> {
        let allocation = sqlx::query_as::<_, Allocation>(&format!(
            "SELECT {ALLOCATION_COLUMNS} FROM allocations WHERE id = $1"
        ))
        .bind(allocation_id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;

        match actor.role {
            Role::Office | Role::Admin => {}
            Role::Department if actor.owns_department(allocation.department_id) => {}
            _ => return Err(ServiceError::Forbidden),
        }

        let mut problems = Vec::new();
        if payload.requested_cents <= 0 {
            problems.push("requested amount must be positive".to_string());
        }
        if payload.change_reason.trim().is_empty() {
            problems.push("change reason is required".to_string());
        }
        if !problems.is_empty() {
            return Err(ServiceError::Validation(problems));
        }

        let original = allocation.allocated_cents;
        let change = payload.requested_cents - original;
        let amendment = sqlx::query_as::<_, AllocationAmendment>(&format!(
            "INSERT INTO allocation_amendments (id, allocation_id, original_cents,
                 requested_cents, change_cents, change_pct, change_reason, requested_by)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
             RETURNING {AMENDMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(allocation_id)
        .bind(original)
        .bind(payload.requested_cents)
        .bind(change)
        .bind(policy::change_percent(original, change))
        .bind(payload.change_reason.trim())
        .bind(actor.user_id)
        .fetch_one(&self.state.pool)
        .await?;

        audit::record(
            &self.state.pool,
            "allocation_amendment",
            amendment.id,
            "request",
            Some(actor.user_id),
            Some(serde_json::json!({
                "allocationId": allocation_id,
                "requestedCents": payload.requested_cents,
            })),
        )
        .await?;

        Ok(amendment)
    }

    /// Decides a pending amendment. Approval applies the requested amount to
    /// the allocation in the same transaction; either outcome stamps its
    /// decision timestamp exactly once. A second decision attempt finds no
    /// pending row and is refused.
    pub async fn decide_amendment(
        &self,
        actor: &AuthenticatedUser,
        amendment_id: Uuid,
        approve: bool,
    ) -> Result<AllocationAmendment, ServiceError> {
        if !matches!(actor.role, Role::Office | Role::Admin | Role::Principal) {
            return Err(ServiceError::Forbidden);
        }

        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;
        let now = Utc::now();
        let (status, stamp_column) = if approve {
            (ReviewStatus::Approved, "approved_at")
        } else {
            (ReviewStatus::Rejected, "rejected_at")
        };

        let amendment = sqlx::query_as::<_, AllocationAmendment>(&format!(
            "UPDATE allocation_amendments
             SET status = $2, decided_by = $3, {stamp_column} = $4
             WHERE id = $1 AND status = 'pending'
             RETURNING {AMENDMENT_COLUMNS}"
        ))
        .bind(amendment_id)
        .bind(status)
        .bind(actor.user_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(amendment) = amendment else {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(1) FROM allocation_amendments WHERE id = $1",
            )
            .bind(amendment_id)
            .fetch_one(&mut *tx)
            .await?;
            return Err(if exists == 0 {
                ServiceError::NotFound
            } else {
                ServiceError::InvalidTransition(
                    "amendment has already been decided".to_string(),
                )
            });
        };

        if approve {
            sqlx::query(
                "UPDATE allocations SET allocated_cents = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(amendment.allocation_id)
            .bind(amendment.requested_cents)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        audit::record(
            &mut *tx,
            "allocation_amendment",
            amendment.id,
            if approve { "approve" } else { "reject" },
            Some(actor.user_id),
            None,
        )
        .await?;

        tx.commit().await.map_err(ServiceError::from)?;
        Ok(amendment)
    }
}
