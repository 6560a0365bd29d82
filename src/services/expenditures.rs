//! Expenditure submission and approval.
//!
//! Submission checks the bill against the department's allocation under the
//! active overspend policy; approval increments the allocation's spent
//! amount in the same transaction that flips the status, so the balance
//! invariant holds under concurrent approvals.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        fiscal,
        models::{
            Allocation, Attachment, BudgetOverride, Expenditure, ExpenditureStatus, ReviewStatus,
            Role,
        },
        policy::{self, BudgetCheck, BudgetDenial},
        workflow::{apply_expenditure_action, ExpenditureAction as Action},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{audit, fiscal_years, settings},
    validation::rules,
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitExpenditureRequest {
    pub department_id: Uuid,
    pub budget_head_id: Uuid,
    pub financial_year: Option<String>,
    #[validate(length(min = 1, message = "bill number is required"))]
    pub bill_number: String,
    pub bill_date: NaiveDate,
    #[validate(range(min = 1, message = "bill amount must be positive"))]
    pub bill_cents: i64,
    #[validate(length(min = 1, message = "party name is required"))]
    pub party_name: String,
    #[serde(default)]
    pub expense_details: String,
    /// Required when the bill exceeds the remaining allocation and the
    /// overspend policy routes it to an override review.
    pub override_justification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpenditureRemarks {
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectExpenditureRequest {
    #[serde(default)]
    pub rejection_reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ResubmitExpenditureRequest {
    #[serde(default)]
    pub remarks: String,
    pub bill_number: Option<String>,
    pub bill_date: Option<NaiveDate>,
    pub bill_cents: Option<i64>,
    pub party_name: Option<String>,
    pub expense_details: Option<String>,
    pub override_justification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListExpendituresQuery {
    pub status: Option<ExpenditureStatus>,
    pub department: Option<Uuid>,
    pub financial_year: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenditureDetail {
    #[serde(flatten)]
    pub expenditure: Expenditure,
    pub actions: Vec<crate::domain::models::ExpenditureAction>,
    pub attachments: Vec<Attachment>,
    pub budget_override: Option<BudgetOverride>,
}

const EXPENDITURE_COLUMNS: &str =
    "id, department_id, budget_head_id, financial_year, bill_number, bill_date, bill_cents,
     party_name, expense_details, status, resubmission_of, created_by, created_at, updated_at";

const OVERRIDE_COLUMNS: &str =
    "id, expenditure_id, allocation_id, allocated_cents, spent_cents, expense_cents,
     overrun_cents, justification, requested_by, status, decided_by, approved_at, rejected_at,
     created_at";

pub struct ExpenditureService {
    pub state: Arc<AppState>,
}

impl ExpenditureService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(
        &self,
        query: ListExpendituresQuery,
    ) -> Result<Vec<Expenditure>, ServiceError> {
        let rows = sqlx::query_as::<_, Expenditure>(&format!(
            "SELECT {EXPENDITURE_COLUMNS} FROM expenditures
             WHERE ($1::expenditure_status IS NULL OR status = $1)
               AND ($2::uuid IS NULL OR department_id = $2)
               AND ($3::text IS NULL OR financial_year = $3)
               AND ($4::text IS NULL OR bill_number ILIKE '%' || $4 || '%'
                    OR party_name ILIKE '%' || $4 || '%')
             ORDER BY created_at DESC, id DESC
             LIMIT $5 OFFSET $6"
        ))
        .bind(query.status)
        .bind(query.department)
        .bind(query.financial_year)
        .bind(query.search)
        .bind(query.limit.unwrap_or(50).clamp(1, 200))
        .bind(query.offset.unwrap_or(0).max(0))
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<ExpenditureDetail, ServiceError> {
        let expenditure = self.fetch(id).await?;
        self.detail(expenditure).await
    }

    /// Submits a bill. The overspend policy decides what happens when the
    /// amount exceeds the remaining allocation: `disallow` refuses the
    /// submission outright, `require_override` files a budget override that
    /// must be approved before the expenditure itself can be.
    pub async fn submit(
        &self,
        actor: &AuthenticatedUser,
        payload: SubmitExpenditureRequest,
    ) -> Result<ExpenditureDetail, ServiceError> {
        match actor.role {
            Role::Office | Role::Admin => {}
            Role::Department if actor.owns_department(payload.department_id) => {}
            _ => return Err(ServiceError::Forbidden),
        }

        if let Err(errors) = payload.validate() {
            return Err(ServiceError::Validation(rules::collect_field_errors(&errors)));
        }
        let financial_year = match payload.financial_year {
            Some(label) => {
                if let Some(problem) = rules::validate_year_label(&label) {
                    return Err(ServiceError::Validation(vec![problem]));
                }
                label
            }
            None => fiscal::financial_year_of(Utc::now().date_naive()),
        };
        fiscal_years::ensure_postable(&self.state.pool, &financial_year).await?;

        let allocation = self
            .find_allocation(payload.department_id, payload.budget_head_id, &financial_year)
            .await?;
        let overspend = settings::overspend_policy(&self.state.pool).await?;
        let check = policy::check_against_allocation(
            payload.bill_cents,
            allocation.as_ref(),
            overspend,
        )
        .map_err(|denial| match denial {
            BudgetDenial::NoAllocation => ServiceError::NoAllocation,
            BudgetDenial::ExceedsBudget { remaining_cents } => {
                ServiceError::ExceedsBudget { remaining_cents }
            }
        })?;

        let override_input = match check {
            BudgetCheck::Within { .. } => None,
            BudgetCheck::OverrideRequired { overrun_cents, .. } => {
                let text = payload
                    .override_justification
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default();
                if text.is_empty() {
                    return Err(ServiceError::Validation(vec![
                        "override justification is required when the bill exceeds the remaining allocation"
                            .to_string(),
                    ]));
                }
                let allocation = allocation.clone().ok_or_else(|| {
                    ServiceError::Internal("override requires an allocation".to_string())
                })?;
                Some((allocation, text.to_string(), overrun_cents))
            }
        };

        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO expenditures (id, department_id, budget_head_id, financial_year,
                                       bill_number, bill_date, bill_cents, party_name,
                                       expense_details, created_by, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$11)",
        )
        .bind(id)
        .bind(payload.department_id)
        .bind(payload.budget_head_id)
        .bind(&financial_year)
        .bind(payload.bill_number.trim())
        .bind(payload.bill_date)
        .bind(payload.bill_cents)
        .bind(payload.party_name.trim())
        .bind(&payload.expense_details)
        .bind(actor.user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        record_action(&mut tx, id, "submitted", None, actor.user_id).await?;

        if let Some((allocation, justification, overrun_cents)) = override_input {
            sqlx::query(
                "INSERT INTO budget_overrides (id, expenditure_id, allocation_id,
                     allocated_cents, spent_cents, expense_cents, overrun_cents,
                     justification, requested_by)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(allocation.id)
            .bind(allocation.allocated_cents)
            .bind(allocation.spent_cents)
            .bind(payload.bill_cents)
            .bind(overrun_cents)
            .bind(justification)
            .bind(actor.user_id)
            .execute(&mut *tx)
            .await?;
        }

        audit::record(
            &mut *tx,
            "expenditure",
            id,
            "submit",
            Some(actor.user_id),
            Some(serde_json::json!({ "billCents": payload.bill_cents })),
        )
        .await?;
        tx.commit().await.map_err(ServiceError::from)?;

        self.get(id).await
    }

    pub async fn verify(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: ExpenditureRemarks,
    ) -> Result<ExpenditureDetail, ServiceError> {
        let expenditure = self.fetch(id).await?;
        let next = apply_expenditure_action(expenditure.status, Action::Verify, actor.role)
            .map_err(|d| {
                ServiceError::from_denial(d, "expenditure", expenditure.status.as_str(), "verify")
            })?;

        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;
        self.transition(&mut tx, &expenditure, next).await?;
        record_action(&mut tx, id, "verified", payload.remarks, actor.user_id).await?;
        audit::record(&mut *tx, "expenditure", id, "verify", Some(actor.user_id), None).await?;
        tx.commit().await.map_err(ServiceError::from)?;

        self.get(id).await
    }

    /// Approves an expenditure and books it against the allocation. A
    /// pending or rejected override blocks approval.
    pub async fn approve(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: ExpenditureRemarks,
    ) -> Result<ExpenditureDetail, ServiceError> {
        let expenditure = self.fetch(id).await?;
        let next = apply_expenditure_action(expenditure.status, Action::Approve, actor.role)
            .map_err(|d| {
                ServiceError::from_denial(d, "expenditure", expenditure.status.as_str(), "approve")
            })?;

        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;

        let budget_override = sqlx::query_as::<_, BudgetOverride>(&format!(
            "SELECT {OVERRIDE_COLUMNS} FROM budget_overrides WHERE expenditure_id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(ref o) = budget_override {
            match o.status {
                ReviewStatus::Approved => {}
                ReviewStatus::Pending => {
                    return Err(ServiceError::InvalidTransition(
                        "budget override approval is pending".to_string(),
                    ));
                }
                ReviewStatus::Rejected => {
                    return Err(ServiceError::InvalidTransition(
                        "budget override was rejected".to_string(),
                    ));
                }
            }
        }

        self.transition(&mut tx, &expenditure, next).await?;

        let booked = sqlx::query(
            "UPDATE allocations
             SET spent_cents = spent_cents + $4, updated_at = $5
             WHERE department_id = $1 AND budget_head_id = $2 AND financial_year = $3",
        )
        .bind(expenditure.department_id)
        .bind(expenditure.budget_head_id)
        .bind(&expenditure.financial_year)
        .bind(expenditure.bill_cents)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if booked.rows_affected() == 0 {
            return Err(ServiceError::NoAllocation);
        }

        record_action(&mut tx, id, "approved", payload.remarks, actor.user_id).await?;
        audit::record(
            &mut *tx,
            "expenditure",
            id,
            "approve",
            Some(actor.user_id),
            Some(serde_json::json!({ "billCents": expenditure.bill_cents })),
        )
        .await?;
        tx.commit().await.map_err(ServiceError::from)?;

        self.get(id).await
    }

    pub async fn reject(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: RejectExpenditureRequest,
    ) -> Result<ExpenditureDetail, ServiceError> {
        let reason = payload.rejection_reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::Validation(vec![
                "rejection reason is required".to_string(),
            ]));
        }
        let expenditure = self.fetch(id).await?;
        let next = apply_expenditure_action(expenditure.status, Action::Reject, actor.role)
            .map_err(|d| {
                ServiceError::from_denial(d, "expenditure", expenditure.status.as_str(), "reject")
            })?;

        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;
        self.transition(&mut tx, &expenditure, next).await?;
        record_action(&mut tx, id, "rejected", Some(reason.clone()), actor.user_id).await?;
        audit::record(
            &mut *tx,
            "expenditure",
            id,
            "reject",
            Some(actor.user_id),
            Some(serde_json::json!({ "reason": reason })),
        )
        .await?;
        tx.commit().await.map_err(ServiceError::from)?;

        self.get(id).await
    }

    /// Copies a rejected expenditure into a fresh pending record, applying
    /// whatever corrections the submitter made. The budget check runs again
    /// with the corrected amount, and the mandatory remarks describe what
    /// changed.
    pub async fn resubmit(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: ResubmitExpenditureRequest,
    ) -> Result<ExpenditureDetail, ServiceError> {
        let remarks = payload.remarks.trim().to_string();
        if remarks.is_empty() {
            return Err(ServiceError::Validation(vec![
                "remarks describing the correction are required".to_string(),
            ]));
        }
        let original = self.fetch(id).await?;
        match actor.role {
            Role::Office | Role::Admin => {}
            Role::Department if actor.owns_department(original.department_id) => {}
            _ => return Err(ServiceError::Forbidden),
        }
        if original.status != ExpenditureStatus::Rejected {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot resubmit a {} expenditure",
                original.status.as_str()
            )));
        }

        let submission = SubmitExpenditureRequest {
            department_id: original.department_id,
            budget_head_id: original.budget_head_id,
            financial_year: Some(original.financial_year.clone()),
            bill_number: payload.bill_number.unwrap_or(original.bill_number),
            bill_date: payload.bill_date.unwrap_or(original.bill_date),
            bill_cents: payload.bill_cents.unwrap_or(original.bill_cents),
            party_name: payload.party_name.unwrap_or(original.party_name),
            expense_details: payload.expense_details.unwrap_or(original.expense_details),
            override_justification: payload.override_justification,
        };
        let mut copy = self.submit(actor, submission).await?;

        sqlx::query("UPDATE expenditures SET resubmission_of = $2 WHERE id = $1")
            .bind(copy.expenditure.id)
            .bind(original.id)
            .execute(&self.state.pool)
            .await?;
        copy.expenditure.resubmission_of = Some(original.id);

        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;
        record_action(
            &mut tx,
            copy.expenditure.id,
            "resubmitted",
            Some(remarks),
            actor.user_id,
        )
        .await?;
        audit::record(
            &mut *tx,
            "expenditure",
            original.id,
            "resubmit",
            Some(actor.user_id),
            Some(serde_json::json!({ "copyId": copy.expenditure.id })),
        )
        .await?;
        tx.commit().await.map_err(ServiceError::from)?;

        self.get(copy.expenditure.id).await
    }

    /// Decides a pending budget override. Approval unblocks approval of the
    /// expenditure; the decision timestamp is written exactly once.
    pub async fn decide_override(
        &self,
        actor: &AuthenticatedUser,
        override_id: Uuid,
        approve: bool,
    ) -> Result<BudgetOverride, ServiceError> {
        if !matches!(actor.role, Role::Admin | Role::Principal) {
            return Err(ServiceError::Forbidden);
        }
        let (status, stamp_column) = if approve {
            (ReviewStatus::Approved, "approved_at")
        } else {
            (ReviewStatus::Rejected, "rejected_at")
        };
        let decided = sqlx::query_as::<_, BudgetOverride>(&format!(
            "UPDATE budget_overrides
             SET status = $2, decided_by = $3, {stamp_column} = $4
             WHERE id = $1 AND status = 'pending'
             RETURNING {OVERRIDE_COLUMNS}"
        ))
        .bind(override_id)
        .bind(status)
        .bind(actor.user_id)
        .bind(Utc::now())
        .fetch_optional(&self.state.pool)
        .await?;

        let Some(decided) = decided else {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(1) FROM budget_overrides WHERE id = $1",
            )
            .bind(override_id)
            .fetch_one(&self.state.pool)
            .await?;
            return Err(if exists == 0 {
                ServiceError::NotFound
            } else {
                ServiceError::InvalidTransition("override has already been decided".to_string())
            });
        };

        audit::record(
            &self.state.pool,
            "budget_override",
            decided.id,
            if approve { "approve" } else { "reject" },
            Some(actor.user_id),
            None,
        )
        .await?;

        Ok(decided)
    }

    /// Stores a supporting document after checking the configured size and
    /// mime-type limits.
    pub async fn add_attachment(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        file_name: String,
        content_type: String,
        data: bytes::Bytes,
    ) -> Result<Attachment, ServiceError> {
        let expenditure = self.fetch(id).await?;
        match actor.role {
            Role::Office | Role::Admin => {}
            Role::Department if actor.owns_department(expenditure.department_id) => {}
            _ => return Err(ServiceError::Forbidden),
        }

        let limits = &self.state.config.attachments;
        let mut problems = Vec::new();
        if data.len() as u64 > limits.max_bytes {
            problems.push(format!(
                "file exceeds the {} byte limit",
                limits.max_bytes
            ));
        }
        if !limits.allowed_mime_types.iter().any(|m| m == &content_type) {
            problems.push(format!("unsupported file type {content_type}"));
        }
        if !problems.is_empty() {
            return Err(ServiceError::Validation(problems));
        }

        let attachment_id = Uuid::new_v4();
        let file_key = format!("{id}/{attachment_id}-{file_name}");
        let size = data.len() as i64;
        self.state
            .storage
            .put(&file_key, data, &content_type)
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        let attachment = sqlx::query_as::<_, Attachment>(
            "INSERT INTO attachments (id, expenditure_id, file_key, file_name, mime_type,
                                      size_bytes, uploaded_by)
             VALUES ($1,$2,$3,$4,$5,$6,$7)
             RETURNING id, expenditure_id, file_key, file_name, mime_type, size_bytes,
                       uploaded_by, created_at",
        )
        .bind(attachment_id)
        .bind(id)
        .bind(&file_key)
        .bind(&file_name)
        .bind(&content_type)
        .bind(size)
        .bind(actor.user_id)
        .fetch_one(&self.state.pool)
        .await?;
        Ok(attachment)
    }

    /// Status-conditioned update; a concurrent change surfaces as a
    /// conflict rather than a second transition.
    async fn transition(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        expenditure: &Expenditure,
        next: ExpenditureStatus,
    ) -> Result<(), ServiceError> {
        let changed = sqlx::query(
            "UPDATE expenditures SET status = $2, updated_at = $3
             WHERE id = $1 AND status = $4",
        )
        .bind(expenditure.id)
        .bind(next)
        .bind(Utc::now())
        .bind(expenditure.status)
        .execute(&mut **tx)
        .await?;
        if changed.rows_affected() == 0 {
            return Err(ServiceError::Conflict(
                "expenditure changed concurrently".to_string(),
            ));
        }
        Ok(())
    }

    async fn find_allocation(
        &self,
        department_id: Uuid,
        budget_head_id: Uuid,
        financial_year: &str,
    ) -> Result<Option<Allocation>, ServiceError> {
        let allocation = sqlx::query_as::<_, Allocation>(
            "SELECT id, department_id, budget_head_id, financial_year, allocated_cents,
                    spent_cents, remarks, source_proposal_id, source_item_id, created_at,
                    updated_at
             FROM allocations
             WHERE department_id = $1 AND budget_head_id = $2 AND financial_year = $3",
        )
        .bind(department_id)
        .bind(budget_head_id)
        .bind(financial_year)
        .fetch_optional(&self.state.pool)
        .await?;
        Ok(allocation)
    }

    async fn fetch(&self, id: Uuid) -> Result<Expenditure, ServiceError> {
        sqlx::query_as::<_, Expenditure>(&format!(
            "SELECT {EXPENDITURE_COLUMNS} FROM expenditures WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)
    }

    async fn detail(&self, expenditure: Expenditure) -> Result<ExpenditureDetail, ServiceError> {
        let actions = sqlx::query_as::<_, crate::domain::models::ExpenditureAction>(
            "SELECT id, expenditure_id, decision, remarks, actor_id, created_at
             FROM expenditure_actions WHERE expenditure_id = $1 ORDER BY created_at, id",
        )
        .bind(expenditure.id)
        .fetch_all(&self.state.pool)
        .await?;
        let attachments = sqlx::query_as::<_, Attachment>(
            "SELECT id, expenditure_id, file_key, file_name, mime_type, size_bytes,
                    uploaded_by, created_at
             FROM attachments WHERE expenditure_id = $1 ORDER BY created_at",
        )
        .bind(expenditure.id)
        .fetch_all(&self.state.pool)
        .await?;
        let budget_override = sqlx::query_as::<_, BudgetOverride>(&format!(
            "SELECT {OVERRIDE_COLUMNS} FROM budget_overrides WHERE expenditure_id = $1"
        ))
        .bind(expenditure.id)
        .fetch_optional(&self.state.pool)
        .await?;

        Ok(ExpenditureDetail {
            expenditure,
            actions,
            attachments,
            budget_override,
        })
    }
}

async fn record_action(
    tx: &mut Transaction<'_, Postgres>,
    expenditure_id: Uuid,
    decision: &str,
    remarks: Option<String>,
    actor_id: Uuid,
) -> Result<(), ServiceError> {
    sqlx::query(
        "INSERT INTO expenditure_actions (id, expenditure_id, decision, remarks, actor_id)
         VALUES ($1,$2,$3,$4,$5)",
    )
    .bind(Uuid::new_v4())
    .bind(expenditure_id)
    .bind(decision)
    .bind(remarks)
    .bind(actor_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
