//! Budget proposal lifecycle.
//!
//! Proposals move draft → submitted → verified → approved, or out to
//! rejected; a rejected proposal can be resubmitted as a fresh draft that
//! deep-copies its items. Every transition consults the shared table in
//! `domain::workflow`, is written as a status-conditioned update, and leaves
//! an audit event.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    domain::{
        models::{BudgetProposal, ProposalItem, ProposalStatus, Role},
        workflow::{apply_proposal_action, ProposalAction},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        allocations::{AllocationService, AllocationView, CreateAllocationRequest},
        audit,
    },
    validation::rules,
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize)]
pub struct ProposalItemInput {
    pub budget_head_id: Uuid,
    pub proposed_cents: i64,
    #[serde(default)]
    pub justification: String,
    pub prev_year_utilization_pct: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub financial_year: String,
    pub department_id: Uuid,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<ProposalItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProposalRequest {
    pub notes: Option<String>,
    pub items: Vec<ProposalItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct RemarksRequest {
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub rejection_reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListProposalsQuery {
    pub status: Option<ProposalStatus>,
    pub department: Option<Uuid>,
    pub financial_year: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalDetail {
    #[serde(flatten)]
    pub proposal: BudgetProposal,
    pub items: Vec<ProposalItem>,
}

const PROPOSAL_COLUMNS: &str =
    "id, financial_year, department_id, status, notes, submitted_date, rejection_reason,
     revision_of, total_proposed_cents, created_by, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, proposal_id, position, budget_head_id, proposed_cents, justification,
     prev_year_utilization_pct";

pub struct ProposalService {
    pub state: Arc<AppState>,
}

impl ProposalService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(&self, query: ListProposalsQuery) -> Result<Vec<BudgetProposal>, ServiceError> {
        let rows = sqlx::query_as::<_, BudgetProposal>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM budget_proposals
             WHERE ($1::proposal_status IS NULL OR status = $1)
               AND ($2::uuid IS NULL OR department_id = $2)
               AND ($3::text IS NULL OR financial_year = $3)
               AND ($4::text IS NULL OR notes ILIKE '%' || $4 || '%')
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

    pub async fn get(&self, id: Uuid) -> Result<ProposalDetail, ServiceError> {
        let proposal = self.fetch(id).await?;
        let items = self.fetch_items(id).await?;
        Ok(ProposalDetail { proposal, items })
    }

    pub async fn create_draft(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateProposalRequest,
    ) -> Result<ProposalDetail, ServiceError> {
        if actor.role != Role::Department {
            return Err(ServiceError::Forbidden);
        }
        if !actor.owns_department(payload.department_id) {
            return Err(ServiceError::Forbidden);
        }
        if let Some(problem) = rules::validate_year_label(&payload.financial_year) {
            return Err(ServiceError::Validation(vec![problem]));
        }

        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO budget_proposals (id, financial_year, department_id, status, notes,
                                           created_by, created_at, updated_at)
             VALUES ($1,$2,$3,'draft',$4,$5,$6,$6)",
        )
        .bind(id)
        .bind(&payload.financial_year)
        .bind(payload.department_id)
        .bind(payload.notes)
        .bind(actor.user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        replace_items(&mut tx, id, &payload.items).await?;
        recompute_total(&mut tx, id).await?;
        audit::record(&mut *tx, "proposal", id, "create", Some(actor.user_id), None).await?;
        tx.commit().await.map_err(ServiceError::from)?;

        self.get(id).await
    }

    /// Rewrites the item list and notes of a draft (or revision copy). Any
    /// other status refuses the edit.
    pub async fn update_draft(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateProposalRequest,
    ) -> Result<ProposalDetail, ServiceError> {
        let proposal = self.fetch(id).await?;
        self.ensure_owner(actor, &proposal)?;
        if !matches!(proposal.status, ProposalStatus::Draft | ProposalStatus::Revised) {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot edit a {} proposal",
                proposal.status.as_str()
            )));
        }

        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;
        sqlx::query("UPDATE budget_proposals SET notes = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(payload.notes)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM proposal_items WHERE proposal_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        replace_items(&mut tx, id, &payload.items).await?;
        recompute_total(&mut tx, id).await?;
        tx.commit().await.map_err(ServiceError::from)?;

        self.get(id).await
    }

    /// Submits a draft for review. Every item must carry a budget head, a
    /// positive amount, and a justification; the full list of problems comes
    /// back in one error.
    pub async fn submit(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<ProposalDetail, ServiceError> {
        let proposal = self.fetch(id).await?;
        self.ensure_owner(actor, &proposal)?;
        let next = apply_proposal_action(proposal.status, ProposalAction::Submit, actor.role)
            .map_err(|d| {
                ServiceError::from_denial(d, "proposal", proposal.status.as_str(), "submit")
            })?;

        let items = self.fetch_items(id).await?;
        let problems = rules::validate_proposal_items(&items);
        if !problems.is_empty() {
            return Err(ServiceError::Validation(problems));
        }

        let now = Utc::now();
        let updated = sqlx::query_as::<_, BudgetProposal>(&format!(
            "UPDATE budget_proposals
             SET status = $2, submitted_date = $3, updated_at = $3
             WHERE id = $1 AND status = $4
             RETURNING {PROPOSAL_COLUMNS}"
        ))
        .bind(id)
        .bind(next)
        .bind(now)
        .bind(proposal.status)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or_else(|| ServiceError::Conflict("proposal changed concurrently".to_string()))?;

        audit::record(
            &self.state.pool,
            "proposal",
            id,
            "submit",
            Some(actor.user_id),
            Some(serde_json::json!({ "totalProposedCents": updated.total_proposed_cents })),
        )
        .await?;

        let items = self.fetch_items(id).await?;
        Ok(ProposalDetail {
            proposal: updated,
            items,
        })
    }

    pub async fn verify(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: RemarksRequest,
    ) -> Result<ProposalDetail, ServiceError> {
        self.transition(
            actor,
            id,
            ProposalAction::Verify,
            payload.remarks.map(|r| serde_json::json!({ "remarks": r })),
        )
        .await
    }

    pub async fn approve(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<ProposalDetail, ServiceError> {
        self.transition(actor, id, ProposalAction::Approve, None).await
    }

    pub async fn reject(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: RejectRequest,
    ) -> Result<ProposalDetail, ServiceError> {
        let reason = payload.rejection_reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::Validation(vec![
                "rejection reason is required".to_string(),
            ]));
        }

        let proposal = self.fetch(id).await?;
        let next = apply_proposal_action(proposal.status, ProposalAction::Reject, actor.role)
            .map_err(|d| {
                ServiceError::from_denial(d, "proposal", proposal.status.as_str(), "reject")
            })?;

        let updated = sqlx::query_as::<_, BudgetProposal>(&format!(
            "UPDATE budget_proposals
             SET status = $2, rejection_reason = $3, updated_at = $4
             WHERE id = $1 AND status = $5
             RETURNING {PROPOSAL_COLUMNS}"
        ))
        .bind(id)
        .bind(next)
        .bind(&reason)
        .bind(Utc::now())
        .bind(proposal.status)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or_else(|| ServiceError::Conflict("proposal changed concurrently".to_string()))?;

        audit::record(
            &self.state.pool,
            "proposal",
            id,
            "reject",
            Some(actor.user_id),
            Some(serde_json::json!({ "reason": reason })),
        )
        .await?;

        let items = self.fetch_items(id).await?;
        Ok(ProposalDetail {
            proposal: updated,
            items,
        })
    }

    /// Copies a rejected proposal into a fresh draft. Items come across
    /// field for field under new identifiers; the original moves to
    /// `revised` and both records keep the link for audit.
    pub async fn resubmit(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<ProposalDetail, ServiceError> {
        let original = self.fetch(id).await?;
        self.ensure_owner(actor, &original)?;
        let superseded =
            apply_proposal_action(original.status, ProposalAction::Resubmit, actor.role).map_err(
                |d| ServiceError::from_denial(d, "proposal", original.status.as_str(), "resubmit"),
            )?;

        let items = self.fetch_items(id).await?;
        let mut tx = self.state.pool.begin().await.map_err(ServiceError::from)?;
        let copy_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO budget_proposals (id, financial_year, department_id, status, notes,
                                           revision_of, total_proposed_cents, created_by,
                                           created_at, updated_at)
             VALUES ($1,$2,$3,'draft',$4,$5,$6,$7,$8,$8)",
        )
        .bind(copy_id)
        .bind(&original.financial_year)
        .bind(original.department_id)
        .bind(&original.notes)
        .bind(original.id)
        .bind(original.total_proposed_cents)
        .bind(actor.user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "INSERT INTO proposal_items (id, proposal_id, position, budget_head_id,
                                             proposed_cents, justification, prev_year_utilization_pct)
                 VALUES ($1,$2,$3,$4,$5,$6,$7)",
            )
            .bind(Uuid::new_v4())
            .bind(copy_id)
            .bind(item.position)
            .bind(item.budget_head_id)
            .bind(item.proposed_cents)
            .bind(&item.justification)
            .bind(item.prev_year_utilization_pct)
            .execute(&mut *tx)
            .await?;
        }

        let changed = sqlx::query(
            "UPDATE budget_proposals SET status = $2, updated_at = $3
             WHERE id = $1 AND status = $4",
        )
        .bind(original.id)
        .bind(superseded)
        .bind(now)
        .bind(original.status)
        .execute(&mut *tx)
        .await?;
        if changed.rows_affected() == 0 {
            return Err(ServiceError::Conflict(
                "proposal changed concurrently".to_string(),
            ));
        }

        audit::record(
            &mut *tx,
            "proposal",
            original.id,
            "resubmit",
            Some(actor.user_id),
            Some(serde_json::json!({ "copyId": copy_id })),
        )
        .await?;
        audit::record(
            &mut *tx,
            "proposal",
            copy_id,
            "create",
            Some(actor.user_id),
            Some(serde_json::json!({ "revisionOf": original.id })),
        )
        .await?;

        tx.commit().await.map_err(ServiceError::from)?;
        self.get(copy_id).await
    }

    /// Turns one item of an approved proposal into an allocation.
    pub async fn allocate_item(
        &self,
        actor: &AuthenticatedUser,
        proposal_id: Uuid,
        item_id: Uuid,
        remarks: Option<String>,
    ) -> Result<AllocationView, ServiceError> {
        let proposal = self.fetch(proposal_id).await?;
        if proposal.status != ProposalStatus::Approved {
            return Err(ServiceError::InvalidTransition(format!(
                "cannot allocate from a {} proposal",
                proposal.status.as_str()
            )));
        }
        let item = sqlx::query_as::<_, ProposalItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM proposal_items WHERE id = $1 AND proposal_id = $2"
        ))
        .bind(item_id)
        .bind(proposal_id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;

        let allocations = AllocationService::new(Arc::clone(&self.state));
        allocations
            .create(
                actor,
                CreateAllocationRequest {
                    department_id: proposal.department_id,
                    budget_head_id: item.budget_head_id,
                    financial_year: proposal.financial_year.clone(),
                    allocated_cents: item.proposed_cents,
                    remarks,
                    source_proposal_id: Some(proposal.id),
                    source_item_id: Some(item.id),
                },
            )
            .await
    }

    /// Shared path for the remark-only review transitions.
    async fn transition(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        action: ProposalAction,
        detail: Option<serde_json::Value>,
    ) -> Result<ProposalDetail, ServiceError> {
        let proposal = self.fetch(id).await?;
        let next = apply_proposal_action(proposal.status, action, actor.role).map_err(|d| {
            ServiceError::from_denial(d, "proposal", proposal.status.as_str(), action.as_str())
        })?;

        let updated = sqlx::query_as::<_, BudgetProposal>(&format!(
            "UPDATE budget_proposals SET status = $2, updated_at = $3
             WHERE id = $1 AND status = $4
             RETURNING {PROPOSAL_COLUMNS}"
        ))
        .bind(id)
        .bind(next)
        .bind(Utc::now())
        .bind(proposal.status)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or_else(|| ServiceError::Conflict("proposal changed concurrently".to_string()))?;

        audit::record(
            &self.state.pool,
            "proposal",
            id,
            action.as_str(),
            Some(actor.user_id),
            detail,
        )
        .await?;

        let items = self.fetch_items(id).await?;
        Ok(ProposalDetail {
            proposal: updated,
            items,
        })
    }

    fn ensure_owner(
        &self,
        actor: &AuthenticatedUser,
        proposal: &BudgetProposal,
    ) -> Result<(), ServiceError> {
        if actor.role == Role::Department && !actor.owns_department(proposal.department_id) {
            return Err(ServiceError::Forbidden);
        }
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<BudgetProposal, ServiceError> {
        sqlx::query_as::<_, BudgetProposal>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM budget_proposals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)
    }

    async fn fetch_items(&self, id: Uuid) -> Result<Vec<ProposalItem>, ServiceError> {
        let items = sqlx::query_as::<_, ProposalItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM proposal_items WHERE proposal_id = $1 ORDER BY position"
        ))
        .bind(id)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(items)
    }
}

async fn replace_items(
    tx: &mut Transaction<'_, Postgres>,
    proposal_id: Uuid,
    items: &[ProposalItemInput],
) -> Result<(), ServiceError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO proposal_items (id, proposal_id, position, budget_head_id,
                                         proposed_cents, justification, prev_year_utilization_pct)
             VALUES ($1,$2,$3,$4,$5,$6,$7)",
        )
        .bind(Uuid::new_v4())
        .bind(proposal_id)
        .bind(position as i32)
        .bind(item.budget_head_id)
        .bind(item.proposed_cents)
        .bind(&item.justification)
        .bind(item.prev_year_utilization_pct)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Keeps the stored total equal to the sum of the item amounts. Runs inside
/// the transaction that wrote the items.
async fn recompute_total(
    tx: &mut Transaction<'_, Postgres>,
    proposal_id: Uuid,
) -> Result<(), ServiceError> {
    sqlx::query(
        "UPDATE budget_proposals
         SET total_proposed_cents = (
             SELECT COALESCE(SUM(proposed_cents), 0) FROM proposal_items WHERE proposal_id = $1
         )
         WHERE id = $1",
    )
    .bind(proposal_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
