//! Amount reconciliation for proposal review.
//!
//! Aggregates the figures reviewers weigh before approving: what the
//! department was allocated and spent in the completed reference year, and
//! what it has already spent in the running year. The figures are advisory
//! snapshots; concurrent expenditure activity can stale them between the
//! read and the decision, which is why every response carries `computed_at`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{fiscal, models::ProposalItem},
    infrastructure::state::AppState,
};

use super::errors::ServiceError;

/// Reference-year and running-year figures for one department/budget-head
/// pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadStats {
    pub department_id: Uuid,
    pub budget_head_id: Uuid,
    pub reference_year: String,
    pub prev_year_allocated_cents: i64,
    pub prev_year_spent_cents: i64,
    pub prev_year_balance_cents: i64,
    pub current_year: String,
    pub current_year_spent_cents: i64,
    pub computed_at: DateTime<Utc>,
}

/// Department-wide figures across all budget heads, for the approver view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentContext {
    pub department_id: Uuid,
    pub reference_year: String,
    pub prev_year_allocated_cents: i64,
    pub prev_year_spent_cents: i64,
    pub prev_year_balance_cents: i64,
    pub current_year: String,
    pub current_year_spent_cents: i64,
    pub computed_at: DateTime<Utc>,
}

/// Stats for every item of a proposal, keyed by item id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStats {
    pub proposal_id: Uuid,
    pub items: Vec<ItemStats>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub item_id: Uuid,
    #[serde(flatten)]
    pub stats: HeadStats,
}

pub struct ReconciliationService {
    pub state: Arc<AppState>,
}

impl ReconciliationService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Figures for one budget head of a department, judged against the
    /// given proposal year.
    pub async fn head_stats(
        &self,
        department_id: Uuid,
        budget_head_id: Uuid,
        proposal_year: &str,
    ) -> Result<HeadStats, ServiceError> {
        let reference_year = reference_year(proposal_year)?;
        let (prev_allocated, prev_spent) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(SUM(allocated_cents), 0), COALESCE(SUM(spent_cents), 0)
             FROM allocations
             WHERE department_id = $1 AND budget_head_id = $2 AND financial_year = $3",
        )
        .bind(department_id)
        .bind(budget_head_id)
        .bind(&reference_year)
        .fetch_one(&self.state.pool)
        .await?;

        let current_year = fiscal::financial_year_of(Utc::now().date_naive());
        let current_spent = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(bill_cents), 0) FROM expenditures
             WHERE department_id = $1 AND budget_head_id = $2 AND financial_year = $3",
        )
        .bind(department_id)
        .bind(budget_head_id)
        .bind(&current_year)
        .fetch_one(&self.state.pool)
        .await?;

        Ok(HeadStats {
            department_id,
            budget_head_id,
            reference_year,
            prev_year_allocated_cents: prev_allocated,
            prev_year_spent_cents: prev_spent,
            prev_year_balance_cents: prev_allocated - prev_spent,
            current_year,
            current_year_spent_cents: current_spent,
            computed_at: Utc::now(),
        })
    }

    /// Whole-department figures: reference-year sums across every budget
    /// head, and running-year spend regardless of head.
    pub async fn department_context(
        &self,
        department_id: Uuid,
        proposal_year: &str,
    ) -> Result<DepartmentContext, ServiceError> {
        let reference_year = reference_year(proposal_year)?;
        let (prev_allocated, prev_spent) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COALESCE(SUM(allocated_cents), 0), COALESCE(SUM(spent_cents), 0)
             FROM allocations
             WHERE department_id = $1 AND financial_year = $2",
        )
        .bind(department_id)
        .bind(&reference_year)
        .fetch_one(&self.state.pool)
        .await?;

        let current_year = fiscal::financial_year_of(Utc::now().date_naive());
        let current_spent = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(bill_cents), 0) FROM expenditures
             WHERE department_id = $1 AND financial_year = $2",
        )
        .bind(department_id)
        .bind(&current_year)
        .fetch_one(&self.state.pool)
        .await?;

        Ok(DepartmentContext {
            department_id,
            reference_year,
            prev_year_allocated_cents: prev_allocated,
            prev_year_spent_cents: prev_spent,
            prev_year_balance_cents: prev_allocated - prev_spent,
            current_year,
            current_year_spent_cents: current_spent,
            computed_at: Utc::now(),
        })
    }

    /// Per-item stats for a whole proposal.
    pub async fn proposal_stats(&self, proposal_id: Uuid) -> Result<ProposalStats, ServiceError> {
        let (department_id, financial_year) = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT department_id, financial_year FROM budget_proposals WHERE id = $1",
        )
        .bind(proposal_id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;

        let items = sqlx::query_as::<_, ProposalItem>(
            "SELECT id, proposal_id, position, budget_head_id, proposed_cents, justification,
                    prev_year_utilization_pct
             FROM proposal_items WHERE proposal_id = $1 ORDER BY position",
        )
        .bind(proposal_id)
        .fetch_all(&self.state.pool)
        .await?;

        let mut stats = Vec::with_capacity(items.len());
        for item in &items {
            let head = self
                .head_stats(department_id, item.budget_head_id, &financial_year)
                .await?;
            stats.push(ItemStats {
                item_id: item.id,
                stats: head,
            });
        }

        Ok(ProposalStats {
            proposal_id,
            items: stats,
            computed_at: Utc::now(),
        })
    }
}

fn reference_year(proposal_year: &str) -> Result<String, ServiceError> {
    fiscal::reference_year_for(proposal_year).ok_or_else(|| {
        ServiceError::Validation(vec![format!(
            "financial year must look like \"2025-2026\", got {proposal_year:?}"
        )])
    })
}
