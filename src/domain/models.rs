use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum Role {
    Department,
    Hod,
    Office,
    VicePrincipal,
    Principal,
    Admin,
    Auditor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Department => "department",
            Role::Hod => "hod",
            Role::Office => "office",
            Role::VicePrincipal => "vice_principal",
            Role::Principal => "principal",
            Role::Admin => "admin",
            Role::Auditor => "auditor",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "proposal_status", rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Submitted,
    Verified,
    Approved,
    Rejected,
    Revised,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Submitted => "submitted",
            ProposalStatus::Verified => "verified",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Revised => "revised",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "expenditure_status", rename_all = "snake_case")]
pub enum ExpenditureStatus {
    Pending,
    Verified,
    Approved,
    Rejected,
}

impl ExpenditureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenditureStatus::Pending => "pending",
            ExpenditureStatus::Verified => "verified",
            ExpenditureStatus::Approved => "approved",
            ExpenditureStatus::Rejected => "rejected",
        }
    }
}

/// Shared by allocation amendments and budget overrides: both are standalone
/// review records that start pending and take exactly one decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "review_status", rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "income_source", rename_all = "snake_case")]
pub enum IncomeSource {
    GovernmentGrant,
    TuitionFees,
    Donation,
    Interest,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "income_category", rename_all = "snake_case")]
pub enum IncomeCategory {
    Recurring,
    NonRecurring,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "income_status", rename_all = "snake_case")]
pub enum IncomeStatus {
    Expected,
    Received,
    Verified,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "fiscal_year_status", rename_all = "snake_case")]
pub enum FiscalYearStatus {
    Planning,
    Active,
    Locked,
    Closed,
}

impl FiscalYearStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FiscalYearStatus::Planning => "planning",
            FiscalYearStatus::Active => "active",
            FiscalYearStatus::Locked => "locked",
            FiscalYearStatus::Closed => "closed",
        }
    }

    /// Locked and closed years no longer accept allocations or expenditures.
    pub fn accepts_postings(&self) -> bool {
        matches!(self, FiscalYearStatus::Planning | FiscalYearStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "overspend_policy", rename_all = "snake_case")]
pub enum OverspendPolicy {
    Disallow,
    RequireOverride,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BudgetHead {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub kind: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BudgetProposal {
    pub id: Uuid,
    pub financial_year: String,
    pub department_id: Uuid,
    pub status: ProposalStatus,
    pub notes: Option<String>,
    pub submitted_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub revision_of: Option<Uuid>,
    pub total_proposed_cents: i64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProposalItem {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub position: i32,
    pub budget_head_id: Uuid,
    pub proposed_cents: i64,
    pub justification: String,
    pub prev_year_utilization_pct: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Allocation {
    pub id: Uuid,
    pub department_id: Uuid,
    pub budget_head_id: Uuid,
    pub financial_year: String,
    pub allocated_cents: i64,
    pub spent_cents: i64,
    pub remarks: Option<String>,
    pub source_proposal_id: Option<Uuid>,
    pub source_item_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// Raw balance. Goes negative only once an approved override has pushed
    /// spending past the allocation.
    pub fn remaining_cents(&self) -> i64 {
        self.allocated_cents - self.spent_cents
    }

    /// Balance clamped for display; the raw figure stays available above.
    pub fn remaining_display_cents(&self) -> i64 {
        self.remaining_cents().max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllocationAmendment {
    pub id: Uuid,
    pub allocation_id: Uuid,
    pub original_cents: i64,
    pub requested_cents: i64,
    pub change_cents: i64,
    pub change_pct: i32,
    pub change_reason: String,
    pub requested_by: Uuid,
    pub status: ReviewStatus,
    pub decided_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expenditure {
    pub id: Uuid,
    pub department_id: Uuid,
    pub budget_head_id: Uuid,
    pub financial_year: String,
    pub bill_number: String,
    pub bill_date: NaiveDate,
    pub bill_cents: i64,
    pub party_name: String,
    pub expense_details: String,
    pub status: ExpenditureStatus,
    pub resubmission_of: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExpenditureAction {
    pub id: Uuid,
    pub expenditure_id: Uuid,
    pub decision: String,
    pub remarks: Option<String>,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub expenditure_id: Uuid,
    pub file_key: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BudgetOverride {
    pub id: Uuid,
    pub expenditure_id: Uuid,
    pub allocation_id: Uuid,
    pub allocated_cents: i64,
    pub spent_cents: i64,
    pub expense_cents: i64,
    pub overrun_cents: i64,
    pub justification: String,
    pub requested_by: Uuid,
    pub status: ReviewStatus,
    pub decided_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Income {
    pub id: Uuid,
    pub financial_year: String,
    pub source: IncomeSource,
    pub category: IncomeCategory,
    pub amount_cents: i64,
    pub expected_date: NaiveDate,
    pub received_date: Option<NaiveDate>,
    pub status: IncomeStatus,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FinancialYear {
    pub id: Uuid,
    pub label: String,
    pub status: FiscalYearStatus,
    pub total_allocated_cents: i64,
    pub total_spent_cents: i64,
    pub total_income_cents: i64,
    pub recalculated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub event: String,
    pub actor_id: Option<Uuid>,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Settings {
    pub overspend_policy: OverspendPolicy,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}
