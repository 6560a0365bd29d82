//! Canonical status-transition tables.
//!
//! Every service consults these functions instead of carrying its own idea of
//! which transitions exist; the API surface and the audit trail therefore
//! always agree on what an action is allowed to do.

use crate::domain::models::{ExpenditureStatus, FiscalYearStatus, ProposalStatus, Role};

/// Actions that can be applied to a budget proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalAction {
    Submit,
    Verify,
    Approve,
    Reject,
    Resubmit,
}

impl ProposalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalAction::Submit => "submit",
            ProposalAction::Verify => "verify",
            ProposalAction::Approve => "approve",
            ProposalAction::Reject => "reject",
            ProposalAction::Resubmit => "resubmit",
        }
    }
}

/// Actions that can be applied to an expenditure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpenditureAction {
    Verify,
    Approve,
    Reject,
    Resubmit,
}

impl ExpenditureAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenditureAction::Verify => "verify",
            ExpenditureAction::Approve => "approve",
            ExpenditureAction::Reject => "reject",
            ExpenditureAction::Resubmit => "resubmit",
        }
    }
}

/// Why a requested transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDenial {
    /// The record's current status does not permit the action.
    NotFromStatus,
    /// The actor's role is never allowed to perform the action.
    RoleNotAllowed,
    /// Office may only approve records it (or the HOD) has verified first.
    VerificationRequired,
}

const PROPOSAL_APPROVERS: &[Role] = &[
    Role::Admin,
    Role::Office,
    Role::Principal,
    Role::VicePrincipal,
];

/// Resolves a proposal action against the current status and the actor's
/// role, returning the status the record moves to.
///
/// Resubmission is the transition applied to the *rejected original*: it
/// moves to `Revised` while the service creates the fresh draft copy.
pub fn apply_proposal_action(
    status: ProposalStatus,
    action: ProposalAction,
    role: Role,
) -> Result<ProposalStatus, TransitionDenial> {
    use ProposalAction as A;
    use ProposalStatus as S;

    match action {
        A::Submit => {
            if role != Role::Department {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Draft | S::Revised => Ok(S::Submitted),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
        A::Verify => {
            if !matches!(role, Role::Hod | Role::Office) {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Submitted => Ok(S::Verified),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
        A::Approve => {
            if !PROPOSAL_APPROVERS.contains(&role) {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Submitted if role == Role::Office => {
                    Err(TransitionDenial::VerificationRequired)
                }
                S::Submitted | S::Verified => Ok(S::Approved),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
        A::Reject => {
            if !PROPOSAL_APPROVERS.contains(&role) {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Submitted | S::Verified => Ok(S::Rejected),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
        A::Resubmit => {
            if role != Role::Department {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Rejected => Ok(S::Revised),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
    }
}

/// Same resolution for expenditures. The verification gate on office
/// approvals mirrors the proposal rule.
pub fn apply_expenditure_action(
    status: ExpenditureStatus,
    action: ExpenditureAction,
    role: Role,
) -> Result<ExpenditureStatus, TransitionDenial> {
    use ExpenditureAction as A;
    use ExpenditureStatus as S;

    match action {
        A::Verify => {
            if !matches!(role, Role::Hod | Role::Office) {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Pending => Ok(S::Verified),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
        A::Approve => {
            if !PROPOSAL_APPROVERS.contains(&role) {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Pending if role == Role::Office => Err(TransitionDenial::VerificationRequired),
                S::Pending | S::Verified => Ok(S::Approved),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
        A::Reject => {
            if !PROPOSAL_APPROVERS.contains(&role) {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Pending | S::Verified => Ok(S::Rejected),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
        A::Resubmit => {
            if role != Role::Department {
                return Err(TransitionDenial::RoleNotAllowed);
            }
            match status {
                S::Rejected => Ok(S::Rejected),
                _ => Err(TransitionDenial::NotFromStatus),
            }
        }
    }
}

/// Forward-only financial-year lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiscalYearAction {
    Activate,
    Lock,
    Close,
}

impl FiscalYearAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FiscalYearAction::Activate => "activate",
            FiscalYearAction::Lock => "lock",
            FiscalYearAction::Close => "close",
        }
    }
}

const YEAR_ADMINS: &[Role] = &[Role::Admin, Role::Principal];

pub fn apply_fiscal_year_action(
    status: FiscalYearStatus,
    action: FiscalYearAction,
    role: Role,
) -> Result<FiscalYearStatus, TransitionDenial> {
    use FiscalYearAction as A;
    use FiscalYearStatus as S;

    if !YEAR_ADMINS.contains(&role) {
        return Err(TransitionDenial::RoleNotAllowed);
    }
    match (status, action) {
        (S::Planning, A::Activate) => Ok(S::Active),
        (S::Active, A::Lock) => Ok(S::Locked),
        (S::Locked, A::Close) => Ok(S::Closed),
        _ => Err(TransitionDenial::NotFromStatus),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_submits_drafts_and_revisions() {
        assert_eq!(
            apply_proposal_action(ProposalStatus::Draft, ProposalAction::Submit, Role::Department),
            Ok(ProposalStatus::Submitted)
        );
        assert_eq!(
            apply_proposal_action(
                ProposalStatus::Revised,
                ProposalAction::Submit,
                Role::Department
            ),
            Ok(ProposalStatus::Submitted)
        );
        assert_eq!(
            apply_proposal_action(ProposalStatus::Draft, ProposalAction::Submit, Role::Office),
            Err(TransitionDenial::RoleNotAllowed)
        );
    }

    #[test]
    fn submit_is_not_idempotent() {
        assert_eq!(
            apply_proposal_action(
                ProposalStatus::Submitted,
                ProposalAction::Submit,
                Role::Department
            ),
            Err(TransitionDenial::NotFromStatus)
        );
    }

    #[test]
    fn office_cannot_approve_without_verification() {
        assert_eq!(
            apply_proposal_action(
                ProposalStatus::Submitted,
                ProposalAction::Approve,
                Role::Office
            ),
            Err(TransitionDenial::VerificationRequired)
        );
        assert_eq!(
            apply_proposal_action(
                ProposalStatus::Verified,
                ProposalAction::Approve,
                Role::Office
            ),
            Ok(ProposalStatus::Approved)
        );
        // Principal may approve straight from submitted.
        assert_eq!(
            apply_proposal_action(
                ProposalStatus::Submitted,
                ProposalAction::Approve,
                Role::Principal
            ),
            Ok(ProposalStatus::Approved)
        );
    }

    #[test]
    fn terminal_proposal_states_refuse_review_actions() {
        for status in [ProposalStatus::Approved, ProposalStatus::Rejected] {
            for action in [ProposalAction::Verify, ProposalAction::Approve] {
                assert_eq!(
                    apply_proposal_action(status, action, Role::Admin),
                    Err(TransitionDenial::NotFromStatus),
                    "{:?} should not accept {:?}",
                    status,
                    action
                );
            }
        }
    }

    #[test]
    fn only_rejected_proposals_resubmit() {
        assert_eq!(
            apply_proposal_action(
                ProposalStatus::Rejected,
                ProposalAction::Resubmit,
                Role::Department
            ),
            Ok(ProposalStatus::Revised)
        );
        assert_eq!(
            apply_proposal_action(
                ProposalStatus::Draft,
                ProposalAction::Resubmit,
                Role::Department
            ),
            Err(TransitionDenial::NotFromStatus)
        );
    }

    #[test]
    fn auditor_is_read_only() {
        assert_eq!(
            apply_proposal_action(
                ProposalStatus::Submitted,
                ProposalAction::Approve,
                Role::Auditor
            ),
            Err(TransitionDenial::RoleNotAllowed)
        );
        assert_eq!(
            apply_expenditure_action(
                ExpenditureStatus::Pending,
                ExpenditureAction::Verify,
                Role::Auditor
            ),
            Err(TransitionDenial::RoleNotAllowed)
        );
    }

    #[test]
    fn expenditure_office_gate_matches_proposals() {
        assert_eq!(
            apply_expenditure_action(
                ExpenditureStatus::Pending,
                ExpenditureAction::Approve,
                Role::Office
            ),
            Err(TransitionDenial::VerificationRequired)
        );
        assert_eq!(
            apply_expenditure_action(
                ExpenditureStatus::Verified,
                ExpenditureAction::Approve,
                Role::Office
            ),
            Ok(ExpenditureStatus::Approved)
        );
    }

    #[test]
    fn fiscal_year_moves_forward_only() {
        assert_eq!(
            apply_fiscal_year_action(FiscalYearStatus::Planning, FiscalYearAction::Activate, Role::Admin),
            Ok(FiscalYearStatus::Active)
        );
        assert_eq!(
            apply_fiscal_year_action(FiscalYearStatus::Closed, FiscalYearAction::Activate, Role::Admin),
            Err(TransitionDenial::NotFromStatus)
        );
        assert_eq!(
            apply_fiscal_year_action(FiscalYearStatus::Active, FiscalYearAction::Lock, Role::Hod),
            Err(TransitionDenial::RoleNotAllowed)
        );
    }
}
