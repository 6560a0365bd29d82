use serde::{Deserialize, Serialize};

use crate::domain::models::{Allocation, OverspendPolicy};

/// Outcome of checking a bill amount against the department's allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum BudgetCheck {
    /// The bill fits inside the remaining allocation.
    Within { remaining_cents: i64 },
    /// The bill exceeds the remaining allocation but the overspend policy
    /// routes it to an override review instead of refusing it.
    OverrideRequired {
        remaining_cents: i64,
        overrun_cents: i64,
    },
}

/// A bill the policy refuses outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDenial {
    /// No allocation exists for the department/budget-head/year triple.
    NoAllocation,
    /// Overspend policy is `disallow` and the bill exceeds what is left.
    ExceedsBudget { remaining_cents: i64 },
}

/// Checks a bill amount against the matching allocation under the active
/// overspend policy.
pub fn check_against_allocation(
    bill_cents: i64,
    allocation: Option<&Allocation>,
    policy: OverspendPolicy,
) -> Result<BudgetCheck, BudgetDenial> {
    let Some(allocation) = allocation else {
        return Err(BudgetDenial::NoAllocation);
    };
    let remaining = allocation.remaining_cents();
    if bill_cents <= remaining {
        return Ok(BudgetCheck::Within {
            remaining_cents: remaining,
        });
    }
    match policy {
        OverspendPolicy::Disallow => Err(BudgetDenial::ExceedsBudget {
            remaining_cents: remaining,
        }),
        OverspendPolicy::RequireOverride => Ok(BudgetCheck::OverrideRequired {
            remaining_cents: remaining,
            overrun_cents: overrun_cents(bill_cents, allocation.allocated_cents, allocation.spent_cents),
        }),
    }
}

/// How far an expense would push an allocation past its limit; zero when it
/// still fits.
pub fn overrun_cents(expense_cents: i64, allocated_cents: i64, spent_cents: i64) -> i64 {
    (expense_cents - (allocated_cents - spent_cents)).max(0)
}

/// Percentage change an amendment requests over the original amount, rounded
/// to the nearest whole percent; zero when the original amount is zero.
pub fn change_percent(original_cents: i64, change_cents: i64) -> i32 {
    if original_cents == 0 {
        return 0;
    }
    (change_cents as f64 / original_cents as f64 * 100.0).round() as i32
}

/// Spent over allocated as a percentage for report rows; zero when nothing
/// was allocated.
pub fn utilization_percent(spent_cents: i64, allocated_cents: i64) -> f64 {
    if allocated_cents == 0 {
        return 0.0;
    }
    spent_cents as f64 / allocated_cents as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn allocation(allocated_cents: i64, spent_cents: i64) -> Allocation {
        Allocation {
            id: Uuid::new_v4(),
            department_id: Uuid::new_v4(),
            budget_head_id: Uuid::new_v4(),
            financial_year: "2025-2026".to_string(),
            allocated_cents,
            spent_cents,
            remarks: None,
            source_proposal_id: None,
            source_item_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn missing_allocation_is_refused() {
        let result = check_against_allocation(10_000, None, OverspendPolicy::Disallow);
        assert_eq!(result, Err(BudgetDenial::NoAllocation));
    }

    #[test]
    fn disallow_policy_reports_remaining() {
        let alloc = allocation(100_000, 40_000);
        let result = check_against_allocation(70_000, Some(&alloc), OverspendPolicy::Disallow);
        assert_eq!(
            result,
            Err(BudgetDenial::ExceedsBudget {
                remaining_cents: 60_000
            })
        );
    }

    #[test]
    fn fitting_bill_passes_either_policy() {
        let alloc = allocation(100_000, 40_000);
        for policy in [OverspendPolicy::Disallow, OverspendPolicy::RequireOverride] {
            let result = check_against_allocation(50_000, Some(&alloc), policy);
            assert_eq!(
                result,
                Ok(BudgetCheck::Within {
                    remaining_cents: 60_000
                })
            );
        }
    }

    #[test]
    fn override_policy_computes_overrun() {
        let alloc = allocation(100_000, 40_000);
        let result =
            check_against_allocation(70_000, Some(&alloc), OverspendPolicy::RequireOverride);
        assert_eq!(
            result,
            Ok(BudgetCheck::OverrideRequired {
                remaining_cents: 60_000,
                overrun_cents: 10_000
            })
        );
    }

    #[test]
    fn overrun_clamps_at_zero() {
        assert_eq!(overrun_cents(50_000, 100_000, 40_000), 0);
        assert_eq!(overrun_cents(70_000, 100_000, 40_000), 10_000);
    }

    #[test]
    fn change_percent_rounds_and_handles_zero() {
        assert_eq!(change_percent(100_000, 20_000), 20);
        assert_eq!(change_percent(100_000, -20_000), -20);
        assert_eq!(change_percent(30_000, 10_000), 33);
        assert_eq!(change_percent(0, 10_000), 0);
    }

    #[test]
    fn utilization_handles_zero_allocation() {
        assert_eq!(utilization_percent(40_000, 100_000), 40.0);
        assert_eq!(utilization_percent(5_000, 0), 0.0);
    }
}
