//! Field-level submission rules.
//!
//! Each function returns the full list of problems rather than stopping at
//! the first, so the caller can surface every offending field at once.

use validator::ValidationErrors;

use crate::domain::{fiscal, models::ProposalItem};

/// Checks every proposal item ahead of submission: a budget head, a positive
/// amount, and a justification are all mandatory. Items are reported by
/// their one-based position.
pub fn validate_proposal_items(items: &[ProposalItem]) -> Vec<String> {
    let mut problems = Vec::new();
    if items.is_empty() {
        problems.push("proposal has no items".to_string());
        return problems;
    }
    for item in items {
        let line = item.position + 1;
        if item.proposed_cents <= 0 {
            problems.push(format!("item {line}: proposed amount must be positive"));
        }
        if item.justification.trim().is_empty() {
            problems.push(format!("item {line}: justification is required"));
        }
    }
    problems
}

/// Validates a financial-year label, returning the problem if any.
pub fn validate_year_label(label: &str) -> Option<String> {
    if fiscal::parse_start_year(label).is_some() {
        None
    } else {
        Some(format!(
            "financial year must look like \"2025-2026\", got {label:?}"
        ))
    }
}

/// Flattens `validator` derive output into per-field messages.
pub fn collect_field_errors(errors: &ValidationErrors) -> Vec<String> {
    let mut problems = Vec::new();
    for (field, errs) in errors.field_errors() {
        for err in errs {
            let detail = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            problems.push(format!("{field}: {detail}"));
        }
    }
    problems.sort();
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(position: i32, proposed_cents: i64, justification: &str) -> ProposalItem {
        ProposalItem {
            id: Uuid::new_v4(),
            proposal_id: Uuid::new_v4(),
            position,
            budget_head_id: Uuid::new_v4(),
            proposed_cents,
            justification: justification.to_string(),
            prev_year_utilization_pct: None,
        }
    }

    #[test]
    fn empty_proposals_cannot_submit() {
        let problems = validate_proposal_items(&[]);
        assert_eq!(problems, vec!["proposal has no items".to_string()]);
    }

    #[test]
    fn every_offending_item_is_listed() {
        let items = vec![
            item(0, 10_000, "lab consumables"),
            item(1, 0, "library books"),
            item(2, 5_000, "  "),
        ];
        let problems = validate_proposal_items(&items);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("item 2"));
        assert!(problems[1].contains("item 3"));
    }

    #[test]
    fn valid_items_produce_no_problems() {
        let items = vec![item(0, 10_000, "equipment"), item(1, 5_000, "maintenance")];
        assert!(validate_proposal_items(&items).is_empty());
    }

    #[test]
    fn year_label_rule() {
        assert!(validate_year_label("2025-2026").is_none());
        assert!(validate_year_label("2025-2027").is_some());
    }
}
