//! Financial-year arithmetic.
//!
//! College financial years run April through March and are labeled
//! `"YYYY-YYYY"` with consecutive years, e.g. `2025-2026`.

use chrono::{Datelike, NaiveDate};

/// Builds the canonical label for a financial year starting in `start`.
pub fn year_label(start: i32) -> String {
    format!("{}-{}", start, start + 1)
}

/// Parses a label back to its start year. Rejects anything that is not two
/// consecutive four-digit years.
pub fn parse_start_year(label: &str) -> Option<i32> {
    let (first, second) = label.split_once('-')?;
    if first.len() != 4 || second.len() != 4 {
        return None;
    }
    let start: i32 = first.parse().ok()?;
    let end: i32 = second.parse().ok()?;
    if end == start + 1 {
        Some(start)
    } else {
        None
    }
}

/// The financial year containing `date`: April onwards belongs to the year
/// starting that calendar year, January–March to the year started the
/// previous calendar year.
pub fn financial_year_of(date: NaiveDate) -> String {
    let year = date.year();
    if date.month() >= 4 {
        year_label(year)
    } else {
        year_label(year - 1)
    }
}

/// The reference year used when judging a proposal: the completed financial
/// year two years before the proposal's start. A proposal for `2025-2026` is
/// drafted during `2024-2025`, so the last year with final figures is
/// `2023-2024`.
pub fn reference_year_for(proposal_label: &str) -> Option<String> {
    let start = parse_start_year(proposal_label)?;
    Some(year_label(start - 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_round_trips() {
        assert_eq!(year_label(2024), "2024-2025");
        assert_eq!(parse_start_year("2024-2025"), Some(2024));
    }

    #[test]
    fn rejects_malformed_labels() {
        assert_eq!(parse_start_year("2024"), None);
        assert_eq!(parse_start_year("2024-2026"), None);
        assert_eq!(parse_start_year("2024-25"), None);
        assert_eq!(parse_start_year("24-2025"), None);
        assert_eq!(parse_start_year("abcd-efgh"), None);
    }

    #[test]
    fn april_starts_the_new_year() {
        let march = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let april = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert_eq!(financial_year_of(march), "2024-2025");
        assert_eq!(financial_year_of(april), "2025-2026");
    }

    #[test]
    fn reference_year_is_two_starts_back() {
        assert_eq!(
            reference_year_for("2025-2026").as_deref(),
            Some("2023-2024")
        );
        assert_eq!(reference_year_for("garbage"), None);
    }
}
