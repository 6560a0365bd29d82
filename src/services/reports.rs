//! Consolidated reporting over allocations, expenditures, and proposals.

use std::sync::Arc;

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{domain::policy, infrastructure::state::AppState};

use super::errors::ServiceError;

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedRow {
    pub department_id: Uuid,
    pub department_name: String,
    pub allocated_cents: i64,
    pub spent_cents: i64,
    pub remaining_cents: i64,
    #[sqlx(skip)]
    pub utilization_pct: f64,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSummaryRow {
    pub department_name: String,
    pub status: String,
    pub proposal_count: i64,
    pub total_proposed_cents: i64,
}

pub struct ReportsService {
    pub state: Arc<AppState>,
}

impl ReportsService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Per-department allocation/spend totals for one financial year.
    pub async fn consolidated(
        &self,
        financial_year: &str,
    ) -> Result<Vec<ConsolidatedRow>, ServiceError> {
        let mut rows = sqlx::query_as::<_, ConsolidatedRow>(
            r#"
            SELECT
                d.id AS department_id,
                d.name AS department_name,
                COALESCE(SUM(a.allocated_cents), 0) AS allocated_cents,
                COALESCE(SUM(a.spent_cents), 0) AS spent_cents,
                COALESCE(SUM(a.allocated_cents - a.spent_cents), 0) AS remaining_cents
            FROM departments d
            JOIN allocations a ON a.department_id = d.id AND a.financial_year = $1
            GROUP BY d.id, d.name
            ORDER BY d.name
            "#,
        )
        .bind(financial_year)
        .fetch_all(&self.state.pool)
        .await?;

        for row in &mut rows {
            row.utilization_pct =
                policy::utilization_percent(row.spent_cents, row.allocated_cents);
        }
        Ok(rows)
    }

    /// Proposal counts and totals grouped by department and status.
    pub async fn proposals_summary(
        &self,
        financial_year: &str,
    ) -> Result<Vec<ProposalSummaryRow>, ServiceError> {
        let rows = sqlx::query_as::<_, ProposalSummaryRow>(
            r#"
            SELECT
                d.name AS department_name,
                p.status::text AS status,
                COUNT(*) AS proposal_count,
                COALESCE(SUM(p.total_proposed_cents), 0) AS total_proposed_cents
            FROM budget_proposals p
            JOIN departments d ON d.id = p.department_id
            WHERE p.financial_year = $1
            GROUP BY d.name, p.status
            ORDER BY d.name, p.status
            "#,
        )
        .bind(financial_year)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows)
    }
}

/// Renders the consolidated report as CSV for download.
pub fn consolidated_csv(rows: &[ConsolidatedRow]) -> String {
    let mut out = String::from("department,allocated,spent,remaining,utilization_pct\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{},{:.1}\n",
            csv_field(&row.department_name),
            row.allocated_cents,
            row.spent_cents,
            row.remaining_cents,
            row.utilization_pct,
        ));
    }
    out
}

pub fn proposals_csv(rows: &[ProposalSummaryRow]) -> String {
    let mut out = String::from("department,status,count,total_proposed\n");
    for row in rows {
        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&row.department_name),
            csv_field(&row.status),
            row.proposal_count,
            row.total_proposed_cents,
        ));
    }
    out
}

/// Quotes a field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn csv_quotes_only_when_needed() {
        assert_eq!(csv_field("Physics"), "Physics");
        assert_eq!(csv_field("Arts, Crafts"), "\"Arts, Crafts\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn consolidated_csv_includes_header_and_rows() {
        let rows = vec![ConsolidatedRow {
            department_id: Uuid::new_v4(),
            department_name: "Chemistry".to_string(),
            allocated_cents: 100_000,
            spent_cents: 40_000,
            remaining_cents: 60_000,
            utilization_pct: 40.0,
        }];
        let csv = consolidated_csv(&rows);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("department,allocated,spent,remaining,utilization_pct")
        );
        assert_eq!(lines.next(), Some("Chemistry,100000,40000,60000,40.0"));
        assert_eq!(lines.next(), None);
    }
}
