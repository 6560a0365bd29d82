//! Background refresh of financial-year aggregate totals.
//!
//! Dashboards read the stored totals rather than recomputing them per
//! request; this worker keeps those figures from drifting too far between
//! on-demand recalculations.

use std::sync::Arc;

use futures::future::join_all;
use sqlx::FromRow;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{infrastructure::state::AppState, services::fiscal_years::FiscalYearService};

#[derive(Debug, FromRow)]
struct YearRow {
    id: Uuid,
    label: String,
}

pub fn spawn_recalculation_worker(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = state.config.recalc_interval();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            recalculate_all(&state).await;
        }
    })
}

async fn recalculate_all(state: &Arc<AppState>) {
    let years = match sqlx::query_as::<_, YearRow>(
        "SELECT id, label FROM financial_years WHERE status <> 'closed'",
    )
    .fetch_all(&state.pool)
    .await
    {
        Ok(years) => years,
        Err(err) => {
            warn!(error = ?err, "failed to list financial years for recalculation");
            return;
        }
    };

    let service = FiscalYearService::new(Arc::clone(state));
    let results = join_all(years.iter().map(|year| {
        let service = &service;
        async move { (year, service.recalculate(year.id).await) }
    }))
    .await;

    for (year, result) in results {
        match result {
            Ok(_) => info!(label = %year.label, "financial year totals refreshed"),
            Err(err) => warn!(label = %year.label, error = ?err, "recalculation failed"),
        }
    }
}
