use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::{
        errors::ServiceError,
        reports::{self, ReportsService},
    },
};

pub fn router() -> Router {
    Router::new()
        .route("/consolidated", get(consolidated))
        .route("/proposals", get(proposals))
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    financial_year: String,
    format: Option<String>,
}

async fn consolidated(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ServiceError> {
    let rows = ReportsService::new(state)
        .consolidated(&query.financial_year)
        .await?;
    if query.format.as_deref() == Some("csv") {
        let csv = reports::consolidated_csv(&rows);
        return Ok(csv_response(csv, "consolidated-report.csv"));
    }
    Ok(Json(serde_json::json!({ "rows": rows })).into_response())
}

async fn proposals(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ServiceError> {
    let rows = ReportsService::new(state)
        .proposals_summary(&query.financial_year)
        .await?;
    if query.format.as_deref() == Some("csv") {
        let csv = reports::proposals_csv(&rows);
        return Ok(csv_response(csv, "proposal-report.csv"));
    }
    Ok(Json(serde_json::json!({ "rows": rows })).into_response())
}

fn csv_response(csv: String, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    )
        .into_response()
}
