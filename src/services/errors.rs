use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

use crate::domain::workflow::TransitionDenial;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("no allocation exists for this budget head in this financial year")]
    NoAllocation,
    #[error("bill amount exceeds remaining budget of {remaining_cents}")]
    ExceedsBudget { remaining_cents: i64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Forbidden => StatusCode::FORBIDDEN,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidTransition(_) => StatusCode::CONFLICT,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::NoAllocation => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::ExceedsBudget { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a transition-table refusal onto the API error, naming the entity
    /// and the record's current status in the message.
    pub fn from_denial(
        denial: TransitionDenial,
        entity: &str,
        status: &str,
        action: &str,
    ) -> Self {
        match denial {
            TransitionDenial::RoleNotAllowed => ServiceError::Forbidden,
            TransitionDenial::NotFromStatus => {
                ServiceError::InvalidTransition(format!("cannot {action} a {status} {entity}"))
            }
            TransitionDenial::VerificationRequired => ServiceError::InvalidTransition(format!(
                "office must verify a {entity} before approving it"
            )),
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            ServiceError::Validation(problems) => serde_json::json!({
                "error": "validation failed",
                "details": problems,
            }),
            ServiceError::ExceedsBudget { remaining_cents } => serde_json::json!({
                "error": self.to_string(),
                "remainingCents": remaining_cents,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Conflict("record already exists".to_string())
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_lists_every_problem() {
        let err = ServiceError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "validation failed: a; b");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn denials_map_to_api_errors() {
        let err = ServiceError::from_denial(
            TransitionDenial::NotFromStatus,
            "proposal",
            "submitted",
            "submit",
        );
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            err.to_string(),
            "invalid transition: cannot submit a submitted proposal"
        );

        let err = ServiceError::from_denial(
            TransitionDenial::RoleNotAllowed,
            "proposal",
            "submitted",
            "approve",
        );
        assert!(matches!(err, ServiceError::Forbidden));
    }

    #[test]
    fn exceeds_budget_reports_the_remaining_figure() {
        let err = ServiceError::ExceedsBudget {
            remaining_cents: 60_000,
        };
        assert!(err.to_string().contains("60000"));
    }
}
