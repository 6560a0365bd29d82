use axum::{routing::get, Router};

use crate::api::rest::{
    allocations::router as allocations_router, audit::router as audit_router,
    auth::router as auth_router, catalog::router as catalog_router,
    expenditures::router as expenditures_router,
    financial_years::router as financial_years_router, income::router as income_router,
    proposals::router as proposals_router, reports::router as reports_router,
    settings::router as settings_router, users::router as users_router,
};

pub mod allocations;
pub mod audit;
pub mod auth;
pub mod catalog;
pub mod expenditures;
pub mod financial_years;
pub mod health;
pub mod income;
pub mod proposals;
pub mod reports;
pub mod settings;
pub mod users;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::healthcheck))
        .nest("/auth", auth_router())
        .merge(catalog_router())
        .nest("/users", users_router())
        .nest("/proposals", proposals_router())
        .nest("/allocations", allocations_router())
        .nest("/expenditures", expenditures_router())
        .nest("/income", income_router())
        .nest("/financial-years", financial_years_router())
        .nest("/reports", reports_router())
        .nest("/settings", settings_router())
        .nest("/audit-events", audit_router())
}
