//! Reference data: departments, budget heads, and categories.
//!
//! Deleting any of these deactivates the record; historical proposals and
//! allocations keep their references intact.

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::models::{BudgetHead, Category, Department, Role},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize)]
pub struct CreateLookupRequest {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLookupRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub active: Option<bool>,
}

pub struct CatalogService {
    pub state: Arc<AppState>,
}

fn ensure_catalog_admin(actor: &AuthenticatedUser) -> Result<(), ServiceError> {
    if matches!(actor.role, Role::Admin | Role::Office) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

fn validate_lookup(name: &str, code: &str) -> Result<(), ServiceError> {
    let mut problems = Vec::new();
    if name.trim().is_empty() {
        problems.push("name is required".to_string());
    }
    if code.trim().is_empty() {
        problems.push("code is required".to_string());
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(problems))
    }
}

impl CatalogService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list_departments(&self, include_inactive: bool) -> Result<Vec<Department>, ServiceError> {
        let rows = sqlx::query_as::<_, Department>(
            "SELECT id, name, code, active, created_at FROM departments
             WHERE active OR $1 ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_department(&self, id: Uuid) -> Result<Department, ServiceError> {
        sqlx::query_as::<_, Department>(
            "SELECT id, name, code, active, created_at FROM departments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)
    }

    pub async fn create_department(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateLookupRequest,
    ) -> Result<Department, ServiceError> {
        ensure_catalog_admin(actor)?;
        validate_lookup(&payload.name, &payload.code)?;
        let row = sqlx::query_as::<_, Department>(
            "INSERT INTO departments (id, name, code) VALUES ($1,$2,$3)
             RETURNING id, name, code, active, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(payload.name.trim())
        .bind(payload.code.trim())
        .fetch_one(&self.state.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_department(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateLookupRequest,
    ) -> Result<Department, ServiceError> {
        ensure_catalog_admin(actor)?;
        let row = sqlx::query_as::<_, Department>(
            "UPDATE departments
             SET name = COALESCE($2, name), code = COALESCE($3, code), active = COALESCE($4, active)
             WHERE id = $1
             RETURNING id, name, code, active, created_at",
        )
        .bind(id)
        .bind(payload.name)
        .bind(payload.code)
        .bind(payload.active)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        Ok(row)
    }

    pub async fn deactivate_department(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<(), ServiceError> {
        ensure_catalog_admin(actor)?;
        let result = sqlx::query("UPDATE departments SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.state.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn list_budget_heads(&self, include_inactive: bool) -> Result<Vec<BudgetHead>, ServiceError> {
        let rows = sqlx::query_as::<_, BudgetHead>(
            "SELECT id, name, code, active, created_at FROM budget_heads
             WHERE active OR $1 ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_budget_head(&self, id: Uuid) -> Result<BudgetHead, ServiceError> {
        sqlx::query_as::<_, BudgetHead>(
            "SELECT id, name, code, active, created_at FROM budget_heads WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)
    }

    pub async fn create_budget_head(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateLookupRequest,
    ) -> Result<BudgetHead, ServiceError> {
        ensure_catalog_admin(actor)?;
        validate_lookup(&payload.name, &payload.code)?;
        let row = sqlx::query_as::<_, BudgetHead>(
            "INSERT INTO budget_heads (id, name, code) VALUES ($1,$2,$3)
             RETURNING id, name, code, active, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(payload.name.trim())
        .bind(payload.code.trim())
        .fetch_one(&self.state.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_budget_head(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateLookupRequest,
    ) -> Result<BudgetHead, ServiceError> {
        ensure_catalog_admin(actor)?;
        let row = sqlx::query_as::<_, BudgetHead>(
            "UPDATE budget_heads
             SET name = COALESCE($2, name), code = COALESCE($3, code), active = COALESCE($4, active)
             WHERE id = $1
             RETURNING id, name, code, active, created_at",
        )
        .bind(id)
        .bind(payload.name)
        .bind(payload.code)
        .bind(payload.active)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        Ok(row)
    }

    pub async fn deactivate_budget_head(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<(), ServiceError> {
        ensure_catalog_admin(actor)?;
        let result = sqlx::query("UPDATE budget_heads SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.state.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>, ServiceError> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT id, name, kind, active, created_at FROM categories
             WHERE active OR $1 ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_category(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateCategoryRequest,
    ) -> Result<Category, ServiceError> {
        ensure_catalog_admin(actor)?;
        if payload.name.trim().is_empty() {
            return Err(ServiceError::Validation(vec!["name is required".to_string()]));
        }
        let row = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, kind) VALUES ($1,$2,$3)
             RETURNING id, name, kind, active, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(payload.name.trim())
        .bind(payload.kind)
        .fetch_one(&self.state.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_category(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateCategoryRequest,
    ) -> Result<Category, ServiceError> {
        ensure_catalog_admin(actor)?;
        let row = sqlx::query_as::<_, Category>(
            "UPDATE categories
             SET name = COALESCE($2, name), kind = COALESCE($3, kind), active = COALESCE($4, active)
             WHERE id = $1
             RETURNING id, name, kind, active, created_at",
        )
        .bind(id)
        .bind(payload.name)
        .bind(payload.kind)
        .bind(payload.active)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        Ok(row)
    }

    pub async fn deactivate_category(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<(), ServiceError> {
        ensure_catalog_admin(actor)?;
        let result = sqlx::query("UPDATE categories SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.state.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }
}
