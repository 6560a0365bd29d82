use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::models::{Role, User},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::errors::ServiceError;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub department_id: Option<Uuid>,
    pub active: Option<bool>,
}

pub struct UserService {
    pub state: Arc<AppState>,
}

fn ensure_admin(actor: &AuthenticatedUser) -> Result<(), ServiceError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

impl UserService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn list(&self, actor: &AuthenticatedUser) -> Result<Vec<User>, ServiceError> {
        ensure_admin(actor)?;
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, display_name, role, department_id, active, created_at
             FROM users ORDER BY username",
        )
        .fetch_all(&self.state.pool)
        .await?;
        Ok(users)
    }

    pub async fn get(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<User, ServiceError> {
        ensure_admin(actor)?;
        sqlx::query_as::<_, User>(
            "SELECT id, username, display_name, role, department_id, active, created_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)
    }

    pub async fn create(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateUserRequest,
    ) -> Result<User, ServiceError> {
        ensure_admin(actor)?;
        let mut problems = Vec::new();
        if payload.username.trim().is_empty() {
            problems.push("username is required".to_string());
        }
        if payload.display_name.trim().is_empty() {
            problems.push("display name is required".to_string());
        }
        // Department users act for exactly one department.
        if payload.role == Role::Department && payload.department_id.is_none() {
            problems.push("department users must belong to a department".to_string());
        }
        if !problems.is_empty() {
            return Err(ServiceError::Validation(problems));
        }
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, display_name, role, department_id)
             VALUES ($1,$2,$3,$4,$5)
             RETURNING id, username, display_name, role, department_id, active, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(payload.username.trim())
        .bind(payload.display_name.trim())
        .bind(payload.role)
        .bind(payload.department_id)
        .fetch_one(&self.state.pool)
        .await?;
        Ok(user)
    }

    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        payload: UpdateUserRequest,
    ) -> Result<User, ServiceError> {
        ensure_admin(actor)?;
        let user = sqlx::query_as::<_, User>(
            "UPDATE users
             SET display_name = COALESCE($2, display_name),
                 role = COALESCE($3, role),
                 department_id = COALESCE($4, department_id),
                 active = COALESCE($5, active)
             WHERE id = $1
             RETURNING id, username, display_name, role, department_id, active, created_at",
        )
        .bind(id)
        .bind(payload.display_name)
        .bind(payload.role)
        .bind(payload.department_id)
        .bind(payload.active)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        Ok(user)
    }

    /// Deactivation rather than deletion keeps the audit trail's actor
    /// references resolvable.
    pub async fn deactivate(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<(), ServiceError> {
        ensure_admin(actor)?;
        let result = sqlx::query("UPDATE users SET active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.state.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }
        Ok(())
    }
}
