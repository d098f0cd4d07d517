//! Caller identity and capability checks.
//!
//! Authentication happens upstream; the platform forwards the authenticated
//! user id in the `X-User-Id` header and this module resolves what that user
//! may see.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::SqlitePool;

use crate::db::repository;
use crate::error::AppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i64,
    pub is_site_admin: bool,
    /// Categories whose subtrees the user manages.
    pub managed_categories: Vec<i64>,
}

impl Actor {
    pub async fn load(db: &SqlitePool, user_id: i64) -> Result<Self, AppError> {
        let user = repository::find_user(db, user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown user".into()))?;
        let managed_categories = if user.is_site_admin {
            Vec::new()
        } else {
            repository::managed_category_ids(db, user.id).await?
        };

        Ok(Actor {
            user_id: user.id,
            is_site_admin: user.is_site_admin,
            managed_categories,
        })
    }

    /// Site admins and category managers.
    pub fn is_privileged(&self) -> bool {
        self.is_site_admin || !self.managed_categories.is_empty()
    }

    pub fn require_privileged(&self) -> Result<(), AppError> {
        if self.is_privileged() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Site administrator or category manager role required".into(),
            ))
        }
    }

    /// Courses the caller teaches (may update).
    pub async fn teaching_course_ids(&self, db: &SqlitePool) -> Result<Vec<i64>, AppError> {
        Ok(repository::teaching_course_ids(db, self.user_id).await?)
    }
}

impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".into()))?
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("Invalid X-User-Id header".into()))?;

        Actor::load(&state.db, user_id).await
    }
}
