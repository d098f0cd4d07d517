use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::info;

use crate::auth::Actor;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{CategoryOption, Course, CourseOption, FilterOptions, SystemAnalytics};
use crate::services::filter::{resolve_course_scope, CategoryTree};
use crate::services::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemAnalyticsQuery {
    pub category_id: Option<i64>,
    pub course_id: Option<i64>,
    pub include_subcategories: bool,
}

impl Default for SystemAnalyticsQuery {
    fn default() -> Self {
        Self {
            category_id: None,
            course_id: None,
            include_subcategories: true,
        }
    }
}

pub struct SystemAnalyticsService {
    db: SqlitePool,
}

impl SystemAnalyticsService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn system_analytics(
        &self,
        actor: &Actor,
        query: SystemAnalyticsQuery,
    ) -> Result<SystemAnalytics, AppError> {
        actor.require_privileged()?;

        let categories = repository::fetch_categories(&self.db).await?;
        let tree = CategoryTree::from_categories(&categories);
        let permitted = permitted_categories(actor, &tree);

        if let (Some(category), Some(permitted)) = (query.category_id, &permitted) {
            if !permitted.contains(&category) {
                return Err(AppError::Forbidden(format!("Category {} is not managed by you", category)));
            }
        }

        let all_courses: Vec<Course> = repository::fetch_all_courses(&self.db)
            .await?
            .into_iter()
            .filter(|c| permitted.as_ref().is_none_or(|p| p.contains(&c.category)))
            .collect();

        let scope = resolve_course_scope(
            &all_courses,
            &tree,
            query.category_id,
            query.course_id,
            query.include_subcategories,
        );
        let scope_ids: Vec<i64> = scope.iter().map(|c| c.id).collect();
        let members = repository::role_members(&self.db, &scope_ids).await?;
        let totals = metrics::category_stats(&scope, &members, &tree);

        let filter_options = FilterOptions {
            categories: categories
                .iter()
                .filter(|c| permitted.as_ref().is_none_or(|p| p.contains(&c.id)))
                .map(|c| CategoryOption {
                    id: c.id,
                    name: c.name.clone(),
                    parent: c.parent,
                    path: c.path.clone(),
                })
                .collect(),
            courses: all_courses
                .iter()
                .map(|c| CourseOption {
                    id: c.id,
                    name: c.fullname.clone(),
                    category: c.category,
                })
                .collect(),
        };

        info!(
            user_id = actor.user_id,
            courses = scope.len(),
            categories = totals.categories.len(),
            "system analytics built"
        );

        Ok(SystemAnalytics {
            total_students: totals.total_students,
            total_teachers: totals.total_teachers,
            total_courses: scope.len(),
            total_categories: totals.categories.len(),
            categories: totals.categories,
            filter_options,
        })
    }
}

/// `None` for site admins (no restriction); otherwise the union of the managed
/// subtrees.
pub fn permitted_categories(actor: &Actor, tree: &CategoryTree) -> Option<HashSet<i64>> {
    if actor.is_site_admin {
        return None;
    }
    Some(
        actor
            .managed_categories
            .iter()
            .flat_map(|id| tree.subtree(*id))
            .collect(),
    )
}
