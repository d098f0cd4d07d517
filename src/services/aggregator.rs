use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::debug;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{Category, CompletionRecord, Course, ProgressCourse, User};
use crate::services::filter::CategoryTree;

/// Normalized rows for a set of permitted courses.
#[derive(Debug, Clone, Default)]
pub struct ProgressDataset {
    pub courses: Vec<ProgressCourse>,
    pub students: Vec<User>,
    enrolled: HashSet<(i64, i64)>,
    completed: HashSet<(i64, i64)>,
}

impl ProgressDataset {
    /// Flags for one (student, course) pair. A completion counts as an
    /// enrollment even if the enrollment row is gone.
    pub fn completion(&self, user_id: i64, course_id: i64) -> CompletionRecord {
        let key = (user_id, course_id);
        CompletionRecord::new(
            course_id,
            self.enrolled.contains(&key),
            self.completed.contains(&key),
        )
    }

    pub fn completions_for(&self, user_id: i64) -> Vec<CompletionRecord> {
        self.courses
            .iter()
            .map(|c| self.completion(user_id, c.id))
            .collect()
    }
}

pub struct Aggregator {
    db: SqlitePool,
}

impl Aggregator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn progress_dataset(
        &self,
        course_ids: &[i64],
        actor_id: i64,
    ) -> Result<ProgressDataset, AppError> {
        if course_ids.is_empty() {
            return Ok(ProgressDataset::default());
        }

        let courses = repository::fetch_courses_by_ids(&self.db, course_ids).await?;
        let categories = repository::fetch_categories(&self.db).await?;
        let students = repository::enrolled_students(&self.db, course_ids, actor_id).await?;
        let enrolled = repository::enrolment_pairs(&self.db, course_ids)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p.course_id))
            .collect();
        let completed = repository::completion_pairs(&self.db, course_ids)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p.course_id))
            .collect();

        debug!(
            courses = courses.len(),
            students = students.len(),
            "aggregated progress dataset"
        );

        Ok(ProgressDataset {
            courses: with_category_metadata(&courses, &categories),
            students,
            enrolled,
            completed,
        })
    }
}

/// Attaches category name and ancestry path to each course; a missing category
/// yields `Unknown` and an empty path.
pub fn with_category_metadata(courses: &[Course], categories: &[Category]) -> Vec<ProgressCourse> {
    let tree = CategoryTree::from_categories(categories);
    courses
        .iter()
        .map(|c| ProgressCourse {
            id: c.id,
            name: c.fullname.clone(),
            category: c.category,
            categoryname: tree.name(c.category).to_string(),
            categorypath: tree.path(c.category).to_string(),
        })
        .collect()
}
