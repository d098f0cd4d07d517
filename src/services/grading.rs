use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::auth::Actor;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{AssignmentRow, Course, GradingCourse, GradingOverview, PendingAssignment};

pub struct GradingService {
    db: SqlitePool,
}

impl GradingService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Assignments with submissions waiting for a grade, grouped by course.
    pub async fn grading_overview(
        &self,
        actor: &Actor,
        course_id: Option<i64>,
        now: i64,
    ) -> Result<GradingOverview, AppError> {
        let taught = actor.teaching_course_ids(&self.db).await?;
        let course_ids = match course_id {
            Some(id) if taught.contains(&id) => vec![id],
            Some(id) => {
                return Err(AppError::Forbidden(format!("Not a teacher of course {}", id)));
            }
            None => taught,
        };
        if course_ids.is_empty() {
            return Ok(GradingOverview::default());
        }

        let courses = repository::fetch_courses_by_ids(&self.db, &course_ids).await?;
        let assignments = repository::assignments_for_courses(&self.db, &course_ids).await?;
        if assignments.is_empty() {
            return Ok(GradingOverview::default());
        }

        let assignment_ids: Vec<i64> = assignments.iter().map(|a| a.id).collect();
        let counts: HashMap<i64, i64> = repository::needs_grading_counts(&self.db, &assignment_ids, now)
            .await?
            .into_iter()
            .map(|c| (c.assignment_id, c.count))
            .collect();

        let overview = assemble_overview(&courses, &assignments, &counts);
        info!(
            user_id = actor.user_id,
            courses = overview.courses.len(),
            "grading overview built"
        );
        Ok(overview)
    }
}

/// Drops assignments with nothing to grade and courses left empty.
pub fn assemble_overview(
    courses: &[Course],
    assignments: &[AssignmentRow],
    counts: &HashMap<i64, i64>,
) -> GradingOverview {
    let courses = courses
        .iter()
        .filter_map(|course| {
            let pending: Vec<PendingAssignment> = assignments
                .iter()
                .filter(|a| a.course_id == course.id)
                .filter_map(|a| {
                    let needsgrading = counts.get(&a.id).copied().unwrap_or(0);
                    (needsgrading > 0).then(|| PendingAssignment {
                        id: a.id,
                        cmid: a.cmid,
                        name: a.name.clone(),
                        duedate: a.duedate,
                        duedatestr: format_due_date(a.duedate),
                        needsgrading,
                    })
                })
                .collect();

            (!pending.is_empty()).then(|| GradingCourse {
                id: course.id,
                fullname: course.fullname.clone(),
                assignments: pending,
            })
        })
        .collect();

    GradingOverview { courses }
}

pub fn format_due_date(duedate: i64) -> String {
    if duedate <= 0 {
        return "-".to_string();
    }
    DateTime::<Utc>::from_timestamp(duedate, 0)
        .map(|dt| dt.format("%A, %-d %B %Y, %-I:%M %p").to_string())
        .unwrap_or_else(|| "-".to_string())
}
