use std::collections::HashSet;

use sqlx::SqlitePool;
use tracing::info;

use crate::auth::Actor;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{
    ActivityProgress, ActivityRow, CourseActivities, CrossCourseProgress, ProgressStudent,
    StudentDetailedProgress, StudentIdentity,
};
use crate::services::aggregator::{Aggregator, ProgressDataset};
use crate::services::metrics::{self, student_counts};

pub struct ProgressService {
    db: SqlitePool,
}

impl ProgressService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn cross_course_progress(
        &self,
        actor: &Actor,
        now: i64,
    ) -> Result<CrossCourseProgress, AppError> {
        let course_ids = actor.teaching_course_ids(&self.db).await?;
        if course_ids.is_empty() {
            info!(user_id = actor.user_id, "no taught courses, empty progress report");
            return Ok(CrossCourseProgress::default());
        }

        let dataset = Aggregator::new(self.db.clone())
            .progress_dataset(&course_ids, actor.user_id)
            .await?;
        let progress = build_progress(&dataset, now);

        info!(
            user_id = actor.user_id,
            courses = progress.courses.len(),
            students = progress.students.len(),
            "cross-course progress built"
        );
        Ok(progress)
    }

    pub async fn student_detailed_progress(
        &self,
        actor: &Actor,
        student_id: i64,
    ) -> Result<StudentDetailedProgress, AppError> {
        let student = repository::find_user(&self.db, student_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let taught: HashSet<i64> = actor.teaching_course_ids(&self.db).await?.into_iter().collect();
        if taught.is_empty() && !actor.is_site_admin {
            return Err(AppError::Forbidden("Teaching role required".into()));
        }

        let shared: Vec<i64> = repository::student_course_ids(&self.db, student_id)
            .await?
            .into_iter()
            .filter(|id| actor.is_site_admin || taught.contains(id))
            .collect();

        let courses = repository::fetch_courses_by_ids(&self.db, &shared).await?;
        let rows = repository::activities_for_student(&self.db, &shared, student_id).await?;

        let courses = courses
            .into_iter()
            .map(|course| CourseActivities {
                id: course.id,
                activities: rows
                    .iter()
                    .filter(|r| r.course_id == course.id)
                    .map(activity_progress)
                    .collect(),
                fullname: course.fullname,
            })
            .collect();

        Ok(StudentDetailedProgress {
            student: StudentIdentity {
                id: student.id,
                name: student.fullname(),
                email: student.email,
            },
            courses,
        })
    }
}

/// Expands a dataset into the per-student payload. The engagement score uses
/// completion across every course in the dataset.
pub fn build_progress(dataset: &ProgressDataset, now: i64) -> CrossCourseProgress {
    let students = dataset
        .students
        .iter()
        .map(|user| {
            let mut student = ProgressStudent {
                id: user.id,
                name: user.fullname(),
                email: user.email.clone(),
                lastaccess: user.lastaccess,
                engagement_score: 0,
                completions: dataset.completions_for(user.id),
            };
            let counts = student_counts(&student, &dataset.courses);
            student.engagement_score =
                metrics::student_engagement(user.lastaccess, now, counts.completed, counts.enrolled);
            student
        })
        .collect();

    CrossCourseProgress {
        courses: dataset.courses.clone(),
        students,
    }
}

fn activity_progress(row: &ActivityRow) -> ActivityProgress {
    let status = match row.completionstate {
        Some(1) => "Completed",
        Some(2) => "Passed",
        Some(3) => "Failed",
        _ => "Pending",
    };
    let grade = row.finalgrade.map(|g| match row.grademax {
        Some(max) => format!("{:.2} / {:.2}", g, max),
        None => format!("{:.2}", g),
    });

    ActivityProgress {
        id: row.module_id,
        name: row.name.clone(),
        activity_type: row.modname.clone(),
        status: status.to_string(),
        grade,
    }
}
