use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressCourse {
    pub id: i64,
    pub name: String,
    pub category: i64,
    pub categoryname: String,
    pub categorypath: String,
}

/// Enrollment and completion flags for one (student, course) pair.
///
/// Completion implies enrollment; [`CompletionRecord::new`] upholds it even when
/// the enrollment row was removed after the student completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub courseid: i64,
    pub enrolled: bool,
    pub completed: bool,
}

impl CompletionRecord {
    pub fn new(courseid: i64, enrolled: bool, completed: bool) -> Self {
        Self {
            courseid,
            enrolled: enrolled || completed,
            completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStudent {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub lastaccess: i64,
    pub engagement_score: u8,
    pub completions: Vec<CompletionRecord>,
}

impl ProgressStudent {
    pub fn completion(&self, course_id: i64) -> Option<&CompletionRecord> {
        self.completions.iter().find(|c| c.courseid == course_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossCourseProgress {
    pub courses: Vec<ProgressCourse>,
    pub students: Vec<ProgressStudent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentIdentity {
    pub id: i64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityProgress {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub status: String,
    pub grade: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseActivities {
    pub id: i64,
    pub fullname: String,
    pub activities: Vec<ActivityProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentDetailedProgress {
    pub student: StudentIdentity,
    pub courses: Vec<CourseActivities>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    pub course_id: i64,
    pub module_id: i64,
    pub name: String,
    pub modname: String,
    pub completionstate: Option<i64>,
    pub finalgrade: Option<f64>,
    pub grademax: Option<f64>,
}
