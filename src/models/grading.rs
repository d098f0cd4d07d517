use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    pub id: i64,
    pub course_id: i64,
    pub cmid: i64,
    pub name: String,
    pub duedate: i64,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct NeedsGradingCount {
    pub assignment_id: i64,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAssignment {
    pub id: i64,
    pub cmid: i64,
    pub name: String,
    pub duedate: i64,
    pub duedatestr: String,
    pub needsgrading: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingCourse {
    pub id: i64,
    pub fullname: String,
    pub assignments: Vec<PendingAssignment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradingOverview {
    pub courses: Vec<GradingCourse>,
}
