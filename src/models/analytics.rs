use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRow)]
pub struct CourseRoleMember {
    pub course_id: i64,
    pub user_id: i64,
    pub is_teacher: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub course_count: usize,
    pub student_count: usize,
    pub teacher_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryOption {
    pub id: i64,
    pub name: String,
    pub parent: i64,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseOption {
    pub id: i64,
    pub name: String,
    pub category: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    pub categories: Vec<CategoryOption>,
    pub courses: Vec<CourseOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemAnalytics {
    pub total_students: usize,
    pub total_teachers: usize,
    pub total_courses: usize,
    pub total_categories: usize,
    pub categories: Vec<CategoryStat>,
    pub filter_options: FilterOptions,
}
