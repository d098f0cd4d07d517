use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::PaymentMode;

/// An enrollment instance with a price attached.
#[derive(Debug, Clone, FromRow)]
pub struct PaidInstance {
    pub id: i64,
    pub course_id: i64,
    pub cost: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct ActiveEnrolment {
    pub enrol_id: i64,
    pub user_id: i64,
}

/// One revenue-bearing event: a ledger payment in actual mode, or one active
/// enrollment priced at its instance cost in estimated mode.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct RevenueRecord {
    pub course_id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub amount: f64,
    pub currency: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursePayments {
    pub id: i64,
    pub name: String,
    pub shortname: String,
    pub category: i64,
    pub student_count: usize,
    pub revenue: f64,
    /// Most frequent currency among this course's payments.
    pub currency: String,
    pub payment_breakdown: Vec<PriceBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPayments {
    pub id: i64,
    pub name: String,
    pub student_count: usize,
    pub revenue: f64,
    pub payment_breakdown: Vec<PriceBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAnalytics {
    pub payment_mode: PaymentMode,
    pub total_students: usize,
    pub total_revenue: f64,
    pub currency: String,
    pub categories: Vec<CategoryPayments>,
    pub courses: Vec<CoursePayments>,
}
