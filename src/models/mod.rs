pub mod analytics;
pub mod course;
pub mod grading;
pub mod message;
pub mod payment;
pub mod progress;
pub mod settings;

pub use analytics::{
    CategoryOption, CategoryStat, CourseOption, CourseRoleMember, FilterOptions, SystemAnalytics,
};
pub use course::{Category, Course, User, UserCourse};
pub use grading::{AssignmentRow, GradingCourse, GradingOverview, NeedsGradingCount, PendingAssignment};
pub use message::{BulkMessageRequest, BulkMessageResult, OutgoingMessage};
pub use payment::{
    ActiveEnrolment, CategoryPayments, CoursePayments, PaidInstance, PaymentAnalytics,
    PriceBreakdown, RevenueRecord,
};
pub use progress::{
    ActivityProgress, ActivityRow, CompletionRecord, CourseActivities, CrossCourseProgress,
    ProgressCourse, ProgressStudent, StudentDetailedProgress, StudentIdentity,
};
pub use settings::{DashboardSettings, PaymentMode, SaveSettingsRequest};
