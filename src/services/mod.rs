pub mod aggregator;
pub mod filter;
pub mod grading;
pub mod messaging;
pub mod metrics;
pub mod payments;
pub mod progress;
pub mod settings;
pub mod system_analytics;

pub use aggregator::{Aggregator, ProgressDataset};
pub use filter::{CategoryTree, ProgressFilter, StatusFilter};
pub use grading::GradingService;
pub use messaging::MessagingService;
pub use payments::{PaymentQuery, PaymentService};
pub use progress::ProgressService;
pub use settings::SettingsService;
pub use system_analytics::{SystemAnalyticsQuery, SystemAnalyticsService};
