use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::auth::Actor;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{ActiveEnrolment, Course, PaidInstance, PaymentAnalytics, PaymentMode, RevenueRecord};
use crate::services::filter::{resolve_course_scope, CategoryTree};
use crate::services::metrics::summarize_revenue;
use crate::services::settings::SettingsService;
use crate::services::system_analytics::permitted_categories;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaymentQuery {
    pub category_id: Option<i64>,
    pub from_date: i64,
    /// 0 leaves the range open-ended.
    pub to_date: i64,
    /// Falls back to the saved dashboard setting when absent.
    pub payment_mode: Option<PaymentMode>,
}

pub struct PaymentService {
    db: SqlitePool,
}

impl PaymentService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn payment_analytics(
        &self,
        actor: &Actor,
        query: PaymentQuery,
        now: i64,
    ) -> Result<PaymentAnalytics, AppError> {
        actor.require_privileged()?;
        if query.to_date > 0 && query.from_date > query.to_date {
            return Err(AppError::BadRequest("fromdate must not be after todate".into()));
        }

        let requested = match query.payment_mode {
            Some(mode) => mode,
            None => SettingsService::new(self.db.clone()).get().await?.payment_mode,
        };

        let categories = repository::fetch_categories(&self.db).await?;
        let tree = CategoryTree::from_categories(&categories);
        let permitted = permitted_categories(actor, &tree);
        if let (Some(category), Some(permitted)) = (query.category_id, &permitted) {
            if !permitted.contains(&category) {
                return Err(AppError::Forbidden(format!("Category {} is not managed by you", category)));
            }
        }

        let courses: Vec<Course> = repository::fetch_all_courses(&self.db)
            .await?
            .into_iter()
            .filter(|c| permitted.as_ref().is_none_or(|p| p.contains(&c.category)))
            .collect();
        let scope = resolve_course_scope(&courses, &tree, query.category_id, None, true);
        let course_ids: Vec<i64> = scope.iter().map(|c| c.id).collect();

        let mode = if requested == PaymentMode::Actual && repository::ledger_is_empty(&self.db).await? {
            warn!("payment ledger is empty, falling back to estimated revenue");
            PaymentMode::Estimated
        } else {
            requested
        };

        let records = match mode {
            PaymentMode::Actual => {
                repository::ledger_payments(&self.db, &course_ids, query.from_date, query.to_date).await?
            }
            PaymentMode::Estimated => {
                let instances = repository::paid_instances(&self.db, &course_ids).await?;
                let instance_ids: Vec<i64> = instances.iter().map(|i| i.id).collect();
                let enrolments = repository::active_enrolments(&self.db, &instance_ids, now).await?;
                estimated_records(&instances, &enrolments)
            }
        };

        let summary = summarize_revenue(&records, &scope, &tree);
        info!(
            user_id = actor.user_id,
            mode = %mode,
            courses = summary.courses.len(),
            revenue = summary.total_revenue,
            "payment analytics built"
        );

        Ok(PaymentAnalytics {
            payment_mode: mode,
            total_students: summary.total_students,
            total_revenue: summary.total_revenue,
            currency: summary.currency,
            categories: summary.categories,
            courses: summary.courses,
        })
    }
}

/// One record per current active enrollment, priced at its instance cost.
/// Enrollment counts are taken as of now, whatever the requested date range.
pub fn estimated_records(instances: &[PaidInstance], enrolments: &[ActiveEnrolment]) -> Vec<RevenueRecord> {
    let by_instance: HashMap<i64, &PaidInstance> = instances.iter().map(|i| (i.id, i)).collect();
    enrolments
        .iter()
        .filter_map(|e| {
            by_instance.get(&e.enrol_id).map(|instance| RevenueRecord {
                course_id: instance.course_id,
                user_id: e.user_id,
                amount: instance.cost,
                currency: instance.currency.clone(),
            })
        })
        .collect()
}
