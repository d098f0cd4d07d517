use std::collections::BTreeSet;

use axum::extract::{Path, Query};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use chrono::Utc;
use serde::{Deserialize, Deserializer};

use crate::auth::Actor;
use crate::error::AppError;
use crate::export;
use crate::models::*;
use crate::services::{
    GradingService, MessagingService, PaymentQuery, PaymentService, ProgressFilter,
    ProgressService, SettingsService, StatusFilter, SystemAnalyticsQuery, SystemAnalyticsService,
};
use crate::state::AppState;
use crate::view::ProgressView;

/// Accepts `1`/`0` as well as `true`/`false`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("1") | Some("true") => Ok(Some(true)),
        Some("0") | Some("false") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!("invalid flag: {}", other))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ProgressParams {
    #[serde(default, alias = "courseId")]
    courseid: Option<i64>,
    #[serde(default, alias = "categoryId")]
    categoryid: Option<i64>,
    #[serde(default, alias = "includeSubcategories", deserialize_with = "deserialize_flag")]
    includesubcategories: Option<bool>,
    /// Comma-separated checked subcategory ids.
    #[serde(default)]
    subcategories: Option<String>,
    #[serde(default)]
    status: Option<StatusFilter>,
}

impl ProgressParams {
    fn subcategory_ids(&self) -> Result<Option<BTreeSet<i64>>, AppError> {
        let Some(raw) = &self.subcategories else {
            return Ok(None);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| AppError::BadRequest(format!("invalid subcategory id: {}", s)))
            })
            .collect::<Result<BTreeSet<i64>, AppError>>()
            .map(Some)
    }
}

#[derive(Debug, Deserialize)]
struct GradingParams {
    #[serde(default, alias = "courseId")]
    courseid: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SystemParams {
    #[serde(default, alias = "categoryId")]
    categoryid: Option<i64>,
    #[serde(default, alias = "courseId")]
    courseid: Option<i64>,
    #[serde(default, alias = "includeSubcategories", deserialize_with = "deserialize_flag")]
    includesubcategories: Option<bool>,
}

impl From<SystemParams> for SystemAnalyticsQuery {
    fn from(p: SystemParams) -> Self {
        SystemAnalyticsQuery {
            category_id: p.categoryid.filter(|id| *id > 0),
            course_id: p.courseid.filter(|id| *id > 0),
            include_subcategories: p.includesubcategories.unwrap_or(true),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentParams {
    #[serde(default, alias = "categoryId")]
    categoryid: Option<i64>,
    #[serde(default, alias = "fromDate")]
    fromdate: Option<i64>,
    #[serde(default, alias = "toDate")]
    todate: Option<i64>,
    #[serde(default, alias = "paymentMode")]
    payment_mode: Option<PaymentMode>,
}

impl From<PaymentParams> for PaymentQuery {
    fn from(p: PaymentParams) -> Self {
        PaymentQuery {
            category_id: p.categoryid.filter(|id| *id > 0),
            from_date: p.fromdate.unwrap_or(0),
            to_date: p.todate.unwrap_or(0),
            payment_mode: p.payment_mode,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/progress", get(cross_course_progress))
        .route("/progress/export", get(export_progress))
        .route("/progress/students/{id}", get(student_detailed_progress))
        .route("/grading", get(grading_overview))
        .route("/analytics/system", get(system_analytics))
        .route("/analytics/system/export", get(export_system_analytics))
        .route("/analytics/payments", get(payment_analytics))
        .route("/analytics/payments/export", get(export_payment_analytics))
        .route("/settings", get(get_settings).post(save_settings))
        .route("/messages/bulk", post(send_bulk_message))
        .with_state(state)
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn csv_response(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

/// Loads the caller's report and applies the request's filter to it. Subtree
/// inclusion is off unless asked for; without an explicit subcategory list every
/// subcategory of the category is checked.
async fn progress_view(state: &AppState, actor: &Actor, params: &ProgressParams) -> Result<ProgressView, AppError> {
    let data = ProgressService::new(state.db.clone())
        .cross_course_progress(actor, now())
        .await?;
    let mut view = ProgressView::new(data);

    view.set_filter(ProgressFilter {
        course_id: params.courseid.filter(|id| *id > 0),
        include_subcategories: params.includesubcategories.unwrap_or(false),
        status: params.status,
        ..ProgressFilter::default()
    });
    view.set_category(params.categoryid.filter(|id| *id > 0));
    if let Some(checked) = params.subcategory_ids()? {
        let mut filter = view.filter().clone();
        filter.selected_subcategories = checked;
        view.set_filter(filter);
    }
    Ok(view)
}

async fn cross_course_progress(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ProgressParams>,
) -> Result<Json<CrossCourseProgress>, AppError> {
    let view = progress_view(&state, &actor, &params).await?;
    Ok(Json(view.filtered().clone()))
}

async fn export_progress(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ProgressParams>,
) -> Result<Response, AppError> {
    let view = progress_view(&state, &actor, &params).await?;
    Ok(csv_response("student_progress_export.csv", view.export_csv()?))
}

async fn student_detailed_progress(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<StudentDetailedProgress>, AppError> {
    let detail = ProgressService::new(state.db.clone())
        .student_detailed_progress(&actor, id)
        .await?;
    Ok(Json(detail))
}

async fn grading_overview(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<GradingParams>,
) -> Result<Json<GradingOverview>, AppError> {
    let overview = GradingService::new(state.db.clone())
        .grading_overview(&actor, params.courseid.filter(|id| *id > 0), now())
        .await?;
    Ok(Json(overview))
}

async fn system_analytics(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<SystemParams>,
) -> Result<Json<SystemAnalytics>, AppError> {
    let analytics = SystemAnalyticsService::new(state.db.clone())
        .system_analytics(&actor, params.into())
        .await?;
    Ok(Json(analytics))
}

async fn export_system_analytics(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<SystemParams>,
) -> Result<Response, AppError> {
    let analytics = SystemAnalyticsService::new(state.db.clone())
        .system_analytics(&actor, params.into())
        .await?;
    Ok(csv_response("system_analytics.csv", export::system_csv(&analytics)?))
}

async fn payment_analytics(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<PaymentParams>,
) -> Result<Json<PaymentAnalytics>, AppError> {
    let analytics = PaymentService::new(state.db.clone())
        .payment_analytics(&actor, params.into(), now())
        .await?;
    Ok(Json(analytics))
}

async fn export_payment_analytics(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<PaymentParams>,
) -> Result<Response, AppError> {
    let analytics = PaymentService::new(state.db.clone())
        .payment_analytics(&actor, params.into(), now())
        .await?;
    let saved = SettingsService::new(state.db.clone()).get().await?;
    // Judged against the mode actually used, which differs after a ledger fallback.
    let hide_currency = DashboardSettings {
        payment_mode: analytics.payment_mode,
        hide_currency: saved.hide_currency,
    }
    .effective_hide_currency();

    Ok(csv_response(
        "payment_report.csv",
        export::payments_csv(&analytics, hide_currency)?,
    ))
}

async fn get_settings(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<DashboardSettings>, AppError> {
    actor.require_privileged()?;
    let settings = SettingsService::new(state.db.clone()).get().await?;
    Ok(Json(settings))
}

async fn save_settings(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<SaveSettingsRequest>,
) -> Result<Json<DashboardSettings>, AppError> {
    actor.require_privileged()?;
    let settings = SettingsService::new(state.db.clone()).save(req).await?;
    Ok(Json(settings))
}

async fn send_bulk_message(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<BulkMessageRequest>,
) -> Result<Json<BulkMessageResult>, AppError> {
    let result = MessagingService::new(state.db.clone(), state.messenger.clone())
        .send_bulk(&actor, req)
        .await?;
    Ok(Json(result))
}
