use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use shop_admin_core::dashboard::{build_report, DashboardReport, DateRange, DEFAULT_WINDOW_DAYS};

use crate::admin::HtmlError;
use crate::problem::{AppError, ProblemResponse};
use crate::router::AppState;
use crate::views::{self, DashboardTemplate};

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
}

/// Requested window; dates that do not parse as `YYYY-MM-DD` fall back to
/// the last [`DEFAULT_WINDOW_DAYS`] days ending `today`.
fn resolve_range(params: &DashboardParams, today: NaiveDate) -> Result<DateRange, AppError> {
    let fallback = DateRange::ending_at(today, DEFAULT_WINDOW_DAYS);
    let parse = |raw: Option<&str>| {
        raw.and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
    };
    let start = parse(params.start_date.as_deref()).unwrap_or(fallback.start());
    let end = parse(params.end_date.as_deref()).unwrap_or(fallback.end());
    Ok(DateRange::new(start, end)?)
}

async fn load_report(state: &AppState, params: &DashboardParams) -> Result<DashboardReport, AppError> {
    let range = resolve_range(params, state.now().date_naive())?;
    let lines = state.storage().dashboard_lines(&range).await?;
    Ok(build_report(range, &lines))
}

pub async fn page(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Html<String>, HtmlError> {
    let report = load_report(&state, &params).await?;
    let template = DashboardTemplate::new(&report);
    Ok(Html(views::render(&template)?))
}

pub async fn json(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardReport>, ProblemResponse> {
    Ok(Json(load_report(&state, &params).await?))
}
