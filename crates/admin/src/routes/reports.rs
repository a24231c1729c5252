//! Sales report page and exports.

use askama::Template;
use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use super::{AdminUserView, render};
use crate::db::ReportRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::{ReportRow, ReportSummary, store_date};
use crate::services::reports::{self, ReportError, ReportPeriod, ReportRange};
use crate::state::AppState;

/// Report query parameters. Dates are `YYYY-MM-DD`; blanks are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub period: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl ReportQuery {
    fn date(value: Option<&String>) -> Option<NaiveDate> {
        value
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    }

    /// Resolve the requested range against `today`.
    ///
    /// # Errors
    ///
    /// Returns a `ReportError` for an unknown period or a bad custom range.
    pub fn range(&self, today: NaiveDate) -> Result<ReportRange, ReportError> {
        let period = match self.period.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => p.parse::<ReportPeriod>()?,
            None => ReportPeriod::default(),
        };
        ReportRange::resolve(
            period,
            Self::date(self.start.as_ref()),
            Self::date(self.end.as_ref()),
            today,
        )
    }

    /// Query string for the export links.
    #[must_use]
    pub fn export_query(range: &ReportRange) -> String {
        format!(
            "period={}&start={}&end={}",
            range.period.as_str(),
            range.start,
            range.end
        )
    }
}

/// Report page template.
#[derive(Template)]
#[template(path = "reports/index.html")]
pub struct ReportTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub periods: [ReportPeriod; 5],
    pub selected: String,
    pub start: String,
    pub end: String,
    pub today: NaiveDate,
    pub error: Option<String>,
    pub range: Option<ReportRange>,
    pub export_query: String,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
}

async fn load(
    state: &AppState,
    range: &ReportRange,
) -> Result<(Vec<ReportRow>, ReportSummary), AppError> {
    let rows = ReportRepository::new(state.pool())
        .sales(range.start, range.end)
        .await?;
    let summary = ReportSummary::from_rows(&rows);
    Ok((rows, summary))
}

/// Report page. A bad range is shown on the page rather than failing it.
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<ReportQuery>,
) -> Result<Html<String>, AppError> {
    let today = store_date(Utc::now());

    let (range, error) = match query.range(today) {
        Ok(range) => (Some(range), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let (rows, summary) = match &range {
        Some(range) => load(&state, range).await?,
        None => (Vec::new(), ReportSummary::from_rows(&[])),
    };

    let template = ReportTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/reports".to_string(),
        periods: ReportPeriod::ALL,
        selected: range.map_or_else(
            || query.period.clone().unwrap_or_default(),
            |r| r.period.as_str().to_string(),
        ),
        start: range.map_or_else(
            || query.start.clone().unwrap_or_default(),
            |r| r.start.to_string(),
        ),
        end: range.map_or_else(
            || query.end.clone().unwrap_or_default(),
            |r| r.end.to_string(),
        ),
        today,
        error,
        export_query: range
            .as_ref()
            .map(ReportQuery::export_query)
            .unwrap_or_default(),
        range,
        rows,
        summary,
    };

    Ok(render(&template))
}

fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
            (header::CACHE_CONTROL, "private, no-store".to_string()),
        ],
        body,
    )
        .into_response()
}

/// Download the report as CSV.
#[instrument(skip(state, _admin))]
pub async fn export_csv(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let range = query.range(store_date(Utc::now()))?;
    let (rows, summary) = load(&state, &range).await?;
    let body = reports::to_csv(&range, &rows, &summary)?;

    tracing::info!(rows = rows.len(), start = %range.start, end = %range.end, "Exported CSV report");
    Ok(attachment(
        "text/csv; charset=utf-8",
        &format!("{}.csv", range.file_stem()),
        body,
    ))
}

/// Download the report as PDF.
#[instrument(skip(state, _admin))]
pub async fn export_pdf(
    State(state): State<AppState>,
    RequireAdminAuth(_admin): RequireAdminAuth,
    Query(query): Query<ReportQuery>,
) -> Result<Response, AppError> {
    let range = query.range(store_date(Utc::now()))?;
    let (rows, summary) = load(&state, &range).await?;
    let body = reports::to_pdf(&range, &rows, &summary)?;

    tracing::info!(rows = rows.len(), start = %range.start, end = %range.end, "Exported PDF report");
    Ok(attachment(
        "application/pdf",
        &format!("{}.pdf", range.file_stem()),
        body,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn query(period: &str, start: &str, end: &str) -> ReportQuery {
        ReportQuery {
            period: Some(period.to_string()),
            start: Some(start.to_string()),
            end: Some(end.to_string()),
        }
    }

    #[test]
    fn test_default_period_is_today() {
        let range = ReportQuery::default().range(today()).unwrap();
        assert_eq!(range.period, ReportPeriod::Daily);
        assert_eq!(range.start, today());
    }

    #[test]
    fn test_custom_range_parses_dates() {
        let range = query("custom", "2026-10-01", "2026-10-10")
            .range(today())
            .unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(
            ReportQuery::export_query(&range),
            "period=custom&start=2026-10-01&end=2026-10-10"
        );
    }

    #[test]
    fn test_custom_range_errors() {
        assert!(matches!(
            query("custom", "", "2026-10-10").range(today()),
            Err(ReportError::MissingDates)
        ));
        assert!(matches!(
            query("custom", "2026-10-12", "2026-10-10").range(today()),
            Err(ReportError::StartAfterEnd)
        ));
        assert!(matches!(
            query("custom", "2026-10-01", "2026-10-16").range(today()),
            Err(ReportError::EndInFuture)
        ));
        assert!(matches!(
            query("hourly", "", "").range(today()),
            Err(ReportError::UnknownPeriod(_))
        ));
    }

    #[test]
    fn test_attachment_headers() {
        let response = attachment("text/csv; charset=utf-8", "r.csv", b"a,b".to_vec());
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"r.csv\""
        );
    }
}
