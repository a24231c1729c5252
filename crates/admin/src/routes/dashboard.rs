//! Dashboard route handler.

use askama::Template;
use axum::{
    extract::{Query, State},
    response::Html,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use super::{AdminUserView, render};
use crate::db::DashboardRepository;
use crate::db::dashboard::Ranking;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAdminAuth;
use crate::models::dashboard::{bar_percent, fill_chart};
use crate::models::{ChartPeriod, ChartPoint, DashboardMetrics, TopSeller, store_date};
use crate::state::AppState;

/// Dashboard query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub period: Option<String>,
}

/// One bar of the chart, scaled against the tallest.
#[derive(Debug, Clone)]
pub struct ChartBar {
    pub label: String,
    pub revenue: Decimal,
    pub orders: i64,
    pub percent: u32,
}

/// Scale chart points into bars.
#[must_use]
pub fn chart_bars(points: &[ChartPoint]) -> Vec<ChartBar> {
    let max = points
        .iter()
        .map(|p| p.revenue)
        .max()
        .unwrap_or(Decimal::ZERO);

    points
        .iter()
        .map(|p| ChartBar {
            label: p.label.clone(),
            revenue: p.revenue,
            orders: p.orders,
            percent: bar_percent(p.revenue, max),
        })
        .collect()
}

/// Dashboard template.
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub metrics: DashboardMetrics,
    pub period: ChartPeriod,
    pub periods: [ChartPeriod; 4],
    pub bars: Vec<ChartBar>,
    pub top_products: Vec<TopSeller>,
    pub top_categories: Vec<TopSeller>,
    pub top_brands: Vec<TopSeller>,
}

/// Dashboard page handler.
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let period = query
        .period
        .as_deref()
        .and_then(|p| p.parse::<ChartPeriod>().ok())
        .unwrap_or_default();

    let repo = DashboardRepository::new(state.pool());
    let today = store_date(Utc::now());
    let buckets = period.buckets(today);
    let since = buckets.first().copied().unwrap_or(today);

    let metrics = repo.metrics().await?;
    let sums = repo.sales_by_bucket(period, since).await?;
    let top_products = repo.top_sellers(Ranking::Products).await?;
    let top_categories = repo.top_sellers(Ranking::Categories).await?;
    let top_brands = repo.top_sellers(Ranking::Brands).await?;

    let template = DashboardTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin".to_string(),
        metrics,
        period,
        periods: ChartPeriod::ALL,
        bars: chart_bars(&fill_chart(period, today, &sums)),
        top_products,
        top_categories,
        top_brands,
    };

    Ok(render(&template))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_chart_bars_scale_to_tallest() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let point = |revenue: i64| ChartPoint {
            starts_on: day,
            label: "01 Oct".to_string(),
            revenue: Decimal::from(revenue),
            orders: 1,
        };

        let bars = chart_bars(&[point(500), point(2000), point(0)]);
        let percents: Vec<u32> = bars.iter().map(|b| b.percent).collect();
        assert_eq!(percents, vec![25, 100, 0]);
    }

    #[test]
    fn test_chart_bars_all_zero() {
        assert!(chart_bars(&[]).is_empty());
    }
}
