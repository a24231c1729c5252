//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use rust_decimal::Decimal;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats an amount as rupees with Indian digit grouping.
///
/// Usage in templates: `{{ metrics.revenue|inr }}`
#[askama::filter_fn]
pub fn inr(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let text = value.to_string();
    Ok(text
        .parse::<Decimal>()
        .map_or(text, threadly_core::format_inr))
}

/// Formats a UTC timestamp in store time.
///
/// Usage in templates: `{{ order.created_at|store_time }}`
#[askama::filter_fn]
pub fn store_time(
    value: &chrono::DateTime<chrono::Utc>,
    _env: &dyn askama::Values,
) -> askama::Result<String> {
    Ok(crate::models::dashboard::store_local(*value)
        .format("%d %b %Y, %I:%M %p")
        .to_string())
}
