//! Dashboard figures.

use chrono::{DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

/// Time zone the store's days, weeks and months are counted in.
pub const STORE_TIME_ZONE: &str = "Asia/Kolkata";

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Calendar date at the store for an instant.
#[must_use]
pub fn store_date(at: DateTime<Utc>) -> NaiveDate {
    store_local(at).date()
}

/// Wall-clock time at the store for an instant.
#[must_use]
pub fn store_local(at: DateTime<Utc>) -> NaiveDateTime {
    FixedOffset::east_opt(IST_OFFSET_SECS)
        .map_or_else(|| at.naive_utc(), |tz| at.with_timezone(&tz).naive_local())
}

/// Last second of a store day, as a UTC instant.
#[must_use]
pub fn store_day_end(day: NaiveDate) -> Option<DateTime<Utc>> {
    let tz = FixedOffset::east_opt(IST_OFFSET_SECS)?;
    day.and_hms_opt(23, 59, 59)?
        .and_local_timezone(tz)
        .single()
        .map(|at| at.with_timezone(&Utc))
}

/// Headline numbers.
#[derive(Debug, Clone, Default)]
pub struct DashboardMetrics {
    pub total_revenue: Decimal,
    pub total_orders: i64,
    pub customers: i64,
    pub listed_products: i64,
    pub pending_returns: i64,
}

/// One bar of the sales chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartPoint {
    /// First day of the bucket.
    pub starts_on: NaiveDate,
    pub label: String,
    pub revenue: Decimal,
    pub orders: i64,
}

/// A product, category or brand ranked by units sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopSeller {
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Grouping of the sales chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ChartPeriod {
    pub const ALL: [Self; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Yearly];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Daily => "Last 7 days",
            Self::Weekly => "Last 8 weeks",
            Self::Monthly => "Last 12 months",
            Self::Yearly => "Last 5 years",
        }
    }

    /// Unit passed to `date_trunc`.
    #[must_use]
    pub const fn trunc_unit(&self) -> &'static str {
        match self {
            Self::Daily => "day",
            Self::Weekly => "week",
            Self::Monthly => "month",
            Self::Yearly => "year",
        }
    }

    const fn bucket_count(self) -> u32 {
        match self {
            Self::Daily => 7,
            Self::Weekly => 8,
            Self::Monthly => 12,
            Self::Yearly => 5,
        }
    }

    /// Start of the bucket containing `day`.
    #[must_use]
    pub fn bucket_start(&self, day: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => day,
            Self::Weekly => day - Days::new(u64::from(day.weekday().num_days_from_monday())),
            Self::Monthly => day.with_day(1).unwrap_or(day),
            Self::Yearly => NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(day),
        }
    }

    /// Bucket starts, oldest first, ending with the bucket containing `today`.
    #[must_use]
    pub fn buckets(&self, today: NaiveDate) -> Vec<NaiveDate> {
        let last = self.bucket_start(today);
        let mut starts: Vec<NaiveDate> = (0..self.bucket_count())
            .filter_map(|back| match self {
                Self::Daily => last.checked_sub_days(Days::new(u64::from(back))),
                Self::Weekly => last.checked_sub_days(Days::new(7 * u64::from(back))),
                Self::Monthly => last.checked_sub_months(Months::new(back)),
                Self::Yearly => last.checked_sub_months(Months::new(12 * back)),
            })
            .collect();
        starts.reverse();
        starts
    }

    /// Axis label for a bucket.
    #[must_use]
    pub fn bucket_label(&self, start: NaiveDate) -> String {
        match self {
            Self::Daily => start.format("%d %b").to_string(),
            Self::Weekly => format!("w/c {}", start.format("%d %b")),
            Self::Monthly => start.format("%b %Y").to_string(),
            Self::Yearly => start.format("%Y").to_string(),
        }
    }
}

impl std::str::FromStr for ChartPeriod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or(())
    }
}

/// Lay fetched `(bucket start, revenue, orders)` sums over every bucket,
/// filling empty ones with zeros.
#[must_use]
pub fn fill_chart(
    period: ChartPeriod,
    today: NaiveDate,
    sums: &[(NaiveDate, Decimal, i64)],
) -> Vec<ChartPoint> {
    period
        .buckets(today)
        .into_iter()
        .map(|starts_on| {
            let (revenue, orders) = sums
                .iter()
                .find(|(d, _, _)| *d == starts_on)
                .map_or((Decimal::ZERO, 0), |(_, r, o)| (*r, *o));
            ChartPoint {
                starts_on,
                label: period.bucket_label(starts_on),
                revenue,
                orders,
            }
        })
        .collect()
}

/// Bar height as a percentage of the tallest bar.
#[must_use]
pub fn bar_percent(value: Decimal, max: Decimal) -> u32 {
    use rust_decimal::prelude::ToPrimitive;

    if max <= Decimal::ZERO {
        return 0;
    }
    (value * Decimal::from(100) / max)
        .round()
        .to_u32()
        .unwrap_or(0)
        .min(100)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_buckets_are_last_seven_days() {
        let buckets = ChartPeriod::Daily.buckets(date(2026, 3, 3));
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0], date(2026, 2, 25));
        assert_eq!(buckets[6], date(2026, 3, 3));
    }

    #[test]
    fn test_weekly_buckets_start_on_monday() {
        // 2026-03-05 is a Thursday.
        let buckets = ChartPeriod::Weekly.buckets(date(2026, 3, 5));
        assert_eq!(buckets.len(), 8);
        assert_eq!(buckets[7], date(2026, 3, 2));
        assert_eq!(buckets[6], date(2026, 2, 23));
    }

    #[test]
    fn test_monthly_buckets_cross_year() {
        let buckets = ChartPeriod::Monthly.buckets(date(2026, 2, 17));
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets[0], date(2025, 3, 1));
        assert_eq!(buckets[11], date(2026, 2, 1));
    }

    #[test]
    fn test_yearly_buckets() {
        let buckets = ChartPeriod::Yearly.buckets(date(2026, 7, 9));
        assert_eq!(buckets, vec![
            date(2022, 1, 1),
            date(2023, 1, 1),
            date(2024, 1, 1),
            date(2025, 1, 1),
            date(2026, 1, 1),
        ]);
    }

    #[test]
    fn test_fill_chart_zero_fills_missing_buckets() {
        let today = date(2026, 3, 3);
        let points = fill_chart(ChartPeriod::Daily, today, &[(
            date(2026, 3, 1),
            Decimal::from(2500),
            3,
        )]);
        assert_eq!(points.len(), 7);
        assert_eq!(points[4].revenue, Decimal::from(2500));
        assert_eq!(points[4].orders, 3);
        assert_eq!(points[4].label, "01 Mar");
        assert!(points.iter().filter(|p| p.orders == 0).count() == 6);
    }

    #[test]
    fn test_store_date_uses_ist() {
        let late_evening_utc = DateTime::parse_from_rfc3339("2026-03-03T20:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(store_date(late_evening_utc), date(2026, 3, 4));
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("weekly".parse::<ChartPeriod>(), Ok(ChartPeriod::Weekly));
        assert!("hourly".parse::<ChartPeriod>().is_err());
    }

    #[test]
    fn test_bar_percent() {
        assert_eq!(bar_percent(Decimal::from(50), Decimal::from(200)), 25);
        assert_eq!(bar_percent(Decimal::from(10), Decimal::ZERO), 0);
    }

    #[test]
    fn test_store_day_end_is_ist_midnight() {
        let end = store_day_end(date(2026, 10, 15)).unwrap();
        assert_eq!(end.to_rfc3339(), "2026-10-15T18:29:59+00:00");
        assert_eq!(store_date(end), date(2026, 10, 15));
    }
}
