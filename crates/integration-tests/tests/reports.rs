//! Sales report ranges and export formats.

#![allow(clippy::unwrap_used)]

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use threadly_admin::models::{ReportRow, ReportSummary};
use threadly_admin::services::reports::{ReportError, ReportPeriod, ReportRange, to_csv, to_pdf};
use threadly_core::{PaymentMethod, PaymentStatus};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn row(number: u32, subtotal: i64, discount: i64, delivery: i64) -> ReportRow {
    ReportRow {
        order_number: format!("TH{number:06}"),
        placed_at: Utc.with_ymd_and_hms(2026, 10, 14, 6, 30, 0).unwrap(),
        customer_name: "Meera Nair".to_string(),
        payment_method: PaymentMethod::Razorpay,
        payment_status: PaymentStatus::Paid,
        item_count: 2,
        subtotal: Decimal::from(subtotal),
        discount: Decimal::from(discount),
        delivery_charge: Decimal::from(delivery),
        final_amount: Decimal::from(subtotal - discount + delivery),
    }
}

fn weekly() -> ReportRange {
    ReportRange::resolve(ReportPeriod::Weekly, None, None, date(2026, 10, 15)).unwrap()
}

#[test]
fn test_custom_range_rules() {
    let today = date(2026, 10, 15);
    assert!(matches!(
        ReportRange::resolve(ReportPeriod::Custom, None, Some(today), today),
        Err(ReportError::MissingDates)
    ));
    assert!(matches!(
        ReportRange::resolve(ReportPeriod::Custom, Some(today), Some(date(2026, 10, 1)), today),
        Err(ReportError::StartAfterEnd)
    ));
    assert!(matches!(
        ReportRange::resolve(ReportPeriod::Custom, Some(today), Some(date(2026, 10, 16)), today),
        Err(ReportError::EndInFuture)
    ));
    let range =
        ReportRange::resolve(ReportPeriod::Custom, Some(date(2026, 9, 1)), Some(today), today)
            .unwrap();
    assert_eq!(range.start, date(2026, 9, 1));
}

#[test]
fn test_preset_ranges_end_today() {
    let today = date(2026, 10, 15);
    let range = ReportRange::resolve(ReportPeriod::Daily, None, None, today).unwrap();
    assert_eq!((range.start, range.end), (today, today));
    let range = weekly();
    assert_eq!(range.end, today);
    assert_eq!(range.start, date(2026, 10, 9));
}

#[test]
fn test_csv_has_title_header_rows_and_totals() {
    let rows = vec![row(1, 1000, 100, 40), row(2, 500, 0, 60)];
    let summary = ReportSummary::from_rows(&rows);
    let csv = String::from_utf8(to_csv(&weekly(), &rows, &summary).unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert!(lines[0].starts_with("Sales report,"));
    assert!(lines[1].starts_with("Order,Date,Customer"));
    assert!(lines[2].starts_with("TH000001,"));
    assert!(lines[2].ends_with("1000.00,100.00,40.00,940.00"));
    assert!(lines.iter().any(|l| *l == "Net sales,1500.00"));
}

#[test]
fn test_pdf_is_a_pdf_document() {
    let rows: Vec<ReportRow> = (1..=120).map(|n| row(n, 800, 0, 40)).collect();
    let summary = ReportSummary::from_rows(&rows);
    let pdf = to_pdf(&weekly(), &rows, &summary).unwrap();

    assert!(pdf.starts_with(b"%PDF-"));
    let doc = lopdf::Document::load_mem(&pdf).unwrap();
    assert!(doc.get_pages().len() > 1, "120 orders should span pages");
}
