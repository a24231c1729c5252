//! Sales report ranges and exports.
//!
//! A report covers whole store days, `start..=end`. Exports are built in
//! memory: CSV through `csv`, PDF through `lopdf` as a landscape A4 table
//! using the built-in Helvetica fonts.

use chrono::{Days, NaiveDate};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use rust_decimal::Decimal;
use thiserror::Error;

use threadly_core::format_inr;

use crate::models::{ReportRow, ReportSummary};

/// Errors from building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("choose both a start and an end date")]
    MissingDates,

    #[error("the start date must not be after the end date")]
    StartAfterEnd,

    #[error("the end date cannot be in the future")]
    EndInFuture,

    #[error("unknown report period: {0}")]
    UnknownPeriod(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// Whether the error comes from the requested range.
    #[must_use]
    pub const fn is_invalid_range(&self) -> bool {
        matches!(
            self,
            Self::MissingDates | Self::StartAfterEnd | Self::EndInFuture | Self::UnknownPeriod(_)
        )
    }
}

/// Preset or custom report window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl ReportPeriod {
    pub const ALL: [Self; 5] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Yearly,
        Self::Custom,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Daily => "Today",
            Self::Weekly => "Last 7 days",
            Self::Monthly => "Last 30 days",
            Self::Yearly => "Last 365 days",
            Self::Custom => "Custom range",
        }
    }
}

impl std::str::FromStr for ReportPeriod {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ReportError::UnknownPeriod(s.to_string()))
    }
}

/// The days a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    pub period: ReportPeriod,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportRange {
    /// Work out the days for a period. `start` and `end` are only read for
    /// [`ReportPeriod::Custom`].
    ///
    /// # Errors
    ///
    /// Returns `ReportError::MissingDates`, `StartAfterEnd` or `EndInFuture`
    /// for a bad custom range.
    pub fn resolve(
        period: ReportPeriod,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, ReportError> {
        let back = |days: u64| today.checked_sub_days(Days::new(days)).unwrap_or(today);

        let (start, end) = match period {
            ReportPeriod::Daily => (today, today),
            ReportPeriod::Weekly => (back(6), today),
            ReportPeriod::Monthly => (back(29), today),
            ReportPeriod::Yearly => (back(364), today),
            ReportPeriod::Custom => {
                let (Some(start), Some(end)) = (start, end) else {
                    return Err(ReportError::MissingDates);
                };
                if start > end {
                    return Err(ReportError::StartAfterEnd);
                }
                if end > today {
                    return Err(ReportError::EndInFuture);
                }
                (start, end)
            }
        };

        Ok(Self { period, start, end })
    }

    /// Human-readable span, e.g. `01 Oct 2026 to 15 Oct 2026`.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.start == self.end {
            self.start.format("%d %b %Y").to_string()
        } else {
            format!(
                "{} to {}",
                self.start.format("%d %b %Y"),
                self.end.format("%d %b %Y")
            )
        }
    }

    /// Download name without extension.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("sales-report-{}-to-{}", self.start, self.end)
    }
}

// =============================================================================
// CSV
// =============================================================================

const HEADERS: [&str; 10] = [
    "Order",
    "Date",
    "Customer",
    "Payment method",
    "Payment status",
    "Items",
    "Subtotal",
    "Discount",
    "Delivery",
    "Net",
];

/// Spreadsheet export: one line per order, then the totals.
///
/// # Errors
///
/// Returns `ReportError::Csv` if a record cannot be written.
pub fn to_csv(
    range: &ReportRange,
    rows: &[ReportRow],
    summary: &ReportSummary,
) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(["Sales report", range.describe().as_str()])?;
    writer.write_record(HEADERS)?;

    for row in rows {
        writer.write_record([
            row.order_number.clone(),
            row.placed_at.format("%Y-%m-%d %H:%M").to_string(),
            row.customer_name.clone(),
            row.payment_method.label().to_string(),
            row.payment_status.label().to_string(),
            row.item_count.to_string(),
            plain(row.subtotal),
            plain(row.discount),
            plain(row.delivery_charge),
            plain(row.final_amount),
        ])?;
    }

    writer.write_record([""])?;
    for (label, value) in summary_lines(summary, plain) {
        writer.write_record([label, value.as_str()])?;
    }

    writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))
}

fn plain(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

fn summary_lines(
    summary: &ReportSummary,
    money: fn(Decimal) -> String,
) -> [(&'static str, String); 5] {
    [
        ("Orders", summary.order_count.to_string()),
        ("Gross sales", money(summary.gross_sales)),
        ("Coupon discounts", money(summary.coupon_discounts)),
        ("Delivery charges", money(summary.delivery_charges)),
        ("Net sales", money(summary.net_sales)),
    ]
}

// =============================================================================
// PDF
// =============================================================================

const PAGE_WIDTH: i64 = 842;
const PAGE_HEIGHT: i64 = 595;
const MARGIN: i64 = 40;
const LINE_HEIGHT: i64 = 14;
const COLUMNS: [i64; 10] = [40, 110, 175, 300, 365, 445, 480, 565, 645, 720];

/// Text operations, split into pages as the cursor runs out of room.
struct PageWriter {
    pages: Vec<Vec<Operation>>,
    y: i64,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn text(&mut self, x: i64, font: &str, size: i64, s: &str) {
        let ops = self.pages.last_mut();
        if let Some(ops) = ops {
            ops.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font.into(), Object::Integer(size)]),
                Operation::new("Td", vec![Object::Integer(x), Object::Integer(self.y)]),
                Operation::new("Tj", vec![Object::string_literal(pdf_text(s))]),
                Operation::new("ET", vec![]),
            ]);
        }
    }

    fn next_line(&mut self) {
        self.y -= LINE_HEIGHT;
    }

    /// Start a new page unless `lines` more lines fit on this one.
    /// Returns whether a page was started.
    fn ensure_room(&mut self, lines: i64) -> bool {
        if self.y - lines * LINE_HEIGHT < MARGIN {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN;
            true
        } else {
            false
        }
    }

    fn table_header(&mut self) {
        for (x, h) in COLUMNS.iter().zip(HEADERS) {
            self.text(*x, "F2", 9, h);
        }
        self.next_line();
    }
}

/// Printable export: landscape A4 pages with a table of orders, the
/// header repeated on each page, and the totals at the end.
///
/// # Errors
///
/// Returns `ReportError::Pdf` or `ReportError::Io` if the document cannot
/// be encoded.
pub fn to_pdf(
    range: &ReportRange,
    rows: &[ReportRow],
    summary: &ReportSummary,
) -> Result<Vec<u8>, ReportError> {
    let mut w = PageWriter::new();

    w.text(MARGIN, "F2", 16, "Threadly sales report");
    w.next_line();
    w.next_line();
    w.text(MARGIN, "F1", 10, &range.describe());
    w.next_line();
    w.next_line();
    w.table_header();

    for row in rows {
        if w.ensure_room(1) {
            w.table_header();
        }
        let cells = [
            row.order_number.clone(),
            row.placed_at.format("%d %b %Y").to_string(),
            truncate(&row.customer_name, 24),
            row.payment_method.label().to_string(),
            row.payment_status.label().to_string(),
            row.item_count.to_string(),
            pdf_money(row.subtotal),
            pdf_money(row.discount),
            pdf_money(row.delivery_charge),
            pdf_money(row.final_amount),
        ];
        for (x, cell) in COLUMNS.iter().zip(&cells) {
            w.text(*x, "F1", 8, cell);
        }
        w.next_line();
    }

    if rows.is_empty() {
        w.text(MARGIN, "F1", 9, "No sales in this period.");
        w.next_line();
    }

    w.ensure_room(7);
    w.next_line();
    w.text(MARGIN, "F2", 11, "Summary");
    w.next_line();
    for (label, value) in summary_lines(summary, pdf_money) {
        w.text(MARGIN, "F1", 10, label);
        w.text(MARGIN + 140, "F1", 10, &value);
        w.next_line();
    }

    render(w.pages)
}

fn render(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(PAGE_WIDTH),
            Object::Integer(PAGE_HEIGHT),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf)?;
    Ok(buf)
}

/// Amount for the PDF. The standard fonts have no rupee sign.
fn pdf_money(amount: Decimal) -> String {
    format_inr(amount).replace('₹', "Rs. ")
}

/// Keep text inside what the standard fonts can draw.
fn pdf_text(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use threadly_core::{PaymentMethod, PaymentStatus};

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(n: u32) -> ReportRow {
        ReportRow {
            order_number: format!("TH{}", 100_000 + n),
            placed_at: Utc.with_ymd_and_hms(2026, 10, 3, 10, 30, 0).unwrap(),
            customer_name: "Meera Iyer".to_string(),
            payment_method: PaymentMethod::Razorpay,
            payment_status: PaymentStatus::Paid,
            item_count: 2,
            subtotal: Decimal::from(1500),
            discount: Decimal::from(150),
            delivery_charge: Decimal::from(40),
            final_amount: Decimal::from(1390),
        }
    }

    fn range() -> ReportRange {
        ReportRange::resolve(
            ReportPeriod::Custom,
            Some(date(2026, 10, 1)),
            Some(date(2026, 10, 15)),
            date(2026, 10, 15),
        )
        .unwrap()
    }

    #[test]
    fn test_presets_end_today() {
        let today = date(2026, 10, 15);
        let weekly = ReportRange::resolve(ReportPeriod::Weekly, None, None, today).unwrap();
        assert_eq!((weekly.start, weekly.end), (date(2026, 10, 9), today));

        let daily = ReportRange::resolve(ReportPeriod::Daily, None, None, today).unwrap();
        assert_eq!((daily.start, daily.end), (today, today));

        let yearly = ReportRange::resolve(ReportPeriod::Yearly, None, None, today).unwrap();
        assert_eq!(yearly.start, date(2025, 10, 16));
    }

    #[test]
    fn test_custom_range_rules() {
        let today = date(2026, 10, 15);
        assert!(matches!(
            ReportRange::resolve(ReportPeriod::Custom, None, Some(today), today),
            Err(ReportError::MissingDates)
        ));
        assert!(matches!(
            ReportRange::resolve(
                ReportPeriod::Custom,
                Some(date(2026, 10, 10)),
                Some(date(2026, 10, 9)),
                today
            ),
            Err(ReportError::StartAfterEnd)
        ));
        assert!(matches!(
            ReportRange::resolve(
                ReportPeriod::Custom,
                Some(date(2026, 10, 10)),
                Some(date(2026, 10, 16)),
                today
            ),
            Err(ReportError::EndInFuture)
        ));
        assert!(ReportRange::resolve(ReportPeriod::Custom, Some(today), Some(today), today).is_ok());
    }

    #[test]
    fn test_period_parse() {
        assert_eq!("monthly".parse::<ReportPeriod>().unwrap(), ReportPeriod::Monthly);
        assert!(matches!(
            "hourly".parse::<ReportPeriod>(),
            Err(ReportError::UnknownPeriod(_))
        ));
    }

    #[test]
    fn test_csv_has_rows_and_totals() {
        let rows = vec![row(1), row(2)];
        let summary = ReportSummary::from_rows(&rows);
        let text = String::from_utf8(to_csv(&range(), &rows, &summary).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Sales report,01 Oct 2026 to 15 Oct 2026");
        assert!(lines[1].starts_with("Order,Date,Customer"));
        assert_eq!(
            lines[2],
            "TH100001,2026-10-03 10:30,Meera Iyer,Razorpay,Paid,2,1500.00,150.00,40.00,1390.00"
        );
        assert!(lines.contains(&"Orders,2"));
        assert!(lines.contains(&"Net sales,2780.00"));
    }

    #[test]
    fn test_pdf_paginates_long_reports() {
        let rows: Vec<ReportRow> = (0..120).map(row).collect();
        let summary = ReportSummary::from_rows(&rows);
        let bytes = to_pdf(&range(), &rows, &summary).unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 4);
    }

    #[test]
    fn test_pdf_for_empty_report() {
        let bytes = to_pdf(&range(), &[], &ReportSummary::default()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_pdf_text_replaces_non_ascii() {
        assert_eq!(pdf_text("Zoë ₹"), "Zo? ?");
        assert_eq!(pdf_money(Decimal::from(1234)), "Rs. 1,234.00");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long customer name", 10), "a very ...");
    }
}
