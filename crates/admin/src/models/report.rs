//! Sales report rows and totals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use threadly_core::{PaymentMethod, PaymentStatus};

/// One order in a sales report.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub order_number: String,
    pub placed_at: DateTime<Utc>,
    pub customer_name: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub item_count: i64,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub delivery_charge: Decimal,
    pub final_amount: Decimal,
}

/// Totals over a report's rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub order_count: usize,
    pub gross_sales: Decimal,
    pub coupon_discounts: Decimal,
    pub delivery_charges: Decimal,
    pub net_sales: Decimal,
}

impl ReportSummary {
    #[must_use]
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        rows.iter().fold(
            Self {
                order_count: rows.len(),
                ..Self::default()
            },
            |mut acc, r| {
                acc.gross_sales += r.subtotal;
                acc.coupon_discounts += r.discount;
                acc.delivery_charges += r.delivery_charge;
                acc.net_sales += r.final_amount;
                acc
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(subtotal: i64, discount: i64, delivery: i64) -> ReportRow {
        ReportRow {
            order_number: "TH100001".to_string(),
            placed_at: Utc::now(),
            customer_name: "Asha".to_string(),
            payment_method: PaymentMethod::Cod,
            payment_status: PaymentStatus::Paid,
            item_count: 1,
            subtotal: Decimal::from(subtotal),
            discount: Decimal::from(discount),
            delivery_charge: Decimal::from(delivery),
            final_amount: Decimal::from(subtotal - discount + delivery),
        }
    }

    #[test]
    fn test_summary_totals() {
        let summary = ReportSummary::from_rows(&[row(1000, 100, 40), row(2500, 0, 0)]);
        assert_eq!(summary.order_count, 2);
        assert_eq!(summary.gross_sales, Decimal::from(3500));
        assert_eq!(summary.coupon_discounts, Decimal::from(100));
        assert_eq!(summary.delivery_charges, Decimal::from(40));
        assert_eq!(summary.net_sales, Decimal::from(3440));
    }

    #[test]
    fn test_summary_of_nothing_is_zero() {
        assert_eq!(ReportSummary::from_rows(&[]), ReportSummary::default());
    }
}
