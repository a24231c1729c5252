//! Domain models for the admin panel.
//!
//! These are validated domain types, separate from the database row types
//! used inside `crate::db`.

pub mod admin_user;
pub mod catalog;
pub mod coupon;
pub mod customer;
pub mod dashboard;
pub mod order;
pub mod report;
pub mod session;

pub use admin_user::{AdminRole, AdminUser};
pub use catalog::{Brand, Category, ProductDetail, ProductListItem, SizeStock};
pub use coupon::Coupon;
pub use customer::Customer;
pub use dashboard::{
    ChartPeriod, ChartPoint, DashboardMetrics, TopSeller, store_date, store_day_end, store_local,
};
pub use order::{
    AddressSnapshot, OrderDetail, OrderItem, OrderListItem, ReturnRequest, StatusEntry,
};
pub use report::{ReportRow, ReportSummary};
pub use session::{CurrentAdmin, keys as session_keys};
