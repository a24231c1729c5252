//! Domain models for the storefront.
//!
//! These are validated domain types, separate from the database row types
//! used inside `crate::db`.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod order;
pub mod session;
pub mod user;
pub mod wallet;

pub use address::{Address, AddressSnapshot};
pub use cart::{Cart, CartItem};
pub use catalog::{Brand, Category, Product, ProductCard, ProductSize};
pub use coupon::Coupon;
pub use order::{Order, OrderItem, OrderSummary, ReturnRequest, StatusEntry};
pub use session::{CurrentUser, PendingSignup, keys as session_keys};
pub use user::User;
pub use wallet::{Wallet, WalletTransaction};
