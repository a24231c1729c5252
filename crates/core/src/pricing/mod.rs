//! Pricing rules shared by the storefront and admin.
//!
//! Every rupee amount a customer sees is computed here: offer prices, cart
//! totals, coupon discounts and delivery charges. Callers load the inputs
//! from the database and persist the outputs; nothing in this module does I/O.

pub mod cart;
pub mod coupon;
pub mod delivery;
pub mod offer;

pub use cart::{
    CartLine, CartTotals, MAX_QUANTITY_PER_LINE, edited_line_quantity, max_line_quantity,
    requested_quantity,
};
pub use coupon::{CouponError, CouponRules, normalize_code};
pub use delivery::{DeliverySettings, GeoPoint, haversine_km};
pub use offer::{MAX_OFFER_PERCENT, effective_unit_price, offer_percent_valid};
