//! Cart types.

use rust_decimal::Decimal;

use threadly_core::pricing::{CartLine, CartTotals, max_line_quantity};
use threadly_core::{ProductId, ProductSizeId};

use super::Coupon;

/// One cart line joined with its product data.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_size_id: ProductSizeId,
    pub product_name: String,
    pub size: String,
    pub image: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock: i32,
    /// False when the product, its category or its brand was unlisted.
    pub available: bool,
}

impl CartItem {
    #[must_use]
    pub fn line(&self) -> CartLine {
        CartLine {
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.line().line_total()
    }

    #[must_use]
    pub fn max_quantity(&self) -> i32 {
        max_line_quantity(self.stock)
    }

    /// Whether this line can be ordered as-is.
    #[must_use]
    pub const fn orderable(&self) -> bool {
        self.available && self.quantity <= self.stock
    }
}

/// A user's cart with its applied coupon.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub coupon: Option<Coupon>,
}

impl Cart {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        let lines: Vec<CartLine> = self.items.iter().map(CartItem::line).collect();
        CartTotals::subtotal_of(&lines)
    }

    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether every line can be ordered.
    #[must_use]
    pub fn orderable(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(CartItem::orderable)
    }
}
