//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use threadly_core::pricing::effective_unit_price;
use threadly_core::{BrandId, CategoryId, ProductId, ProductSizeId};

/// A product category.
#[derive(Debug, Clone)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    /// Category-wide offer percent.
    pub offer_percent: i32,
}

/// A product brand.
#[derive(Debug, Clone)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
}

/// Stock for one size of a product.
#[derive(Debug, Clone)]
pub struct ProductSize {
    pub id: ProductSizeId,
    pub size: String,
    pub stock: i32,
}

impl ProductSize {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// A listed product with its sizes.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub brand_id: BrandId,
    pub brand_name: String,
    pub price: Decimal,
    pub offer_percent: i32,
    pub category_offer_percent: i32,
    pub images: Vec<String>,
    pub sizes: Vec<ProductSize>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Price after the best product or category offer.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        effective_unit_price(self.price, self.offer_percent, self.category_offer_percent)
    }

    /// The offer percent actually applied.
    #[must_use]
    pub fn best_offer(&self) -> i32 {
        self.offer_percent.max(self.category_offer_percent)
    }

    #[must_use]
    pub fn total_stock(&self) -> i32 {
        self.sizes.iter().map(|s| s.stock).sum()
    }
}

/// A product as shown in listings.
#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: ProductId,
    pub name: String,
    pub brand_name: String,
    pub price: Decimal,
    pub effective_price: Decimal,
    pub best_offer: i32,
    pub image: Option<String>,
    pub in_stock: bool,
}
