//! Catalog types as the admin sees them, listed or not.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use threadly_core::pricing::effective_unit_price;
use threadly_core::{BrandId, CategoryId, ProductId, ProductSizeId};

/// A category with its product count.
#[derive(Debug, Clone)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub offer_percent: i32,
    pub is_listed: bool,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A brand with its product count.
#[derive(Debug, Clone)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    pub is_listed: bool,
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Stock held for one size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeStock {
    pub id: Option<ProductSizeId>,
    pub size: String,
    pub stock: i32,
}

/// A product row in the admin listing.
#[derive(Debug, Clone)]
pub struct ProductListItem {
    pub id: ProductId,
    pub name: String,
    pub category_name: String,
    pub brand_name: String,
    pub price: Decimal,
    pub offer_percent: i32,
    pub category_offer_percent: i32,
    pub total_stock: i64,
    pub thumbnail: Option<String>,
    pub is_listed: bool,
    pub created_at: DateTime<Utc>,
}

impl ProductListItem {
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        effective_unit_price(self.price, self.offer_percent, self.category_offer_percent)
    }
}

/// Everything the product form edits.
#[derive(Debug, Clone)]
pub struct ProductDetail {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category_id: CategoryId,
    pub brand_id: BrandId,
    pub price: Decimal,
    pub offer_percent: i32,
    pub images: Vec<String>,
    pub sizes: Vec<SizeStock>,
    pub is_listed: bool,
}
