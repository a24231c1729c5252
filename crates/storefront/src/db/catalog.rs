//! Catalog queries for the storefront.
//!
//! Only listed products whose category and brand are also listed are ever
//! shown to customers. Offer prices are computed in SQL with the same
//! rounding as `threadly_core::pricing::effective_unit_price` so that price
//! filters and sorting agree with what the product card displays.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use threadly_core::{BrandId, CategoryId, ProductId, ProductSizeId};

use super::RepositoryError;
use crate::models::{Brand, Category, Product, ProductCard, ProductSize};

/// Products per listing page.
pub const PAGE_SIZE: i64 = 12;

const LISTED_PRODUCTS: &str = r"
    SELECT p.id, p.name, b.name AS brand_name, p.price,
           p.offer_percent, c.offer_percent AS category_offer_percent,
           p.images[1] AS image, p.created_at, p.category_id,
           ROUND(p.price * (100 - GREATEST(p.offer_percent, c.offer_percent)) / 100.0, 2)
               AS effective_price,
           COALESCE((SELECT SUM(s.stock) FROM storefront.product_size s WHERE s.product_id = p.id), 0) > 0
               AS in_stock
    FROM storefront.product p
    JOIN storefront.category c ON c.id = p.category_id
    JOIN storefront.brand b ON b.id = p.brand_id
    WHERE p.is_listed AND c.is_listed AND b.is_listed
";

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, id DESC",
            Self::PriceAsc => "effective_price ASC, id",
            Self::PriceDesc => "effective_price DESC, id",
            Self::NameAsc => "LOWER(name) ASC, id",
            Self::NameDesc => "LOWER(name) DESC, id",
        }
    }

    /// Form value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::NameAsc => "name_asc",
            Self::NameDesc => "name_desc",
        }
    }
}

/// Filters for the shop listing.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    pub brand: Option<BrandId>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: ProductSort,
    /// 1-based page number.
    pub page: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductCardRow {
    id: i32,
    name: String,
    brand_name: String,
    price: Decimal,
    effective_price: Decimal,
    offer_percent: i32,
    category_offer_percent: i32,
    image: Option<String>,
    in_stock: bool,
}

impl From<ProductCardRow> for ProductCard {
    fn from(row: ProductCardRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            brand_name: row.brand_name,
            price: row.price,
            effective_price: row.effective_price,
            best_offer: row.offer_percent.max(row.category_offer_percent),
            image: row.image,
            in_stock: row.in_stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PagedCardRow {
    #[sqlx(flatten)]
    card: ProductCardRow,
    total_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    category_id: i32,
    category_name: String,
    brand_id: i32,
    brand_name: String,
    price: Decimal,
    offer_percent: i32,
    category_offer_percent: i32,
    images: Vec<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SizeRow {
    id: i32,
    size: String,
    stock: i32,
}

impl From<SizeRow> for ProductSize {
    fn from(row: SizeRow) -> Self {
        Self {
            id: ProductSizeId::new(row.id),
            size: row.size,
            stock: row.stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    description: String,
    offer_percent: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct BrandRow {
    id: i32,
    name: String,
}

/// Repository for catalog queries.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Listed categories, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT id, name, description, offer_percent
            FROM storefront.category
            WHERE is_listed
            ORDER BY name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Category {
                id: CategoryId::new(r.id),
                name: r.name,
                description: r.description,
                offer_percent: r.offer_percent,
            })
            .collect())
    }

    /// Listed brands, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_brands(&self) -> Result<Vec<Brand>, RepositoryError> {
        let rows = sqlx::query_as::<_, BrandRow>(
            "SELECT id, name FROM storefront.brand WHERE is_listed ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Brand {
                id: BrandId::new(r.id),
                name: r.name,
            })
            .collect())
    }

    /// One page of the shop listing and the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<(Vec<ProductCard>, i64), RepositoryError> {
        let (_, offset) = threadly_core::page_offset(Some(filter.page), PAGE_SIZE);
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let sql = format!(
            r"
            WITH listed AS ({LISTED_PRODUCTS}
                AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%' OR p.description ILIKE '%' || $1 || '%')
                AND ($2::int IS NULL OR p.category_id = $2)
                AND ($3::int IS NULL OR p.brand_id = $3)
            )
            SELECT *, COUNT(*) OVER () AS total_count
            FROM listed
            WHERE ($4::numeric IS NULL OR effective_price >= $4)
              AND ($5::numeric IS NULL OR effective_price <= $5)
            ORDER BY {}
            LIMIT $6 OFFSET $7
            ",
            filter.sort.order_by()
        );

        let rows = sqlx::query_as::<_, PagedCardRow>(&sql)
            .bind(search)
            .bind(filter.category)
            .bind(filter.brand)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(PAGE_SIZE)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        let total = rows.first().map_or(0, |r| r.total_count);
        Ok((rows.into_iter().map(|r| r.card.into()).collect(), total))
    }

    /// Newest listed products, for the home page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn newest(&self, limit: i64) -> Result<Vec<ProductCard>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductCardRow>(&format!(
            "{LISTED_PRODUCTS} ORDER BY p.created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Other listed products from the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(
        &self,
        product: &Product,
        limit: i64,
    ) -> Result<Vec<ProductCard>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductCardRow>(&format!(
            "{LISTED_PRODUCTS} AND p.category_id = $1 AND p.id <> $2 ORDER BY p.created_at DESC LIMIT $3"
        ))
        .bind(product.category_id)
        .bind(product.id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// A listed product with its sizes.
    ///
    /// Returns `None` for unknown or unlisted products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.description,
                   p.category_id, c.name AS category_name,
                   p.brand_id, b.name AS brand_name,
                   p.price, p.offer_percent, c.offer_percent AS category_offer_percent,
                   p.images, p.created_at
            FROM storefront.product p
            JOIN storefront.category c ON c.id = p.category_id
            JOIN storefront.brand b ON b.id = p.brand_id
            WHERE p.id = $1 AND p.is_listed AND c.is_listed AND b.is_listed
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sizes = self.sizes(id).await?;

        Ok(Some(Product {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            category_id: CategoryId::new(row.category_id),
            category_name: row.category_name,
            brand_id: BrandId::new(row.brand_id),
            brand_name: row.brand_name,
            price: row.price,
            offer_percent: row.offer_percent,
            category_offer_percent: row.category_offer_percent,
            images: row.images,
            sizes,
            created_at: row.created_at,
        }))
    }

    /// Sizes of a product in wearing order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sizes(&self, id: ProductId) -> Result<Vec<ProductSize>, RepositoryError> {
        let rows = sqlx::query_as::<_, SizeRow>(
            r"
            SELECT id, size, stock
            FROM storefront.product_size
            WHERE product_id = $1
            ORDER BY COALESCE(array_position(ARRAY['XS','S','M','L','XL','XXL','3XL'], size), 100), size
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
