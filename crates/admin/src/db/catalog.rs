//! Category, brand and product storage.
//!
//! Nothing here deletes catalog rows. Order items reference products and
//! sizes, so the admin lists and unlists instead.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use threadly_core::{BrandId, CategoryId, ProductId, ProductSizeId};

use super::{RepositoryError, like_pattern};
use crate::models::{Brand, Category, ProductDetail, ProductListItem, SizeStock};

/// Validated category fields.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub description: String,
    pub offer_percent: i32,
}

/// Validated product fields.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub category_id: CategoryId,
    pub brand_id: BrandId,
    pub price: Decimal,
    pub offer_percent: i32,
    /// Size label and stock, in display order.
    pub sizes: Vec<(String, i32)>,
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    description: String,
    offer_percent: i32,
    is_listed: bool,
    product_count: i64,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            offer_percent: r.offer_percent,
            is_listed: r.is_listed,
            product_count: r.product_count,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BrandRow {
    id: BrandId,
    name: String,
    is_listed: bool,
    product_count: i64,
    created_at: DateTime<Utc>,
}

impl From<BrandRow> for Brand {
    fn from(r: BrandRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            is_listed: r.is_listed,
            product_count: r.product_count,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductListRow {
    id: ProductId,
    name: String,
    category_name: String,
    brand_name: String,
    price: Decimal,
    offer_percent: i32,
    category_offer_percent: i32,
    total_stock: i64,
    thumbnail: Option<String>,
    is_listed: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductListRow> for ProductListItem {
    fn from(r: ProductListRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            category_name: r.category_name,
            brand_name: r.brand_name,
            price: r.price,
            offer_percent: r.offer_percent,
            category_offer_percent: r.category_offer_percent,
            total_stock: r.total_stock,
            thumbnail: r.thumbnail,
            is_listed: r.is_listed,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    category_id: CategoryId,
    brand_id: BrandId,
    price: Decimal,
    offer_percent: i32,
    images: Vec<String>,
    is_listed: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct SizeRow {
    id: ProductSizeId,
    size: String,
    stock: i32,
}

// =============================================================================
// Categories
// =============================================================================

/// Repository for categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories, alphabetically, with product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT c.id, c.name, c.description, c.offer_percent, c.is_listed,
                   (SELECT COUNT(*) FROM storefront.product p WHERE p.category_id = c.id) AS product_count,
                   c.created_at
            FROM storefront.category c
            ORDER BY LOWER(c.name)
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            SELECT c.id, c.name, c.description, c.offer_percent, c.is_listed,
                   (SELECT COUNT(*) FROM storefront.product p WHERE p.category_id = c.id) AS product_count,
                   c.created_at
            FROM storefront.category c
            WHERE c.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken (any case).
    pub async fn create(&self, input: &CategoryInput) -> Result<CategoryId, RepositoryError> {
        sqlx::query_scalar(
            r"
            INSERT INTO storefront.category (name, description, offer_percent)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.offer_percent)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "a category with this name"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    /// Returns `RepositoryError::Conflict` if the name is taken (any case).
    pub async fn update(&self, id: CategoryId, input: &CategoryInput) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.category
            SET name = $2, description = $3, offer_percent = $4, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.offer_percent)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "a category with this name"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Flip the listed flag. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn toggle_listed(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        sqlx::query_scalar(
            r"
            UPDATE storefront.category
            SET is_listed = NOT is_listed, updated_at = NOW()
            WHERE id = $1
            RETURNING is_listed
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}

// =============================================================================
// Brands
// =============================================================================

/// Repository for brands.
pub struct BrandRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BrandRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All brands, alphabetically, with product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Brand>, RepositoryError> {
        let rows = sqlx::query_as::<_, BrandRow>(
            r"
            SELECT b.id, b.name, b.is_listed,
                   (SELECT COUNT(*) FROM storefront.product p WHERE p.brand_id = b.id) AS product_count,
                   b.created_at
            FROM storefront.brand b
            ORDER BY LOWER(b.name)
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: BrandId) -> Result<Option<Brand>, RepositoryError> {
        let row = sqlx::query_as::<_, BrandRow>(
            r"
            SELECT b.id, b.name, b.is_listed,
                   (SELECT COUNT(*) FROM storefront.product p WHERE p.brand_id = b.id) AS product_count,
                   b.created_at
            FROM storefront.brand b
            WHERE b.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken (any case).
    pub async fn create(&self, name: &str) -> Result<BrandId, RepositoryError> {
        sqlx::query_scalar("INSERT INTO storefront.brand (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "a brand with this name"))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the brand does not exist.
    /// Returns `RepositoryError::Conflict` if the name is taken (any case).
    pub async fn update(&self, id: BrandId, name: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE storefront.brand SET name = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "a brand with this name"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Flip the listed flag. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the brand does not exist.
    pub async fn toggle_listed(&self, id: BrandId) -> Result<bool, RepositoryError> {
        sqlx::query_scalar(
            r"
            UPDATE storefront.brand
            SET is_listed = NOT is_listed, updated_at = NOW()
            WHERE id = $1
            RETURNING is_listed
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }
}

// =============================================================================
// Products
// =============================================================================

/// Repository for products and their sizes.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A page of products, newest first, optionally filtered by name,
    /// category or brand, and the total count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<ProductListItem>, i64), RepositoryError> {
        let pattern = search
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        let rows = sqlx::query_as::<_, ProductListRow>(
            r"
            SELECT p.id, p.name, c.name AS category_name, b.name AS brand_name,
                   p.price, p.offer_percent, c.offer_percent AS category_offer_percent,
                   COALESCE((SELECT SUM(s.stock) FROM storefront.product_size s
                             WHERE s.product_id = p.id), 0)::BIGINT AS total_stock,
                   p.images[1] AS thumbnail,
                   p.is_listed, p.created_at
            FROM storefront.product p
            JOIN storefront.category c ON c.id = p.category_id
            JOIN storefront.brand b ON b.id = p.brand_id
            WHERE $1::TEXT IS NULL OR p.name ILIKE $1 OR c.name ILIKE $1 OR b.name ILIKE $1
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM storefront.product p
            JOIN storefront.category c ON c.id = p.category_id
            JOIN storefront.brand b ON b.id = p.brand_id
            WHERE $1::TEXT IS NULL OR p.name ILIKE $1 OR c.name ILIKE $1 OR b.name ILIKE $1
            ",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// A product with its sizes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<ProductDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, category_id, brand_id, price, offer_percent,
                   images, is_listed
            FROM storefront.product
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sizes = sqlx::query_as::<_, SizeRow>(
            "SELECT id, size, stock FROM storefront.product_size WHERE product_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(ProductDetail {
            id: row.id,
            name: row.name,
            description: row.description,
            category_id: row.category_id,
            brand_id: row.brand_id,
            price: row.price,
            offer_percent: row.offer_percent,
            images: row.images,
            sizes: sizes
                .into_iter()
                .map(|s| SizeStock {
                    id: Some(s.id),
                    size: s.size,
                    stock: s.stock,
                })
                .collect(),
            is_listed: row.is_listed,
        }))
    }

    /// Insert a product and its sizes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create(
        &self,
        input: &ProductInput,
        images: &[String],
    ) -> Result<ProductId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO storefront.product
                (name, description, category_id, brand_id, price, offer_percent, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.category_id)
        .bind(input.brand_id)
        .bind(input.price)
        .bind(input.offer_percent)
        .bind(images)
        .fetch_one(&mut *tx)
        .await?;

        upsert_sizes(&mut tx, id, &input.sizes).await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Update a product, append `new_images` and set size stock.
    ///
    /// Sizes missing from the input are kept with zero stock, since past
    /// orders still point at them.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        new_images: &[String],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE storefront.product
            SET name = $2, description = $3, category_id = $4, brand_id = $5,
                price = $6, offer_percent = $7, images = images || $8, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.category_id)
        .bind(input.brand_id)
        .bind(input.price)
        .bind(input.offer_percent)
        .bind(new_images)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let kept: Vec<String> = input.sizes.iter().map(|(size, _)| size.clone()).collect();
        sqlx::query(
            r"
            UPDATE storefront.product_size
            SET stock = 0
            WHERE product_id = $1 AND NOT (size = ANY($2))
            ",
        )
        .bind(id)
        .bind(&kept)
        .execute(&mut *tx)
        .await?;

        upsert_sizes(&mut tx, id, &input.sizes).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Flip the listed flag. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn toggle_listed(&self, id: ProductId) -> Result<bool, RepositoryError> {
        sqlx::query_scalar(
            r"
            UPDATE storefront.product
            SET is_listed = NOT is_listed, updated_at = NOW()
            WHERE id = $1
            RETURNING is_listed
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Remove one image. Returns `false` if it is the product's last image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_image(&self, id: ProductId, url: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.product
            SET images = array_remove(images, $2), updated_at = NOW()
            WHERE id = $1 AND $2 = ANY(images) AND cardinality(images) > 1
            ",
        )
        .bind(id)
        .bind(url)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

async fn upsert_sizes(
    tx: &mut sqlx::PgConnection,
    product_id: ProductId,
    sizes: &[(String, i32)],
) -> Result<(), RepositoryError> {
    for (size, stock) in sizes {
        sqlx::query(
            r"
            INSERT INTO storefront.product_size (product_id, size, stock)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, size) DO UPDATE SET stock = EXCLUDED.stock
            ",
        )
        .bind(product_id)
        .bind(size)
        .bind(stock)
        .execute(&mut *tx)
        .await?;
    }
    Ok(())
}
