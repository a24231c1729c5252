//! Seed the catalog from a YAML file.
//!
//! Categories and brands are matched by name, case-insensitively, and
//! products by name; anything already present is left alone, so the same
//! file can be loaded more than once.
//!
//! ```yaml
//! categories:
//!   - name: Kurtas
//!     description: Cotton and linen kurtas
//!     offer_percent: 10
//! brands:
//!   - name: Loomcraft
//! products:
//!   - name: Indigo block-print kurta
//!     category: Kurtas
//!     brand: Loomcraft
//!     price: "1499.00"
//!     offer_percent: 0
//!     images:
//!       - https://res.cloudinary.com/demo/image/upload/kurta.jpg
//!     sizes:
//!       - { size: M, stock: 12 }
//!       - { size: L, stock: 8 }
//! ```

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use threadly_admin::db::catalog::{CategoryInput, ProductInput};
use threadly_admin::db::{self, BrandRepository, CategoryRepository, ProductRepository};
use threadly_admin::routes::categories::{CategoryForm, validate_name};
use threadly_admin::routes::products::ProductFields;
use threadly_core::{BrandId, CategoryId};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid catalog file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{kind} {name:?}: {code}")]
    Invalid {
        kind: &'static str,
        name: String,
        code: &'static str,
    },

    #[error("Product {product:?} refers to unknown {kind} {name:?}")]
    UnknownReference {
        product: String,
        kind: &'static str,
        name: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] db::RepositoryError),
}

/// A catalog file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogFile {
    pub categories: Vec<SeedCategory>,
    pub brands: Vec<SeedBrand>,
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub offer_percent: i32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedBrand {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub brand: String,
    /// Rupees, quoted so it is read as an exact decimal.
    pub price: String,
    #[serde(default)]
    pub offer_percent: i32,
    pub images: Vec<String>,
    pub sizes: Vec<SeedSize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedSize {
    pub size: String,
    pub stock: i32,
}

impl SeedCategory {
    /// Validate with the same rules as the admin category form.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Invalid` with the failing rule.
    pub fn input(&self) -> Result<CategoryInput, SeedError> {
        CategoryForm {
            name: self.name.clone(),
            description: self.description.clone(),
            offer_percent: self.offer_percent.to_string(),
        }
        .validate()
        .map_err(|code| SeedError::Invalid {
            kind: "category",
            name: self.name.clone(),
            code,
        })
    }
}

impl SeedProduct {
    /// Validate with the same rules as the admin product form, using
    /// already resolved category and brand ids.
    ///
    /// # Errors
    ///
    /// Returns `SeedError::Invalid` with the failing rule.
    pub fn input(
        &self,
        category_id: CategoryId,
        brand_id: BrandId,
    ) -> Result<ProductInput, SeedError> {
        let invalid = |code| SeedError::Invalid {
            kind: "product",
            name: self.name.clone(),
            code,
        };

        if self.images.is_empty() {
            return Err(invalid("image_required"));
        }
        if !self.images.iter().all(|url| url.starts_with("https://")) {
            return Err(invalid("image_invalid"));
        }

        ProductFields {
            name: self.name.clone(),
            description: self.description.clone(),
            category_id: category_id.to_string(),
            brand_id: brand_id.to_string(),
            price: self.price.clone(),
            offer_percent: self.offer_percent.to_string(),
            sizes: self.sizes.iter().map(|s| s.size.clone()).collect(),
            stocks: self.sizes.iter().map(|s| s.stock.to_string()).collect(),
            images: Vec::new(),
        }
        .validate()
        .map_err(invalid)
    }
}

/// What a seed run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Load `file_path` into the storefront catalog.
///
/// Every entry is validated before the database is touched.
///
/// # Errors
///
/// Returns `SeedError` for an unreadable or invalid file, a product naming a
/// category or brand that neither the file nor the database has, or a
/// database failure.
pub async fn catalog(file_path: &str) -> Result<(), SeedError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("ADMIN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| SeedError::MissingEnvVar("ADMIN_DATABASE_URL"))?;

    info!(path = %file_path, "Loading catalog file");
    let content = tokio::fs::read_to_string(Path::new(file_path))
        .await
        .map_err(|source| SeedError::Io {
            path: file_path.to_string(),
            source,
        })?;
    let file: CatalogFile = serde_yaml::from_str(&content)?;

    let categories = file
        .categories
        .iter()
        .map(SeedCategory::input)
        .collect::<Result<Vec<_>, _>>()?;
    for brand in &file.brands {
        validate_name(&brand.name).map_err(|code| SeedError::Invalid {
            kind: "brand",
            name: brand.name.clone(),
            code,
        })?;
    }

    info!(
        categories = file.categories.len(),
        brands = file.brands.len(),
        products = file.products.len(),
        "Catalog file validated"
    );

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    let mut summary = SeedSummary::default();

    for input in &categories {
        if category_id(&pool, &input.name).await?.is_some() {
            summary.skipped += 1;
            continue;
        }
        let id = CategoryRepository::new(&pool).create(input).await?;
        info!(category_id = %id, name = %input.name, "Category inserted");
        summary.inserted += 1;
    }

    for brand in &file.brands {
        let name = brand.name.trim();
        if brand_id(&pool, name).await?.is_some() {
            summary.skipped += 1;
            continue;
        }
        let id = BrandRepository::new(&pool).create(name).await?;
        info!(brand_id = %id, name, "Brand inserted");
        summary.inserted += 1;
    }

    for product in &file.products {
        if product_exists(&pool, product.name.trim()).await? {
            summary.skipped += 1;
            continue;
        }
        let category = category_id(&pool, product.category.trim())
            .await?
            .ok_or_else(|| SeedError::UnknownReference {
                product: product.name.clone(),
                kind: "category",
                name: product.category.clone(),
            })?;
        let brand = brand_id(&pool, product.brand.trim())
            .await?
            .ok_or_else(|| SeedError::UnknownReference {
                product: product.name.clone(),
                kind: "brand",
                name: product.brand.clone(),
            })?;

        let input = product.input(category, brand)?;
        let id = ProductRepository::new(&pool)
            .create(&input, &product.images)
            .await?;
        info!(product_id = %id, name = %input.name, "Product inserted");
        summary.inserted += 1;
    }

    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        "Seeding complete"
    );
    Ok(())
}

async fn category_id(pool: &PgPool, name: &str) -> Result<Option<CategoryId>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM storefront.category WHERE LOWER(name) = LOWER($1)")
        .bind(name)
        .fetch_optional(pool)
        .await
}

async fn brand_id(pool: &PgPool, name: &str) -> Result<Option<BrandId>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM storefront.brand WHERE LOWER(name) = LOWER($1)")
        .bind(name)
        .fetch_optional(pool)
        .await
}

async fn product_exists(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM storefront.product WHERE LOWER(name) = LOWER($1))",
    )
    .bind(name)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    const SAMPLE: &str = r#"
categories:
  - name: Kurtas
    description: Cotton and linen kurtas
    offer_percent: 10
brands:
  - name: Loomcraft
products:
  - name: Indigo block-print kurta
    category: Kurtas
    brand: Loomcraft
    price: "1499.00"
    images:
      - https://res.cloudinary.com/demo/image/upload/kurta.jpg
    sizes:
      - { size: m, stock: 12 }
      - { size: L, stock: 8 }
"#;

    #[test]
    fn test_parse_catalog_file() {
        let file: CatalogFile = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(file.categories.len(), 1);
        assert_eq!(file.brands[0].name, "Loomcraft");
        assert_eq!(file.products[0].offer_percent, 0);
        assert_eq!(file.categories[0].input().unwrap().offer_percent, 10);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let yaml = "brands:\n  - name: A\n    logo: x\n";
        assert!(serde_yaml::from_str::<CatalogFile>(yaml).is_err());
    }

    #[test]
    fn test_product_input_uses_form_rules() {
        let file: CatalogFile = serde_yaml::from_str(SAMPLE).unwrap();
        let input = file.products[0]
            .input(CategoryId::new(1), BrandId::new(2))
            .unwrap();
        assert_eq!(input.price, Decimal::new(149_900, 2));
        assert_eq!(input.sizes, vec![("M".to_string(), 12), ("L".to_string(), 8)]);
        assert_eq!(input.category_id, CategoryId::new(1));
    }

    #[test]
    fn test_product_without_images_is_invalid() {
        let mut file: CatalogFile = serde_yaml::from_str(SAMPLE).unwrap();
        file.products[0].images.clear();
        let err = file.products[0]
            .input(CategoryId::new(1), BrandId::new(2))
            .unwrap_err();
        assert!(matches!(err, SeedError::Invalid { code: "image_required", .. }));
    }

    #[test]
    fn test_excessive_offer_is_invalid() {
        let mut file: CatalogFile = serde_yaml::from_str(SAMPLE).unwrap();
        file.categories[0].offer_percent = 95;
        assert!(matches!(
            file.categories[0].input(),
            Err(SeedError::Invalid { code: "invalid_offer", .. })
        ));
    }
}
