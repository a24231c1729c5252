//! In-process cache for the category and brand lists.
//!
//! Both lists appear on every shop page and change rarely. Entries live for
//! five minutes; admin edits show up on the storefront within that window.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use crate::db::{CatalogRepository, RepositoryError};
use crate::models::{Brand, Category};

const TTL: Duration = Duration::from_secs(300);

/// Cache key for catalog lists.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Brands,
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Brands(Arc<Vec<Brand>>),
}

/// Cached listed categories and brands.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().max_capacity(8).time_to_live(TTL).build(),
        }
    }

    /// Listed categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a cache miss fails to load.
    pub async fn categories(&self, pool: &PgPool) -> Result<Arc<Vec<Category>>, RepositoryError> {
        if let Some(CacheValue::Categories(list)) = self.cache.get(&CacheKey::Categories).await {
            debug!("Cache hit for categories");
            return Ok(list);
        }

        let list = Arc::new(CatalogRepository::new(pool).list_categories().await?);
        self.cache
            .insert(CacheKey::Categories, CacheValue::Categories(Arc::clone(&list)))
            .await;
        Ok(list)
    }

    /// Listed brands.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a cache miss fails to load.
    pub async fn brands(&self, pool: &PgPool) -> Result<Arc<Vec<Brand>>, RepositoryError> {
        if let Some(CacheValue::Brands(list)) = self.cache.get(&CacheKey::Brands).await {
            debug!("Cache hit for brands");
            return Ok(list);
        }

        let list = Arc::new(CatalogRepository::new(pool).list_brands().await?);
        self.cache
            .insert(CacheKey::Brands, CacheValue::Brands(Arc::clone(&list)))
            .await;
        Ok(list)
    }
}
