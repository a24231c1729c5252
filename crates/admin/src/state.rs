//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AdminConfig;
use crate::services::{CloudinaryClient, MediaError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    media: Option<CloudinaryClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Cloudinary HTTP client cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, MediaError> {
        let media = config
            .cloudinary
            .as_ref()
            .map(CloudinaryClient::new)
            .transpose()?;

        if media.is_none() {
            tracing::warn!("Cloudinary is not configured; product image uploads are disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                media,
            }),
        })
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Image upload client, when configured.
    #[must_use]
    pub fn media(&self) -> Option<&CloudinaryClient> {
        self.inner.media.as_ref()
    }
}
