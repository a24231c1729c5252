//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use std::sync::Arc;
use tracing::instrument;

use crate::db::CatalogRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::{Category, ProductCard};
use crate::state::AppState;

/// Products shown in the "New arrivals" strip.
const NEW_ARRIVALS: i64 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub categories: Arc<Vec<Category>>,
    pub new_arrivals: Vec<ProductCard>,
    pub nonce: String,
}

/// Display the home page.
#[instrument(skip(state, nonce))]
pub async fn home(
    State(state): State<AppState>,
    CspNonce(nonce): CspNonce,
) -> Result<HomeTemplate, AppError> {
    let categories = state.catalog_cache().categories(state.pool()).await?;
    let new_arrivals = CatalogRepository::new(state.pool())
        .newest(NEW_ARRIVALS)
        .await?;

    Ok(HomeTemplate {
        categories,
        new_arrivals,
        nonce,
    })
}
