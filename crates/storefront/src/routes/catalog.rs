//! Shop listing and product detail handlers.

use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use threadly_core::{BrandId, CategoryId, ProductId};

use crate::db::catalog::PAGE_SIZE;
use crate::db::{CatalogRepository, ProductFilter, ProductSort};
use crate::error::AppError;
use crate::filters;
use crate::middleware::CspNonce;
use crate::models::{Brand, Category, Product, ProductCard};
use crate::state::AppState;

/// Related products shown under a product.
const RELATED_LIMIT: i64 = 4;

/// Query string of the shop page.
///
/// Empty form fields arrive as empty strings, so numeric filters are parsed
/// leniently instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ShopQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<i64>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl ShopQuery {
    /// Turn the query into a repository filter. Unparseable values are ignored.
    #[must_use]
    pub fn to_filter(&self) -> ProductFilter {
        let price = |v: Option<&String>| {
            non_empty(v.map(String::as_str))
                .and_then(|s| s.parse::<Decimal>().ok())
                .filter(|d| *d >= Decimal::ZERO)
        };
        let id = |v: Option<&String>| {
            non_empty(v.map(String::as_str)).and_then(|s| s.parse::<i32>().ok())
        };

        ProductFilter {
            search: non_empty(self.q.as_deref()).map(str::to_string),
            category: id(self.category.as_ref()).map(CategoryId::new),
            brand: id(self.brand.as_ref()).map(BrandId::new),
            min_price: price(self.min_price.as_ref()),
            max_price: price(self.max_price.as_ref()),
            sort: self.sort,
            page: threadly_core::page_offset(self.page, PAGE_SIZE).0,
        }
    }
}

/// Pagination links for the shop page.
#[derive(Debug, Clone)]
pub struct Pager {
    pub page: i64,
    pub total_pages: i64,
    /// Query string without `page`, for building links.
    pub base_query: String,
}

impl Pager {
    #[must_use]
    pub fn new(filter: &ProductFilter, total: i64) -> Self {
        let total_pages = threadly_core::total_pages(total, PAGE_SIZE);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = &filter.search {
            params.push(("q", q.clone()));
        }
        if let Some(c) = filter.category {
            params.push(("category", c.to_string()));
        }
        if let Some(b) = filter.brand {
            params.push(("brand", b.to_string()));
        }
        if let Some(p) = filter.min_price {
            params.push(("min_price", p.to_string()));
        }
        if let Some(p) = filter.max_price {
            params.push(("max_price", p.to_string()));
        }
        params.push(("sort", filter.sort.as_str().to_string()));

        let base_query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        Self {
            page: filter.page,
            total_pages,
            base_query,
        }
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Shop listing template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/index.html")]
pub struct ShopTemplate {
    pub products: Vec<ProductCard>,
    pub categories: Arc<Vec<Category>>,
    pub brands: Arc<Vec<Brand>>,
    pub filter: ProductFilter,
    pub total: i64,
    pub pager: Pager,
    pub nonce: String,
}

impl ShopTemplate {
    fn selected_category(&self, id: &CategoryId) -> bool {
        self.filter.category == Some(*id)
    }

    fn selected_brand(&self, id: &BrandId) -> bool {
        self.filter.brand == Some(*id)
    }

    fn sort_options(&self) -> [(&'static str, &'static str, bool); 5] {
        [
            ProductSort::Newest,
            ProductSort::PriceAsc,
            ProductSort::PriceDesc,
            ProductSort::NameAsc,
            ProductSort::NameDesc,
        ]
        .map(|s| (s.as_str(), sort_label(s), s == self.filter.sort))
    }
}

const fn sort_label(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Newest => "Newest",
        ProductSort::PriceAsc => "Price: low to high",
        ProductSort::PriceDesc => "Price: high to low",
        ProductSort::NameAsc => "Name: A to Z",
        ProductSort::NameDesc => "Name: Z to A",
    }
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: Product,
    pub related: Vec<ProductCard>,
    pub nonce: String,
}

/// Product not found template.
#[derive(Template, WebTemplate)]
#[template(path = "products/not_found.html")]
pub struct ProductNotFoundTemplate {
    pub nonce: String,
}

/// Display the shop listing.
#[instrument(skip(state, nonce))]
pub async fn shop(
    State(state): State<AppState>,
    CspNonce(nonce): CspNonce,
    Query(query): Query<ShopQuery>,
) -> Result<ShopTemplate, AppError> {
    let filter = query.to_filter();
    let (products, total) = CatalogRepository::new(state.pool())
        .list_products(&filter)
        .await?;
    let categories = state.catalog_cache().categories(state.pool()).await?;
    let brands = state.catalog_cache().brands(state.pool()).await?;
    let pager = Pager::new(&filter, total);

    Ok(ShopTemplate {
        products,
        categories,
        brands,
        filter,
        total,
        pager,
        nonce,
    })
}

/// Display a product. Unlisted or unknown products render the 404 page.
#[instrument(skip(state, nonce))]
pub async fn product(
    State(state): State<AppState>,
    CspNonce(nonce): CspNonce,
    Path(id): Path<i32>,
) -> Result<Response, AppError> {
    let catalog = CatalogRepository::new(state.pool());

    let Some(product) = catalog.get_product(ProductId::new(id)).await? else {
        tracing::debug!(product_id = id, "Product not found or unlisted");
        return Ok((StatusCode::NOT_FOUND, ProductNotFoundTemplate { nonce }).into_response());
    };

    let related = catalog.related(&product, RELATED_LIMIT).await?;

    Ok(ProductShowTemplate {
        product,
        related,
        nonce,
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_query_ignores_blank_and_invalid_values() {
        let query = ShopQuery {
            q: Some("  ".to_string()),
            category: Some(String::new()),
            brand: Some("abc".to_string()),
            min_price: Some("-5".to_string()),
            max_price: Some("1500".to_string()),
            sort: ProductSort::PriceAsc,
            page: Some(0),
        };
        let filter = query.to_filter();
        assert!(filter.search.is_none());
        assert!(filter.category.is_none());
        assert!(filter.brand.is_none());
        assert!(filter.min_price.is_none());
        assert_eq!(filter.max_price, Some(Decimal::from(1500)));
        assert_eq!(filter.page, 1);
    }

    #[test]
    fn test_pager_keeps_filters_in_links() {
        let filter = ProductFilter {
            search: Some("linen shirt".to_string()),
            category: Some(CategoryId::new(3)),
            page: 2,
            ..ProductFilter::default()
        };
        let pager = Pager::new(&filter, 25);
        assert_eq!(pager.total_pages, 3);
        assert!(pager.has_prev());
        assert!(pager.has_next());
        assert_eq!(pager.base_query, "q=linen%20shirt&category=3&sort=newest");
    }

    #[test]
    fn test_shop_page_marks_selected_filters() {
        let filter = ProductFilter {
            category: Some(CategoryId::new(3)),
            brand: Some(BrandId::new(7)),
            ..ProductFilter::default()
        };
        let category = |id, name: &str| Category {
            id: CategoryId::new(id),
            name: name.to_string(),
            description: String::new(),
            offer_percent: 0,
        };
        let brand = |id, name: &str| Brand {
            id: BrandId::new(id),
            name: name.to_string(),
        };
        let page = ShopTemplate {
            products: Vec::new(),
            categories: Arc::new(vec![category(2, "Shirts"), category(3, "Kurtas")]),
            brands: Arc::new(vec![brand(7, "Fabindia"), brand(8, "Biba")]),
            pager: Pager::new(&filter, 0),
            filter,
            total: 0,
            nonce: "n".to_string(),
        };

        let html = page.render().unwrap();
        assert!(html.contains(r#"<option value="3" selected>Kurtas</option>"#));
        assert!(html.contains(r#"<option value="2">Shirts</option>"#));
        assert!(html.contains(r#"<option value="7" selected>Fabindia</option>"#));
        assert!(html.contains(r#"<option value="8">Biba</option>"#));
    }

    #[test]
    fn test_pager_single_page_when_empty() {
        let pager = Pager::new(&ProductFilter::default(), 0);
        assert_eq!(pager.total_pages, 1);
        assert!(!pager.has_next());
    }
}
