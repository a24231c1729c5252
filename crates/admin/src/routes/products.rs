//! Product management.
//!
//! Create and edit arrive as `multipart/form-data`: text fields, repeated
//! `size`/`stock` pairs in display order, and any number of `images` files.
//! New images are uploaded to Cloudinary before the product is written.

use askama::Template;
use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    response::{Html, Redirect},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use threadly_core::{BrandId, CategoryId, ProductId, round_money};

use super::categories::{parse_offer, validate_name};
use super::{
    AdminUserView, Flash, FlashKind, ListQuery, MAX_IMAGES_PER_UPLOAD, MessageQuery, Pagination,
    redirect_flash, render,
};
use crate::db::catalog::ProductInput;
use crate::db::{BrandRepository, CategoryRepository, ProductRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireAdminWrite};
use crate::models::{Brand, Category, ProductDetail, ProductListItem, SizeStock};
use crate::services::media::check_image;
use crate::state::AppState;

/// Sizes offered on a new product form.
pub const DEFAULT_SIZES: [&str; 5] = ["S", "M", "L", "XL", "XXL"];

/// Longest size label.
const MAX_SIZE_LENGTH: usize = 10;

/// An uploaded file from the form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Raw product form fields, before validation.
#[derive(Debug, Clone, Default)]
pub struct ProductFields {
    pub name: String,
    pub description: String,
    pub category_id: String,
    pub brand_id: String,
    pub price: String,
    pub offer_percent: String,
    pub sizes: Vec<String>,
    pub stocks: Vec<String>,
    pub images: Vec<UploadedImage>,
}

impl ProductFields {
    /// Read every part of the multipart body.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the body is not valid multipart.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut fields = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid form: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == "images" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid upload: {e}")))?;
                // Browsers send an empty part when no file was chosen
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                fields.images.push(UploadedImage {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("invalid form: {e}")))?;
            match name.as_str() {
                "name" => fields.name = value,
                "description" => fields.description = value,
                "category_id" => fields.category_id = value,
                "brand_id" => fields.brand_id = value,
                "price" => fields.price = value,
                "offer_percent" => fields.offer_percent = value,
                "size" => fields.sizes.push(value),
                "stock" => fields.stocks.push(value),
                _ => {}
            }
        }

        Ok(fields)
    }

    /// Validate the text fields into repository input.
    ///
    /// # Errors
    ///
    /// Returns the flash code of the first invalid field.
    pub fn validate(&self) -> Result<ProductInput, &'static str> {
        let name = validate_name(&self.name)?;
        let category_id = self
            .category_id
            .trim()
            .parse::<i32>()
            .map(CategoryId::new)
            .map_err(|_| "invalid_category")?;
        let brand_id = self
            .brand_id
            .trim()
            .parse::<i32>()
            .map(BrandId::new)
            .map_err(|_| "invalid_brand")?;
        let price = self
            .price
            .trim()
            .parse::<Decimal>()
            .ok()
            .map(round_money)
            .filter(|p| *p > Decimal::ZERO)
            .ok_or("invalid_price")?;
        let offer_percent = parse_offer(&self.offer_percent)?;
        let sizes = validate_sizes(&self.sizes, &self.stocks)?;

        Ok(ProductInput {
            name,
            description: self.description.trim().to_string(),
            category_id,
            brand_id,
            price,
            offer_percent,
            sizes,
        })
    }

    /// Check every new image before anything is uploaded.
    ///
    /// # Errors
    ///
    /// Returns the flash code for the first refused file.
    pub fn check_images(&self) -> Result<(), &'static str> {
        if self.images.len() > MAX_IMAGES_PER_UPLOAD {
            return Err("too_many_images");
        }
        self.images
            .iter()
            .try_for_each(|image| check_image(&image.content_type, image.bytes.len()))
            .map_err(|_| "image_invalid")
    }
}

/// Pair size labels with stock counts. Rows with a blank label are
/// skipped; at least one size is required and labels must be unique.
///
/// # Errors
///
/// Returns `invalid_sizes`.
pub fn validate_sizes(
    sizes: &[String],
    stocks: &[String],
) -> Result<Vec<(String, i32)>, &'static str> {
    let mut out: Vec<(String, i32)> = Vec::new();

    for (index, size) in sizes.iter().enumerate() {
        let size = size.trim().to_uppercase();
        if size.is_empty() {
            continue;
        }
        if size.chars().count() > MAX_SIZE_LENGTH || out.iter().any(|(s, _)| *s == size) {
            return Err("invalid_sizes");
        }
        let stock = stocks
            .get(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map_or(Ok(0), str::parse::<i32>)
            .ok()
            .filter(|s| *s >= 0)
            .ok_or("invalid_sizes")?;
        out.push((size, stock));
    }

    if out.is_empty() {
        return Err("invalid_sizes");
    }
    Ok(out)
}

/// Remove-image form data.
#[derive(Debug, Deserialize)]
pub struct RemoveImageForm {
    pub url: String,
}

/// Product list template.
#[derive(Template)]
#[template(path = "products/index.html")]
pub struct ProductsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub products: Vec<ProductListItem>,
    pub search: String,
    pub pagination: Pagination,
    pub flash: Flash,
}

/// Product form template, for both create and edit.
#[derive(Template)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub product: Option<ProductDetail>,
    pub action: String,
    pub categories: Vec<Category>,
    pub brands: Vec<Brand>,
    pub size_rows: Vec<SizeStock>,
    pub uploads_enabled: bool,
    pub flash: Flash,
}

impl ProductFormTemplate {
    #[must_use]
    pub fn is_category(&self, id: &CategoryId) -> bool {
        self.product.as_ref().is_some_and(|p| p.category_id == *id)
    }

    #[must_use]
    pub fn is_brand(&self, id: &BrandId) -> bool {
        self.product.as_ref().is_some_and(|p| p.brand_id == *id)
    }
}

/// Size rows for the form: existing sizes (or the defaults) plus two blanks.
#[must_use]
pub fn size_rows(product: Option<&ProductDetail>) -> Vec<SizeStock> {
    let mut rows = product.map_or_else(
        || {
            DEFAULT_SIZES
                .iter()
                .map(|size| SizeStock {
                    id: None,
                    size: (*size).to_string(),
                    stock: 0,
                })
                .collect()
        },
        |p| p.sizes.clone(),
    );
    for _ in 0..2 {
        rows.push(SizeStock {
            id: None,
            size: String::new(),
            stock: 0,
        });
    }
    rows
}

async fn form_template(
    state: &AppState,
    admin: &crate::models::CurrentAdmin,
    product: Option<ProductDetail>,
    flash: Flash,
) -> Result<ProductFormTemplate, AppError> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    let brands = BrandRepository::new(state.pool()).list().await?;
    let action = product.as_ref().map_or_else(
        || "/admin/products".to_string(),
        |p| format!("/admin/products/{}", p.id),
    );

    Ok(ProductFormTemplate {
        admin_user: AdminUserView::from(admin),
        current_path: "/admin/products".to_string(),
        size_rows: size_rows(product.as_ref()),
        product,
        action,
        categories,
        brands,
        uploads_enabled: state.media().is_some(),
        flash,
    })
}

/// Check that the chosen category and brand exist.
async fn check_references(
    state: &AppState,
    input: &ProductInput,
) -> Result<Option<&'static str>, AppError> {
    if CategoryRepository::new(state.pool())
        .get(input.category_id)
        .await?
        .is_none()
    {
        return Ok(Some("invalid_category"));
    }
    if BrandRepository::new(state.pool())
        .get(input.brand_id)
        .await?
        .is_none()
    {
        return Ok(Some("invalid_brand"));
    }
    Ok(None)
}

/// Upload new images, in form order. Returns their URLs or a flash code.
async fn upload_images(
    state: &AppState,
    images: Vec<UploadedImage>,
) -> Result<Vec<String>, &'static str> {
    if images.is_empty() {
        return Ok(Vec::new());
    }
    let media = state.media().ok_or("upload_unavailable")?;

    let mut urls = Vec::with_capacity(images.len());
    for image in images {
        match media
            .upload_image(&image.file_name, &image.content_type, image.bytes)
            .await
        {
            Ok(url) => urls.push(url),
            Err(e) if e.is_client_error() => return Err("image_invalid"),
            Err(e) => {
                tracing::error!(error = %e, "Product image upload failed");
                return Err("upload_failed");
            }
        }
    }
    Ok(urls)
}

/// Product list.
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, AppError> {
    let (page, offset) = Pagination::offset(query.page);
    let (products, total) = ProductRepository::new(state.pool())
        .list(query.search(), super::PER_PAGE, offset)
        .await?;

    Ok(render(&ProductsTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/products".to_string(),
        products,
        search: query.search().unwrap_or_default().to_string(),
        pagination: Pagination::new(page, total),
        flash: query.flash(),
    }))
}

/// New product form.
#[instrument(skip(state, admin))]
pub async fn new(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let template = form_template(&state, &admin, None, query.flash()).await?;
    Ok(render(&template))
}

/// Edit product form.
#[instrument(skip(state, admin))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let product = ProductRepository::new(state.pool())
        .get(ProductId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let template = form_template(&state, &admin, Some(product), query.flash()).await?;
    Ok(render(&template))
}

/// Create a product with at least one image.
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let back = "/admin/products/new";
    let fields = ProductFields::from_multipart(multipart).await?;

    let input = match fields.validate() {
        Ok(input) => input,
        Err(code) => return Ok(redirect_flash(back, FlashKind::Error, code)),
    };
    if fields.images.is_empty() {
        return Ok(redirect_flash(back, FlashKind::Error, "image_required"));
    }
    if let Err(code) = fields.check_images() {
        return Ok(redirect_flash(back, FlashKind::Error, code));
    }
    if let Some(code) = check_references(&state, &input).await? {
        return Ok(redirect_flash(back, FlashKind::Error, code));
    }

    let urls = match upload_images(&state, fields.images).await {
        Ok(urls) => urls,
        Err(code) => return Ok(redirect_flash(back, FlashKind::Error, code)),
    };

    let id = ProductRepository::new(state.pool())
        .create(&input, &urls)
        .await?;
    tracing::info!(product_id = %id, name = %input.name, images = urls.len(), "Product created");

    Ok(redirect_flash(
        "/admin/products",
        FlashKind::Success,
        "product_saved",
    ))
}

/// Update a product. New images are appended to the existing ones.
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/products/{id}/edit");
    let fields = ProductFields::from_multipart(multipart).await?;

    let input = match fields.validate() {
        Ok(input) => input,
        Err(code) => return Ok(redirect_flash(&back, FlashKind::Error, code)),
    };
    if let Err(code) = fields.check_images() {
        return Ok(redirect_flash(&back, FlashKind::Error, code));
    }
    if let Some(code) = check_references(&state, &input).await? {
        return Ok(redirect_flash(&back, FlashKind::Error, code));
    }

    let urls = match upload_images(&state, fields.images).await {
        Ok(urls) => urls,
        Err(code) => return Ok(redirect_flash(&back, FlashKind::Error, code)),
    };

    ProductRepository::new(state.pool())
        .update(ProductId::new(id), &input, &urls)
        .await?;
    tracing::info!(product_id = id, new_images = urls.len(), "Product updated");

    Ok(redirect_flash(&back, FlashKind::Success, "product_saved"))
}

/// List or unlist a product.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    let listed = ProductRepository::new(state.pool())
        .toggle_listed(ProductId::new(id))
        .await?;
    tracing::info!(product_id = id, listed, "Product visibility changed");

    Ok(redirect_flash(
        "/admin/products",
        FlashKind::Success,
        "product_toggled",
    ))
}

/// Remove one image, refusing to remove the last.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn remove_image(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    Form(form): Form<RemoveImageForm>,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/products/{id}/edit");
    let removed = ProductRepository::new(state.pool())
        .remove_image(ProductId::new(id), &form.url)
        .await?;

    if removed {
        tracing::info!(product_id = id, "Product image removed");
        Ok(redirect_flash(&back, FlashKind::Success, "image_removed"))
    } else {
        Ok(redirect_flash(&back, FlashKind::Error, "last_image"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    fn fields() -> ProductFields {
        ProductFields {
            name: "Block Print Kurta".to_string(),
            description: "Hand block printed cotton.".to_string(),
            category_id: "3".to_string(),
            brand_id: "7".to_string(),
            price: "1299.999".to_string(),
            offer_percent: "10".to_string(),
            sizes: strings(&["m", "L", ""]),
            stocks: strings(&["4", "", ""]),
            images: Vec::new(),
        }
    }

    #[test]
    fn test_valid_product_fields() {
        let input = fields().validate().unwrap();
        assert_eq!(input.category_id, CategoryId::new(3));
        assert_eq!(input.brand_id, BrandId::new(7));
        assert_eq!(input.price, "1300.00".parse::<Decimal>().unwrap());
        assert_eq!(input.offer_percent, 10);
        assert_eq!(
            input.sizes,
            vec![("M".to_string(), 4), ("L".to_string(), 0)]
        );
    }

    #[test]
    fn test_invalid_product_fields() {
        let mut f = fields();
        f.price = "0".to_string();
        assert_eq!(f.validate().unwrap_err(), "invalid_price");

        let mut f = fields();
        f.category_id = String::new();
        assert_eq!(f.validate().unwrap_err(), "invalid_category");

        let mut f = fields();
        f.offer_percent = "95".to_string();
        assert_eq!(f.validate().unwrap_err(), "invalid_offer");
    }

    #[test]
    fn test_sizes_validation() {
        assert_eq!(
            validate_sizes(&strings(&["", " "]), &strings(&["1", "2"])),
            Err("invalid_sizes")
        );
        assert_eq!(
            validate_sizes(&strings(&["M", "m"]), &strings(&["1", "2"])),
            Err("invalid_sizes")
        );
        assert_eq!(
            validate_sizes(&strings(&["M"]), &strings(&["-1"])),
            Err("invalid_sizes")
        );
        assert_eq!(
            validate_sizes(&strings(&["Free"]), &strings(&["12"])),
            Ok(vec![("FREE".to_string(), 12)])
        );
    }

    #[test]
    fn test_check_images() {
        let image = |content_type: &str, len: usize| UploadedImage {
            file_name: "a.png".to_string(),
            content_type: content_type.to_string(),
            bytes: vec![0; len],
        };

        let mut f = fields();
        f.images = vec![image("image/png", 10)];
        assert!(f.check_images().is_ok());

        f.images = vec![image("image/gif", 10)];
        assert_eq!(f.check_images(), Err("image_invalid"));

        f.images = (0..=MAX_IMAGES_PER_UPLOAD).map(|_| image("image/png", 1)).collect();
        assert_eq!(f.check_images(), Err("too_many_images"));
    }

    #[test]
    fn test_size_rows_default_and_existing() {
        let rows = size_rows(None);
        assert_eq!(rows.len(), DEFAULT_SIZES.len() + 2);
        assert_eq!(rows[0].size, "S");
        assert!(rows.last().unwrap().size.is_empty());
    }
}
