//! Category management.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use threadly_core::CategoryId;
use threadly_core::pricing::offer_percent_valid;

use super::{AdminUserView, Flash, FlashKind, MessageQuery, redirect_flash, render};
use crate::db::catalog::CategoryInput;
use crate::db::{CategoryRepository, RepositoryError};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireAdminWrite};
use crate::models::Category;
use crate::state::AppState;

/// Longest category, brand or product name.
pub const MAX_NAME_LENGTH: usize = 100;

/// Category form data.
#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub offer_percent: String,
}

/// Trimmed name of 1 to 100 characters.
///
/// # Errors
///
/// Returns the `invalid_name` flash code.
pub fn validate_name(name: &str) -> Result<String, &'static str> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err("invalid_name");
    }
    Ok(name.to_string())
}

/// Whole percent from 0 to 90. Blank means no offer.
///
/// # Errors
///
/// Returns the `invalid_offer` flash code.
pub fn parse_offer(value: &str) -> Result<i32, &'static str> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<i32>()
        .ok()
        .filter(|p| offer_percent_valid(*p))
        .ok_or("invalid_offer")
}

impl CategoryForm {
    /// Validate into repository input.
    ///
    /// # Errors
    ///
    /// Returns the flash code of the first invalid field.
    pub fn validate(&self) -> Result<CategoryInput, &'static str> {
        Ok(CategoryInput {
            name: validate_name(&self.name)?,
            description: self.description.trim().to_string(),
            offer_percent: parse_offer(&self.offer_percent)?,
        })
    }
}

/// Category list template.
#[derive(Template)]
#[template(path = "categories/index.html")]
pub struct CategoriesTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub categories: Vec<Category>,
    pub flash: Flash,
}

/// Category form template, for both create and edit.
#[derive(Template)]
#[template(path = "categories/form.html")]
pub struct CategoryFormTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub category: Option<Category>,
    pub action: String,
    pub flash: Flash,
}

/// Category list.
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let categories = CategoryRepository::new(state.pool()).list().await?;

    Ok(render(&CategoriesTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/categories".to_string(),
        categories,
        flash: query.flash(),
    }))
}

/// New category form.
#[instrument(skip(admin))]
pub async fn new(
    RequireAdminWrite(admin): RequireAdminWrite,
    Query(query): Query<MessageQuery>,
) -> Html<String> {
    render(&CategoryFormTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/categories".to_string(),
        category: None,
        action: "/admin/categories".to_string(),
        flash: query.flash(),
    })
}

/// Edit category form.
#[instrument(skip(state, admin))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let category = CategoryRepository::new(state.pool())
        .get(CategoryId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    Ok(render(&CategoryFormTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/categories".to_string(),
        action: format!("/admin/categories/{id}"),
        category: Some(category),
        flash: query.flash(),
    }))
}

/// Create a category.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect, AppError> {
    let back = "/admin/categories/new";
    let input = match form.validate() {
        Ok(input) => input,
        Err(code) => return Ok(redirect_flash(back, FlashKind::Error, code)),
    };

    match CategoryRepository::new(state.pool()).create(&input).await {
        Ok(id) => {
            tracing::info!(category_id = %id, name = %input.name, "Category created");
            Ok(redirect_flash(
                "/admin/categories",
                FlashKind::Success,
                "category_saved",
            ))
        }
        Err(RepositoryError::Conflict(_)) => {
            Ok(redirect_flash(back, FlashKind::Error, "name_taken"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Update a category.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/categories/{id}/edit");
    let input = match form.validate() {
        Ok(input) => input,
        Err(code) => return Ok(redirect_flash(&back, FlashKind::Error, code)),
    };

    match CategoryRepository::new(state.pool())
        .update(CategoryId::new(id), &input)
        .await
    {
        Ok(()) => {
            tracing::info!(category_id = id, "Category updated");
            Ok(redirect_flash(
                "/admin/categories",
                FlashKind::Success,
                "category_saved",
            ))
        }
        Err(RepositoryError::Conflict(_)) => {
            Ok(redirect_flash(&back, FlashKind::Error, "name_taken"))
        }
        Err(e) => Err(e.into()),
    }
}

/// List or unlist a category. Unlisted categories hide their products.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    let listed = CategoryRepository::new(state.pool())
        .toggle_listed(CategoryId::new(id))
        .await?;
    tracing::info!(category_id = id, listed, "Category visibility changed");

    Ok(redirect_flash(
        "/admin/categories",
        FlashKind::Success,
        "category_toggled",
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(name: &str, offer: &str) -> CategoryForm {
        CategoryForm {
            name: name.to_string(),
            description: "  Cotton kurtas  ".to_string(),
            offer_percent: offer.to_string(),
        }
    }

    #[test]
    fn test_valid_category() {
        let input = form("  Kurtas ", "15").validate().unwrap();
        assert_eq!(input.name, "Kurtas");
        assert_eq!(input.description, "Cotton kurtas");
        assert_eq!(input.offer_percent, 15);

        assert_eq!(form("Sarees", "").validate().unwrap().offer_percent, 0);
    }

    #[test]
    fn test_invalid_category() {
        assert_eq!(form("   ", "0").validate().unwrap_err(), "invalid_name");
        assert_eq!(
            form(&"x".repeat(101), "0").validate().unwrap_err(),
            "invalid_name"
        );
        assert_eq!(form("Kurtas", "91").validate().unwrap_err(), "invalid_offer");
        assert_eq!(form("Kurtas", "-1").validate().unwrap_err(), "invalid_offer");
        assert_eq!(form("Kurtas", "ten").validate().unwrap_err(), "invalid_offer");
    }
}
