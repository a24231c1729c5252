//! Brand management.

use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use threadly_core::BrandId;

use super::categories::validate_name;
use super::{AdminUserView, Flash, FlashKind, MessageQuery, redirect_flash, render};
use crate::db::{BrandRepository, RepositoryError};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdminAuth, RequireAdminWrite};
use crate::models::Brand;
use crate::state::AppState;

/// Brand form data.
#[derive(Debug, Deserialize)]
pub struct BrandForm {
    pub name: String,
}

/// Brand list template with the create form.
#[derive(Template)]
#[template(path = "brands/index.html")]
pub struct BrandsTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub brands: Vec<Brand>,
    pub flash: Flash,
}

/// Edit brand template.
#[derive(Template)]
#[template(path = "brands/edit.html")]
pub struct BrandEditTemplate {
    pub admin_user: AdminUserView,
    pub current_path: String,
    pub brand: Brand,
    pub flash: Flash,
}

/// Brand list.
#[instrument(skip(state, admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdminAuth(admin): RequireAdminAuth,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let brands = BrandRepository::new(state.pool()).list().await?;

    Ok(render(&BrandsTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/brands".to_string(),
        brands,
        flash: query.flash(),
    }))
}

/// Edit brand form.
#[instrument(skip(state, admin))]
pub async fn edit(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    Query(query): Query<MessageQuery>,
) -> Result<Html<String>, AppError> {
    let brand = BrandRepository::new(state.pool())
        .get(BrandId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Brand not found".to_string()))?;

    Ok(render(&BrandEditTemplate {
        admin_user: AdminUserView::from(&admin),
        current_path: "/admin/brands".to_string(),
        brand,
        flash: query.flash(),
    }))
}

/// Create a brand.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Form(form): Form<BrandForm>,
) -> Result<Redirect, AppError> {
    let back = "/admin/brands";
    let name = match validate_name(&form.name) {
        Ok(name) => name,
        Err(code) => return Ok(redirect_flash(back, FlashKind::Error, code)),
    };

    match BrandRepository::new(state.pool()).create(&name).await {
        Ok(id) => {
            tracing::info!(brand_id = %id, %name, "Brand created");
            Ok(redirect_flash(back, FlashKind::Success, "brand_saved"))
        }
        Err(RepositoryError::Conflict(_)) => {
            Ok(redirect_flash(back, FlashKind::Error, "name_taken"))
        }
        Err(e) => Err(e.into()),
    }
}

/// Rename a brand.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
    Form(form): Form<BrandForm>,
) -> Result<Redirect, AppError> {
    let back = format!("/admin/brands/{id}/edit");
    let name = match validate_name(&form.name) {
        Ok(name) => name,
        Err(code) => return Ok(redirect_flash(&back, FlashKind::Error, code)),
    };

    match BrandRepository::new(state.pool())
        .update(BrandId::new(id), &name)
        .await
    {
        Ok(()) => Ok(redirect_flash(
            "/admin/brands",
            FlashKind::Success,
            "brand_saved",
        )),
        Err(RepositoryError::Conflict(_)) => {
            Ok(redirect_flash(&back, FlashKind::Error, "name_taken"))
        }
        Err(e) => Err(e.into()),
    }
}

/// List or unlist a brand.
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdminWrite(admin): RequireAdminWrite,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    let listed = BrandRepository::new(state.pool())
        .toggle_listed(BrandId::new(id))
        .await?;
    tracing::info!(brand_id = id, listed, "Brand visibility changed");

    Ok(redirect_flash(
        "/admin/brands",
        FlashKind::Success,
        "brand_toggled",
    ))
}
