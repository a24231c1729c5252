//! Admin sign-in and sign-out.

use askama::Template;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{Flash, FlashKind, MessageQuery, redirect_flash, render};
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::auth::LOGIN_PATH;
use crate::middleware::{clear_current_admin, set_current_admin};
use crate::models::{CurrentAdmin, session_keys};
use crate::services::{AdminAuthError, AdminAuthService};
use crate::state::AppState;

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub flash: Flash,
    pub email: String,
}

/// Login page. Signed-in admins go straight to the dashboard.
#[instrument(skip(session))]
pub async fn login_page(session: Session, Query(query): Query<MessageQuery>) -> Response {
    let signed_in = session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
        .is_some();
    if signed_in {
        return Redirect::to("/admin").into_response();
    }

    render(&LoginTemplate {
        flash: query.flash(),
        email: String::new(),
    })
    .into_response()
}

/// Check credentials and start an admin session.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let admin = match AdminAuthService::new(state.pool())
        .login(form.email.trim(), &form.password)
        .await
    {
        Ok(admin) => admin,
        Err(AdminAuthError::InvalidCredentials) => {
            tracing::info!("Admin login refused");
            let page = LoginTemplate {
                flash: MessageQuery {
                    error: Some("credentials".to_string()),
                    success: None,
                }
                .flash(),
                email: form.email,
            };
            return Ok((StatusCode::UNAUTHORIZED, render(&page)).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let current = CurrentAdmin::from(&admin);
    set_current_admin(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    tracing::info!(admin_id = %current.id, role = %current.role, "Admin signed in");
    Ok(Redirect::to("/admin").into_response())
}

/// End the admin session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    clear_current_admin(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;
    clear_sentry_user();

    Ok(redirect_flash(LOGIN_PATH, FlashKind::Success, "logged_out"))
}
