//! Authentication extractors for admin.
//!
//! Three levels of access:
//! - [`RequireAdminAuth`]: any signed-in admin, viewers included
//! - [`RequireAdminWrite`]: admins allowed to change store data
//! - [`RequireSuperAdmin`]: super admins only
//!
//! Unauthenticated requests are redirected to the login page. Authenticated
//! admins without the needed role get 403.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::set_sentry_user;
use crate::models::{AdminRole, CurrentAdmin, session_keys};

/// Where unauthenticated requests are sent.
pub const LOGIN_PATH: &str = "/admin/auth/login";

/// Rejection for the admin extractors.
#[derive(Debug)]
pub enum AdminAuthRejection {
    /// No admin in the session.
    RedirectToLogin,
    /// The session layer is missing from the stack.
    NoSession,
    /// Signed in, but the role does not allow this.
    Forbidden(&'static str),
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::NoSession => {
                tracing::error!("Session layer missing from admin router");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message).into_response(),
        }
    }
}

async fn current_admin(parts: &Parts) -> Result<CurrentAdmin, AdminAuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AdminAuthRejection::NoSession)?;

    let admin: CurrentAdmin = session
        .get(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
        .ok_or(AdminAuthRejection::RedirectToLogin)?;

    set_sentry_user(&admin.id, Some(admin.email.as_str()));
    Ok(admin)
}

/// Extractor that requires a signed-in admin of any role.
///
/// ```rust,ignore
/// async fn dashboard(RequireAdminAuth(admin): RequireAdminAuth) -> impl IntoResponse {
///     format!("Hello, {}!", admin.name)
/// }
/// ```
pub struct RequireAdminAuth(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireAdminAuth
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_admin(parts).await.map(Self)
    }
}

/// Extractor for handlers that change store data. Viewers are refused.
pub struct RequireAdminWrite(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireAdminWrite
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        if !admin.can_write() {
            return Err(AdminAuthRejection::Forbidden(
                "Viewers cannot change store data",
            ));
        }
        Ok(Self(admin))
    }
}

/// Extractor for super admin only handlers.
pub struct RequireSuperAdmin(pub CurrentAdmin);

impl<S> FromRequestParts<S> for RequireSuperAdmin
where
    S: Send + Sync,
{
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let admin = current_admin(parts).await?;
        if admin.role != AdminRole::SuperAdmin {
            return Err(AdminAuthRejection::Forbidden(
                "Only super admins can access this resource",
            ));
        }
        Ok(Self(admin))
    }
}

/// Store the signed-in admin in the session.
///
/// The session ID is cycled first so a pre-login ID cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Sign the admin out and drop the session.
///
/// # Errors
///
/// Returns an error if the session store cannot be updated.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_map_to_statuses() {
        let redirect = AdminAuthRejection::RedirectToLogin.into_response();
        assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            redirect.headers().get("location").unwrap(),
            "/admin/auth/login"
        );

        let forbidden = AdminAuthRejection::Forbidden("no").into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }
}
