//! Authentication route handlers.
//!
//! Registration and password reset are confirmed with a 6-digit code sent
//! by email. Until the code is verified, the pending registration (or the
//! email being reset) lives only in the session. Google sign-in uses the
//! OAuth authorization code flow with a session-stored `state` and `nonce`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use rand::Rng;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use threadly_core::Email;

use crate::error::{AppError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{CspNonce, clear_current_user, set_current_user};
use crate::models::{CurrentUser, PendingSignup, User, session_keys};
use crate::routes::{Flash, MessageQuery};
use crate::services::auth::{AuthError, AuthService, PasswordIssue};
use crate::services::otp::{OTP_TTL_MINUTES, OtpError, OtpPurpose, OtpService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

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

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub password_confirm: String,
}

/// Email-only form (forgot password).
#[derive(Debug, Deserialize)]
pub struct EmailForm {
    pub email: String,
}

/// OTP entry form.
#[derive(Deserialize)]
pub struct OtpForm {
    pub code: String,
}

/// New password form.
#[derive(Deserialize)]
pub struct NewPasswordForm {
    pub password: String,
    pub password_confirm: String,
}

/// Query parameters from the Google OAuth callback.
#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub flash: Flash,
    pub google_enabled: bool,
    pub nonce: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub flash: Flash,
    pub google_enabled: bool,
    pub nonce: String,
}

/// Code entry page template, shared by registration and password reset.
#[derive(Template, WebTemplate)]
#[template(path = "auth/verify_otp.html")]
pub struct VerifyOtpTemplate {
    pub heading: &'static str,
    pub email: String,
    pub action: &'static str,
    pub resend_action: &'static str,
    pub ttl_minutes: i64,
    pub flash: Flash,
    pub nonce: String,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub flash: Flash,
    pub nonce: String,
}

/// New password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub flash: Flash,
    pub nonce: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Flash code for a refused auth operation, `None` for server errors.
pub(crate) fn auth_error_code(e: &AuthError) -> Option<&'static str> {
    Some(match e {
        AuthError::InvalidEmail(_) => "invalid_email",
        AuthError::InvalidCredentials | AuthError::UserNotFound => "credentials",
        AuthError::UserAlreadyExists => "email_taken",
        AuthError::Blocked => "blocked",
        AuthError::WeakPassword(PasswordIssue::TooShort) => "password_too_short",
        AuthError::WeakPassword(PasswordIssue::Mismatch) => "password_mismatch",
        AuthError::WeakPassword(PasswordIssue::Unchanged) => "same_password",
        AuthError::InvalidField { field: "phone", .. } => "invalid_phone",
        AuthError::InvalidField { .. } => "invalid_name",
        AuthError::InvalidSessionState => "session",
        AuthError::Repository(_) | AuthError::PasswordHash => return None,
    })
}

/// Redirect with the error code for `e`, or propagate server errors.
fn auth_redirect(base: &str, e: AuthError) -> Result<Response, AppError> {
    match auth_error_code(&e) {
        Some(code) => Ok(Redirect::to(&format!("{base}?error={code}")).into_response()),
        None => Err(e.into()),
    }
}

/// Flash code for an OTP failure, `None` for server errors.
const fn otp_error_code(e: &OtpError) -> Option<&'static str> {
    Some(match e {
        OtpError::Cooldown { .. } => "otp_cooldown",
        OtpError::Expired | OtpError::NotFound => "otp_expired",
        OtpError::TooManyAttempts => "otp_attempts",
        OtpError::Invalid { .. } => "otp_invalid",
        OtpError::Email(_) => "email_failed",
        OtpError::Repository(_) => return None,
    })
}

fn otp_redirect(base: &str, e: OtpError) -> Result<Response, AppError> {
    if let Some(code) = otp_error_code(&e) {
        if matches!(e, OtpError::Email(_)) {
            tracing::error!(error = %e, "Failed to send OTP email");
        }
        return Ok(Redirect::to(&format!("{base}?error={code}")).into_response());
    }
    match e {
        OtpError::Repository(e) => Err(e.into()),
        other => Err(AppError::Internal(other.to_string())),
    }
}

/// Generate a cryptographically random alphanumeric string.
fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
        .collect()
}

/// Put the user in the session and tag Sentry events with them.
async fn log_in(session: &Session, user: &User) -> Result<(), AppError> {
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
    };
    set_current_user(session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "User logged in", None);
    Ok(())
}

async fn session_value<T: serde::de::DeserializeOwned>(session: &Session, key: &str) -> Option<T> {
    session.get::<T>(key).await.ok().flatten()
}

// =============================================================================
// Login / Logout
// =============================================================================

/// Display the login page.
#[instrument(skip(state, nonce))]
pub async fn login_page(
    State(state): State<AppState>,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> LoginTemplate {
    LoginTemplate {
        flash: query.flash(),
        google_enabled: state.google().is_some(),
        nonce,
    }
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            log_in(&session, &user).await?;
            tracing::info!(user_id = %user.id, "Login succeeded");
            Ok(Redirect::to("/").into_response())
        }
        Err(e) => {
            tracing::info!(error = %e, "Login refused");
            auth_redirect("/auth/login", e)
        }
    }
}

/// Log out and flush the session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(Redirect::to("/auth/login?success=logged_out"))
}

// =============================================================================
// Registration
// =============================================================================

/// Display the registration page.
#[instrument(skip(state, nonce))]
pub async fn register_page(
    State(state): State<AppState>,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> RegisterTemplate {
    RegisterTemplate {
        flash: query.flash(),
        google_enabled: state.google().is_some(),
        nonce,
    }
}

/// Validate the registration, keep it in the session and email a code.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let pending = match AuthService::new(state.pool())
        .prepare_signup(
            &form.name,
            &form.email,
            form.phone.as_deref(),
            &form.password,
            &form.password_confirm,
        )
        .await
    {
        Ok(pending) => pending,
        Err(e) => return auth_redirect("/auth/register", e),
    };

    session
        .insert(session_keys::PENDING_SIGNUP, &pending)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    if let Err(e) = OtpService::new(state.pool(), state.email())
        .issue(&pending.email, OtpPurpose::Signup)
        .await
    {
        // A fresh code from a moments-ago attempt is still valid.
        if !matches!(e, OtpError::Cooldown { .. }) {
            return otp_redirect("/auth/register", e);
        }
    }

    Ok(Redirect::to("/auth/verify?success=otp_sent").into_response())
}

/// Display the registration code page.
#[instrument(skip(session, nonce))]
pub async fn verify_signup_page(
    session: Session,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> Response {
    let Some(pending) = session_value::<PendingSignup>(&session, session_keys::PENDING_SIGNUP).await
    else {
        return Redirect::to("/auth/register?error=session").into_response();
    };

    VerifyOtpTemplate {
        heading: "Verify your email",
        email: pending.email.into_inner(),
        action: "/auth/verify",
        resend_action: "/auth/verify/resend",
        ttl_minutes: OTP_TTL_MINUTES,
        flash: query.flash(),
        nonce,
    }
    .into_response()
}

/// Check the registration code and create the account.
#[instrument(skip_all)]
pub async fn verify_signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<OtpForm>,
) -> Result<Response, AppError> {
    let Some(pending) = session_value::<PendingSignup>(&session, session_keys::PENDING_SIGNUP).await
    else {
        return Ok(Redirect::to("/auth/register?error=session").into_response());
    };

    if let Err(e) = OtpService::new(state.pool(), state.email())
        .verify(&pending.email, OtpPurpose::Signup, &form.code)
        .await
    {
        return otp_redirect("/auth/verify", e);
    }

    let user = match AuthService::new(state.pool())
        .complete_signup(&pending)
        .await
    {
        Ok(user) => user,
        Err(e) => return auth_redirect("/auth/register", e),
    };

    let _ = session.remove::<PendingSignup>(session_keys::PENDING_SIGNUP).await;
    log_in(&session, &user).await?;
    tracing::info!(user_id = %user.id, "Account created");

    Ok(Redirect::to("/?success=registered").into_response())
}

/// Send a new registration code after the cooldown.
#[instrument(skip_all)]
pub async fn resend_signup(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let Some(pending) = session_value::<PendingSignup>(&session, session_keys::PENDING_SIGNUP).await
    else {
        return Ok(Redirect::to("/auth/register?error=session").into_response());
    };

    match OtpService::new(state.pool(), state.email())
        .issue(&pending.email, OtpPurpose::Signup)
        .await
    {
        Ok(()) => Ok(Redirect::to("/auth/verify?success=otp_sent").into_response()),
        Err(e) => otp_redirect("/auth/verify", e),
    }
}

// =============================================================================
// Password Reset
// =============================================================================

/// Display the forgot password page.
#[instrument(skip(nonce))]
pub async fn forgot_password_page(
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> ForgotPasswordTemplate {
    ForgotPasswordTemplate {
        flash: query.flash(),
        nonce,
    }
}

/// Email a reset code.
///
/// Unknown emails get the same response as known ones, so the form cannot
/// be used to discover accounts.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<EmailForm>,
) -> Result<Response, AppError> {
    let Ok(email) = Email::parse(&form.email) else {
        return Ok(Redirect::to("/auth/forgot-password?error=invalid_email").into_response());
    };

    session
        .insert(session_keys::RESET_EMAIL, &email)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    let _ = session.remove::<bool>(session_keys::RESET_VERIFIED).await;

    if AuthService::new(state.pool())
        .find_by_email(&email)
        .await?
        .is_some()
        && let Err(e) = OtpService::new(state.pool(), state.email())
            .issue(&email, OtpPurpose::PasswordReset)
            .await
        && !matches!(e, OtpError::Cooldown { .. })
    {
        return otp_redirect("/auth/forgot-password", e);
    }

    Ok(Redirect::to("/auth/reset/verify?success=otp_sent").into_response())
}

/// Display the reset code page.
#[instrument(skip(session, nonce))]
pub async fn verify_reset_page(
    session: Session,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> Response {
    let Some(email) = session_value::<Email>(&session, session_keys::RESET_EMAIL).await else {
        return Redirect::to("/auth/forgot-password?error=session").into_response();
    };

    VerifyOtpTemplate {
        heading: "Reset your password",
        email: email.into_inner(),
        action: "/auth/reset/verify",
        resend_action: "/auth/reset/resend",
        ttl_minutes: OTP_TTL_MINUTES,
        flash: query.flash(),
        nonce,
    }
    .into_response()
}

/// Check the reset code.
#[instrument(skip_all)]
pub async fn verify_reset(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<OtpForm>,
) -> Result<Response, AppError> {
    let Some(email) = session_value::<Email>(&session, session_keys::RESET_EMAIL).await else {
        return Ok(Redirect::to("/auth/forgot-password?error=session").into_response());
    };

    if let Err(e) = OtpService::new(state.pool(), state.email())
        .verify(&email, OtpPurpose::PasswordReset, &form.code)
        .await
    {
        return otp_redirect("/auth/reset/verify", e);
    }

    session
        .insert(session_keys::RESET_VERIFIED, true)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(Redirect::to("/auth/reset-password").into_response())
}

/// Send a new reset code after the cooldown.
#[instrument(skip_all)]
pub async fn resend_reset(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let Some(email) = session_value::<Email>(&session, session_keys::RESET_EMAIL).await else {
        return Ok(Redirect::to("/auth/forgot-password?error=session").into_response());
    };

    if AuthService::new(state.pool())
        .find_by_email(&email)
        .await?
        .is_some()
        && let Err(e) = OtpService::new(state.pool(), state.email())
            .issue(&email, OtpPurpose::PasswordReset)
            .await
    {
        return otp_redirect("/auth/reset/verify", e);
    }

    Ok(Redirect::to("/auth/reset/verify?success=otp_sent").into_response())
}

/// Display the new password page. Requires a verified reset code.
#[instrument(skip(session, nonce))]
pub async fn reset_password_page(
    session: Session,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> Response {
    if session_value::<bool>(&session, session_keys::RESET_VERIFIED).await != Some(true) {
        return Redirect::to("/auth/forgot-password?error=session").into_response();
    }

    ResetPasswordTemplate {
        flash: query.flash(),
        nonce,
    }
    .into_response()
}

/// Set the new password.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<NewPasswordForm>,
) -> Result<Response, AppError> {
    let email = session_value::<Email>(&session, session_keys::RESET_EMAIL).await;
    let verified = session_value::<bool>(&session, session_keys::RESET_VERIFIED).await;
    let (Some(email), Some(true)) = (email, verified) else {
        return Ok(Redirect::to("/auth/forgot-password?error=session").into_response());
    };

    if let Err(e) = AuthService::new(state.pool())
        .reset_password(&email, &form.password, &form.password_confirm)
        .await
    {
        return auth_redirect("/auth/reset-password", e);
    }

    let _ = session.remove::<Email>(session_keys::RESET_EMAIL).await;
    let _ = session.remove::<bool>(session_keys::RESET_VERIFIED).await;
    tracing::info!("Password reset completed");

    Ok(Redirect::to("/auth/login?success=password_reset").into_response())
}

// =============================================================================
// Google Sign-In
// =============================================================================

/// Redirect to Google's consent screen.
///
/// Generates `state` and `nonce`, stores them in the session and sends the
/// browser to the authorization URL.
#[instrument(skip(state, session))]
pub async fn google_login(State(state): State<AppState>, session: Session) -> Response {
    let Some(google) = state.google() else {
        return Redirect::to("/auth/login?error=google_unavailable").into_response();
    };

    let oauth_state = generate_random_string(32);
    let nonce = generate_random_string(32);

    if let Err(e) = session
        .insert(session_keys::GOOGLE_OAUTH_STATE, &oauth_state)
        .await
    {
        tracing::error!("Failed to store OAuth state in session: {e}");
        return Redirect::to("/auth/login?error=session").into_response();
    }
    if let Err(e) = session
        .insert(session_keys::GOOGLE_OAUTH_NONCE, &nonce)
        .await
    {
        tracing::error!("Failed to store OAuth nonce in session: {e}");
        return Redirect::to("/auth/login?error=session").into_response();
    }

    let redirect_uri = state.config().absolute_url("/auth/google/callback");
    Redirect::to(&google.authorization_url(&redirect_uri, &oauth_state, &nonce)).into_response()
}

/// Handle the Google OAuth callback.
///
/// Validates `state`, exchanges the code, reads the verified email and name,
/// then finds or creates the account and logs it in.
#[instrument(skip(state, session, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<Response, AppError> {
    let Some(google) = state.google() else {
        return Ok(Redirect::to("/auth/login?error=google_unavailable").into_response());
    };

    if let Some(error) = query.error {
        tracing::info!(%error, "Google sign-in cancelled");
        return Ok(Redirect::to("/auth/login?error=google_denied").into_response());
    }
    let Some(code) = query.code else {
        return Ok(Redirect::to("/auth/login?error=google_failed").into_response());
    };

    let stored_state = session_value::<String>(&session, session_keys::GOOGLE_OAUTH_STATE).await;
    let _ = session.remove::<String>(session_keys::GOOGLE_OAUTH_STATE).await;
    let _ = session.remove::<String>(session_keys::GOOGLE_OAUTH_NONCE).await;

    if stored_state.is_none() || stored_state != query.state {
        tracing::warn!("Google OAuth state mismatch");
        return Ok(Redirect::to("/auth/login?error=invalid_state").into_response());
    }

    let redirect_uri = state.config().absolute_url("/auth/google/callback");
    let profile = match google.exchange_code(&code, &redirect_uri).await {
        Ok(token) => google.userinfo(&token).await,
        Err(e) => Err(e),
    };
    let profile = match profile {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(error = %e, "Google sign-in failed");
            return Ok(Redirect::to("/auth/login?error=google_failed").into_response());
        }
    };

    if !profile.email_verified {
        return Ok(Redirect::to("/auth/login?error=google_failed").into_response());
    }
    let Ok(email) = Email::parse(&profile.email) else {
        return Ok(Redirect::to("/auth/login?error=invalid_email").into_response());
    };

    let user = match AuthService::new(state.pool())
        .login_with_google(&profile.sub, &email, profile.name.as_deref().unwrap_or_default())
        .await
    {
        Ok(user) => user,
        Err(e) => return auth_redirect("/auth/login", e),
    };

    log_in(&session, &user).await?;
    tracing::info!(user_id = %user.id, "Google sign-in succeeded");
    Ok(Redirect::to("/").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_string() {
        let s = generate_random_string(32);
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(s, generate_random_string(32));
    }

    #[test]
    fn test_auth_errors_have_messages() {
        let errors = [
            AuthError::InvalidCredentials,
            AuthError::UserAlreadyExists,
            AuthError::Blocked,
            AuthError::WeakPassword(PasswordIssue::TooShort),
            AuthError::WeakPassword(PasswordIssue::Mismatch),
            AuthError::WeakPassword(PasswordIssue::Unchanged),
            AuthError::InvalidField {
                field: "phone",
                message: "must be 10 digits",
            },
            AuthError::InvalidField {
                field: "name",
                message: "is required",
            },
        ];
        for e in &errors {
            let code = auth_error_code(e);
            let query = MessageQuery {
                error: code.map(str::to_string),
                success: None,
            };
            assert!(query.flash().error.is_some(), "no message for {e}");
        }
    }

    #[test]
    fn test_server_errors_have_no_code() {
        assert!(auth_error_code(&AuthError::PasswordHash).is_none());
    }

    #[test]
    fn test_otp_errors_map_to_codes() {
        assert_eq!(
            otp_error_code(&OtpError::Invalid { remaining: 2 }),
            Some("otp_invalid")
        );
        assert_eq!(otp_error_code(&OtpError::NotFound), Some("otp_expired"));
        assert_eq!(
            otp_error_code(&OtpError::Cooldown { seconds: 30 }),
            Some("otp_cooldown")
        );
    }
}
