//! Account route handlers.
//!
//! These routes require authentication.

use std::sync::LazyLock;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use threadly_core::AddressId;

use crate::db::addresses::AddressInput;
use crate::db::{AddressRepository, OrderRepository, RepositoryError, WalletRepository};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::{Address, CurrentUser, OrderSummary, User, session_keys};
use crate::routes::auth::auth_error_code;
use crate::routes::{Flash, MessageQuery};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Orders shown on the profile page.
const RECENT_ORDERS: i64 = 3;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("Invalid regex"));

static PINCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9][0-9]{5}$").expect("Invalid regex"));

// =============================================================================
// Forms
// =============================================================================

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub phone: Option<String>,
}

/// Change password form data.
#[derive(Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub current_password: String,
    pub password: String,
    pub password_confirm: String,
}

/// Address form data, also used to refill the form after a failed save.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: String,
    #[serde(default)]
    pub landmark: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
    /// Checkbox; present when ticked.
    pub is_default: Option<String>,
    /// Where to go after saving. Only checkout is accepted.
    pub next: Option<String>,
}

impl From<&Address> for AddressForm {
    fn from(a: &Address) -> Self {
        Self {
            full_name: a.full_name.clone(),
            phone: a.phone.clone(),
            line1: a.line1.clone(),
            line2: a.line2.clone().unwrap_or_default(),
            landmark: a.landmark.clone().unwrap_or_default(),
            city: a.city.clone(),
            state: a.state.clone(),
            pincode: a.pincode.clone(),
            is_default: a.is_default.then(|| "on".to_string()),
            next: None,
        }
    }
}

/// Query for the address form pages.
#[derive(Debug, Default, Deserialize)]
pub struct AddressFormQuery {
    pub next: Option<String>,
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl AddressForm {
    /// Validate the submitted fields.
    ///
    /// # Errors
    ///
    /// Returns one message per invalid field.
    pub fn validate(&self) -> Result<AddressInput, Vec<&'static str>> {
        let mut errors = Vec::new();

        let required = [
            (&self.full_name, "Full name is required."),
            (&self.line1, "Address line 1 is required."),
            (&self.city, "City is required."),
            (&self.state, "State is required."),
        ];
        for (value, message) in required {
            if value.trim().is_empty() {
                errors.push(message);
            }
        }

        let phone = self.phone.trim();
        if !PHONE_RE.is_match(phone) {
            errors.push("Phone number must be 10 digits.");
        }
        let pincode = self.pincode.trim();
        if !PINCODE_RE.is_match(pincode) {
            errors.push("Enter a valid 6-digit pincode.");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(AddressInput {
            full_name: self.full_name.trim().to_string(),
            phone: phone.to_string(),
            line1: self.line1.trim().to_string(),
            line2: optional(&self.line2),
            landmark: optional(&self.landmark),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            pincode: pincode.to_string(),
            location: None,
            is_default: self.is_default.is_some(),
        })
    }

    /// Redirect target after saving.
    #[must_use]
    pub fn redirect_target(&self) -> &str {
        safe_next(self.next.as_deref()).unwrap_or("/account/addresses?success=address_saved")
    }
}

/// Accept only local checkout URLs as post-save destinations.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with("/checkout") && !n.contains("//"))
}

// =============================================================================
// Templates
// =============================================================================

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub user: User,
    pub wallet_balance: Decimal,
    pub recent_orders: Vec<OrderSummary>,
    pub flash: Flash,
    pub nonce: String,
}

/// Change password page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/password.html")]
pub struct PasswordTemplate {
    /// Google-only accounts set a password without the current one.
    pub has_password: bool,
    pub flash: Flash,
    pub nonce: String,
}

/// Address book template.
#[derive(Template, WebTemplate)]
#[template(path = "account/addresses.html")]
pub struct AddressesTemplate {
    pub addresses: Vec<Address>,
    pub flash: Flash,
    pub nonce: String,
}

/// Add/edit address form template.
#[derive(Template, WebTemplate)]
#[template(path = "account/address_form.html")]
pub struct AddressFormTemplate {
    pub heading: &'static str,
    pub action: String,
    pub form: AddressForm,
    pub errors: Vec<&'static str>,
    pub nonce: String,
}

// =============================================================================
// Profile
// =============================================================================

/// Display the profile page.
#[instrument(skip(state, nonce))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> Result<AccountIndexTemplate, AppError> {
    let user = AuthService::new(state.pool())
        .get_user(current_user.id)
        .await?;
    let wallet_balance = WalletRepository::new(state.pool())
        .get(current_user.id)
        .await?
        .balance;
    let (recent_orders, _) = OrderRepository::new(state.pool())
        .list_for_user(current_user.id, RECENT_ORDERS, 0)
        .await?;

    Ok(AccountIndexTemplate {
        user,
        wallet_balance,
        recent_orders,
        flash: query.flash(),
        nonce,
    })
}

/// Update name and phone.
#[instrument(skip(state, session, form))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
    let auth = AuthService::new(state.pool());
    match auth
        .update_profile(user.id, &form.name, form.phone.as_deref())
        .await
    {
        Ok(()) => {
            // Keep the header greeting in sync.
            let updated = auth.get_user(user.id).await?;
            let current = CurrentUser {
                name: updated.name,
                ..user
            };
            if let Err(e) = session.insert(session_keys::CURRENT_USER, &current).await {
                tracing::warn!(error = %e, "Could not refresh session user");
            }
            Ok(Redirect::to("/account?success=profile_updated"))
        }
        Err(e) => match auth_error_code(&e) {
            Some(code) => Ok(Redirect::to(&format!("/account?error={code}"))),
            None => Err(e.into()),
        },
    }
}

/// Display the change password page.
#[instrument(skip(state, nonce))]
pub async fn password_page(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> Result<PasswordTemplate, AppError> {
    let user = AuthService::new(state.pool())
        .get_user(current_user.id)
        .await?;
    Ok(PasswordTemplate {
        has_password: user.has_password,
        flash: query.flash(),
        nonce,
    })
}

/// Change the password.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Redirect, AppError> {
    let result = AuthService::new(state.pool())
        .change_password(
            user.id,
            &user.email,
            &form.current_password,
            &form.password,
            &form.password_confirm,
        )
        .await;

    match result {
        Ok(()) => {
            tracing::info!("Password changed");
            Ok(Redirect::to("/account?success=password_changed"))
        }
        Err(AuthError::InvalidCredentials) => {
            Ok(Redirect::to("/account/password?error=current_password"))
        }
        Err(e) => match auth_error_code(&e) {
            Some(code) => Ok(Redirect::to(&format!("/account/password?error={code}"))),
            None => Err(e.into()),
        },
    }
}

// =============================================================================
// Address Book
// =============================================================================

/// Display the address book.
#[instrument(skip(state, nonce))]
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Query(query): Query<MessageQuery>,
) -> Result<AddressesTemplate, AppError> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(AddressesTemplate {
        addresses,
        flash: query.flash(),
        nonce,
    })
}

/// Display the new address form.
#[instrument(skip(nonce))]
pub async fn new_address(
    RequireAuth(_user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Query(query): Query<AddressFormQuery>,
) -> AddressFormTemplate {
    AddressFormTemplate {
        heading: "Add address",
        action: "/account/addresses".to_string(),
        form: AddressForm {
            next: safe_next(query.next.as_deref()).map(str::to_string),
            ..AddressForm::default()
        },
        errors: Vec::new(),
        nonce,
    }
}

/// Look up coordinates for an address when geocoding is configured.
async fn locate(state: &AppState, input: &mut AddressInput) {
    let Some(geocoding) = state.geocoding() else {
        return;
    };
    let query = format!(
        "{}, {}, {}, {}",
        input.line1, input.city, input.state, input.pincode
    );
    match geocoding.geocode(&query).await {
        Ok(location) => input.location = location,
        Err(e) => tracing::warn!(error = %e, "Address geocoding failed"),
    }
}

/// Save a new address.
#[instrument(skip(state, nonce, form))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Form(form): Form<AddressForm>,
) -> Result<Response, AppError> {
    let mut input = match form.validate() {
        Ok(input) => input,
        Err(errors) => {
            return Ok(AddressFormTemplate {
                heading: "Add address",
                action: "/account/addresses".to_string(),
                form,
                errors,
                nonce,
            }
            .into_response());
        }
    };

    locate(&state, &mut input).await;
    let address = AddressRepository::new(state.pool())
        .create(user.id, &input)
        .await?;
    tracing::info!(user_id = %user.id, address_id = %address.id, "Address added");

    Ok(Redirect::to(form.redirect_target()).into_response())
}

/// Display the edit address form.
#[instrument(skip(state, nonce))]
pub async fn edit_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Path(id): Path<i32>,
) -> Result<AddressFormTemplate, AppError> {
    let address = AddressRepository::new(state.pool())
        .get(user.id, AddressId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Address not found".to_string()))?;

    Ok(AddressFormTemplate {
        heading: "Edit address",
        action: format!("/account/addresses/{id}"),
        form: AddressForm::from(&address),
        errors: Vec::new(),
        nonce,
    })
}

/// Save changes to an address.
#[instrument(skip(state, nonce, form))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    CspNonce(nonce): CspNonce,
    Path(id): Path<i32>,
    Form(form): Form<AddressForm>,
) -> Result<Response, AppError> {
    let mut input = match form.validate() {
        Ok(input) => input,
        Err(errors) => {
            return Ok(AddressFormTemplate {
                heading: "Edit address",
                action: format!("/account/addresses/{id}"),
                form,
                errors,
                nonce,
            }
            .into_response());
        }
    };

    locate(&state, &mut input).await;
    match AddressRepository::new(state.pool())
        .update(user.id, AddressId::new(id), &input)
        .await
    {
        Ok(()) => Ok(Redirect::to(form.redirect_target()).into_response()),
        Err(RepositoryError::NotFound) => {
            Err(AppError::NotFound("Address not found".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete an address.
#[instrument(skip(state))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    match AddressRepository::new(state.pool())
        .delete(user.id, AddressId::new(id))
        .await
    {
        Ok(()) => Ok(Redirect::to("/account/addresses?success=address_deleted")),
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Address not found".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Make an address the default.
#[instrument(skip(state))]
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Redirect, AppError> {
    match AddressRepository::new(state.pool())
        .set_default(user.id, AddressId::new(id))
        .await
    {
        Ok(()) => Ok(Redirect::to("/account/addresses?success=address_saved")),
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Address not found".to_string())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_form() -> AddressForm {
        AddressForm {
            full_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            line1: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
            ..AddressForm::default()
        }
    }

    #[test]
    fn test_valid_address() {
        let input = valid_form().validate().unwrap();
        assert_eq!(input.pincode, "560001");
        assert_eq!(input.line2, None);
        assert!(!input.is_default);
    }

    #[test]
    fn test_address_phone_and_pincode() {
        let mut form = valid_form();
        form.phone = "98765".to_string();
        form.pincode = "056000".to_string();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_address_required_fields() {
        let errors = AddressForm::default().validate().unwrap_err();
        assert!(errors.contains(&"Full name is required."));
        assert!(errors.contains(&"City is required."));
    }

    #[test]
    fn test_optional_fields_are_trimmed() {
        let mut form = valid_form();
        form.line2 = "  Near park ".to_string();
        form.landmark = "   ".to_string();
        form.is_default = Some("on".to_string());
        let input = form.validate().unwrap();
        assert_eq!(input.line2.as_deref(), Some("Near park"));
        assert_eq!(input.landmark, None);
        assert!(input.is_default);
    }

    #[test]
    fn test_next_only_allows_checkout() {
        assert_eq!(safe_next(Some("/checkout?address=3")), Some("/checkout?address=3"));
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/checkout//evil.example")), None);
        assert_eq!(safe_next(None), None);
    }
}
