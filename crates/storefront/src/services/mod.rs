//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password login, registration and Google account linking
//! - `catalog_cache` - Cached category and brand lists
//! - `checkout` - Cart pricing and order placement
//! - `otp` - Email one-time passwords
//! - `email` - SMTP delivery of OTP mails
//! - `razorpay` - Payment gateway orders and signature checks
//! - `google_oauth` - Google sign-in
//! - `geocoding` - Address coordinates for delivery charges

pub mod auth;
pub mod catalog_cache;
pub mod checkout;
pub mod email;
pub mod geocoding;
pub mod google_oauth;
pub mod otp;
pub mod razorpay;

pub use auth::{AuthError, AuthService};
pub use catalog_cache::CatalogCache;
pub use checkout::{CheckoutError, CheckoutOutcome};
pub use email::{EmailError, EmailService};
pub use geocoding::{GeocodingClient, GeocodingError};
pub use google_oauth::{GoogleOAuthClient, OAuthError};
pub use otp::{OtpError, OtpPurpose, OtpService};
pub use razorpay::{RazorpayClient, RazorpayError};
