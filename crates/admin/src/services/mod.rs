//! Business logic services for admin.
//!
//! # Services
//!
//! - `auth` - Email and password sign-in (Argon2id)
//! - `coupon_expiry` - Scheduled deactivation of expired coupons
//! - `media` - Cloudinary signed image uploads
//! - `reports` - Sales report ranges and CSV/PDF exports

pub mod auth;
pub mod coupon_expiry;
pub mod media;
pub mod reports;

pub use auth::{AdminAuthError, AdminAuthService};
pub use media::{CloudinaryClient, MediaError};
pub use reports::{ReportError, ReportPeriod, ReportRange};
