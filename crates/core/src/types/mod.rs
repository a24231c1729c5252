//! Core types for Threadly.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod page;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{format_inr, from_paise, round_money, to_paise};
pub use page::{page_offset, total_pages};
pub use status::*;
