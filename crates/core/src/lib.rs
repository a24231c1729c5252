//! Threadly Core - Shared types and business rules.
//!
//! This crate is used by every Threadly component:
//! - `storefront` - Public-facing clothing store
//! - `admin` - Back-office panel served under `/admin`
//! - `cli` - Command-line tools for migrations, seeding and admin users
//!
//! # Architecture
//!
//! The core crate contains types and pure functions only - no I/O, no database
//! access, no HTTP clients. Both binaries price carts, validate coupons and
//! move order items through their lifecycle with the same code.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, money helpers, paging and status enums
//! - [`pricing`] - Offers, cart totals, coupons and delivery charges
//! - [`lifecycle`] - Order item status transitions and refund math

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod lifecycle;
pub mod pricing;
pub mod types;

pub use types::*;
