//! Threadly admin library.
//!
//! The back-office panel as a library, so route helpers, validation and
//! report builders can be tested and reused by the CLI.
//!
//! # Security
//!
//! Admin accounts can change prices, refund orders and block customers.
//! Every page sits behind an admin session; `viewer` accounts are
//! read-only.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
