//! Larkspur Core - Shared domain types.
//!
//! This crate provides the types mirrored from the storefront backend and
//! used across all Larkspur components:
//! - `storefront` - API client, auth session and client-side stores
//! - `cli` - Command-line driver for the storefront client
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients, no storage. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, emails, statuses and backend DTOs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
