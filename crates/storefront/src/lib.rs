//! Larkspur Storefront client library.
//!
//! The client-side state layer of the storefront: everything a shopper-facing
//! front end needs between its UI and the backend REST API.
//!
//! # Architecture
//!
//! - [`api::ApiClient`] - HTTP wrapper with bearer tokens, one-shot refresh on
//!   401 and a debounced server-availability check
//! - [`session::AuthSession`] - who is logged in; persists token, user and
//!   role cookie
//! - [`stores`] - cart, wishlist and product stores with local-cache fallback
//! - [`checkout::Checkout`] - quote arithmetic, order and payment-intent creation
//! - [`account::Account`] / [`admin::AdminClient`] - order history, addresses,
//!   reviews, feedback and back-office calls
//!
//! The backend stays the source of truth. Stores refetch after every
//! successful mutation and only diverge from the server while it is
//! unreachable; each operation reports which case applied through
//! [`stores::Synced`].
//!
//! # Example
//!
//! ```rust,ignore
//! use larkspur_storefront::{Storefront, config::StorefrontConfig};
//!
//! let storefront = Storefront::new(StorefrontConfig::from_env()?)?;
//! storefront.session().initialize().await;
//! let cart = storefront.cart().add_to_cart(&product_id, 2, LineOptions::none()).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod admin;
pub mod api;
pub mod checkout;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;
pub mod stores;

pub use error::{ApiError, InitError};
pub use state::Storefront;
