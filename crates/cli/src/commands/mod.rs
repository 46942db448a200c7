//! Subcommand definitions and handlers.
//!
//! Results go to stdout; logs and warnings go to stderr through `tracing`.

#![allow(clippy::print_stdout)]

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod products;
pub mod wishlist;

use clap::Subcommand;
use larkspur_core::{CartItem, EmailError, Price, Product};
use larkspur_storefront::account::AccountError;
use larkspur_storefront::checkout::CheckoutError;
use larkspur_storefront::stores::Synced;
use larkspur_storefront::ApiError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("{0}")]
    InvalidArgument(String),
}

// =============================================================================
// Actions
// =============================================================================

#[derive(Subcommand)]
pub enum AuthAction {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "LARKSPUR_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "LARKSPUR_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Log out and clear local credentials
    Logout,
    /// Show the current session
    Status,
    /// Reload the profile from the backend
    Profile,
}

#[derive(Subcommand)]
pub enum ProductAction {
    /// List products
    List {
        #[command(flatten)]
        filters: products::FilterArgs,
        /// Bypass the local cache
        #[arg(long)]
        force: bool,
    },
    /// Featured products
    Featured {
        #[arg(short, long, default_value_t = 8)]
        limit: u32,
    },
    /// Show one product
    Show { id: String },
    /// Search by text
    Search {
        query: String,
        #[command(flatten)]
        filters: products::FilterArgs,
    },
    /// Search-as-you-type suggestions
    Suggest { query: String },
    /// Available filter facets
    Filters {
        #[arg(long)]
        category: Option<String>,
    },
    /// List collections
    Collections,
    /// Show a collection and its products
    Collection {
        /// Collection id or name
        key: String,
        #[command(flatten)]
        filters: products::FilterArgs,
    },
    /// Drop every cached listing
    ClearCache,
}

#[derive(Subcommand)]
pub enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        product_id: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Set a line quantity (0 removes the line)
    Update {
        item_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { item_id: String },
    /// Empty the cart
    Clear,
    /// Push offline lines to the backend
    Sync,
}

#[derive(Subcommand)]
pub enum WishlistAction {
    /// Show the wishlist
    Show,
    /// Save a product
    Add { product_id: String },
    /// Remove a product
    Remove { product_id: String },
    /// Move a product into the cart
    Move { product_id: String },
    /// Whether a product is saved
    Check { product_id: String },
    /// Empty the wishlist
    Clear,
}

#[derive(Subcommand)]
pub enum CheckoutAction {
    /// Show totals for the current cart
    Quote {
        #[arg(long, default_value = "standard")]
        shipping: String,
    },
    /// Create the order and payment intent
    Place {
        #[command(flatten)]
        form: checkout::ShippingArgs,
        #[arg(long, default_value = "standard")]
        shipping: String,
    },
}

#[derive(Subcommand)]
pub enum AccountAction {
    /// List orders
    Orders,
    /// Show one order
    Order { id: String },
    /// List saved addresses
    Addresses,
    /// Save a new address
    AddAddress {
        #[command(flatten)]
        address: account::AddressArgs,
    },
    /// Delete a saved address
    DeleteAddress { id: String },
    /// Review a product
    Review {
        product_id: String,
        #[arg(short, long)]
        rating: u8,
        #[arg(short, long)]
        comment: String,
    },
    /// Featured testimonials
    Feedback,
    /// Send feedback
    SendFeedback { message: String },
}

#[derive(Subcommand)]
pub enum AdminAction {
    /// List users
    Users,
    /// Change a user's role
    SetRole {
        user_id: String,
        /// `user`, `admin` or `super_admin`
        role: String,
    },
    /// Delete a user
    DeleteUser { user_id: String },
    /// List products
    Products {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Create a product
    CreateProduct {
        #[command(flatten)]
        product: admin::ProductArgs,
    },
    /// Delete a product
    DeleteProduct { id: String },
}

// =============================================================================
// Output helpers
// =============================================================================

fn money(amount: Decimal) -> String {
    Price::usd(amount).display()
}

/// Unwrap a store result, warning when the data is local.
fn settle<T>(outcome: Synced<T>) -> Result<T, ApiError> {
    if let Synced::Stale { error, .. } = &outcome {
        tracing::warn!("Showing local data: {}", error.user_message());
    }
    outcome.into_result()
}

fn print_products(products: &[Product]) {
    if products.is_empty() {
        println!("No products found");
        return;
    }
    for product in products {
        let sale = if product.on_sale() { " (sale)" } else { "" };
        println!(
            "{:<24} {:<40} {:>10}{sale}",
            product.id,
            product.name,
            money(product.price)
        );
    }
}

fn print_cart_lines(items: &[CartItem]) {
    for item in items {
        let variant = [item.size.as_deref(), item.color.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("/");
        println!(
            "{:<28} {:<32} {:>4} x {:>10} = {:>10} {variant}",
            item.id,
            item.name,
            item.quantity,
            money(item.price),
            money(item.subtotal)
        );
    }
}

fn parse_arg<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, CommandError> {
    raw.parse().map_err(CommandError::InvalidArgument)
}
