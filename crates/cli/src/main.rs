//! Larkspur CLI - drive the storefront client from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from LARKSPUR_PASSWORD or prompt flag)
//! lark auth login -e ada@example.com
//!
//! # Browse and search
//! lark products list --category shirts --sort price_asc
//! lark products search linen
//!
//! # Cart and checkout
//! lark cart add p1 -q 2 --size M
//! lark checkout quote --shipping express
//!
//! # Back-office
//! lark admin users
//! ```
//!
//! # Commands
//!
//! - `auth` - Login, signup, logout, session status
//! - `products` - Listings, search, collections, filters
//! - `cart` / `wishlist` - Shopper stores with offline fallback
//! - `checkout` - Quote and place orders
//! - `account` - Orders, addresses, reviews, feedback
//! - `admin` - User and product management
//!
//! Session, cart and caches persist under `--data-dir` between runs.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use larkspur_storefront::Storefront;
use larkspur_storefront::config::StorefrontConfig;
use tracing_subscriber::EnvFilter;
use url::Url;

mod commands;

use commands::{AccountAction, AdminAction, AuthAction, CartAction, CheckoutAction, ProductAction, WishlistAction};

const DEFAULT_DATA_DIR: &str = ".larkspur";

#[derive(Parser)]
#[command(name = "lark")]
#[command(author, version, about = "Larkspur storefront client")]
struct Cli {
    /// Backend base URL (overrides `LARKSPUR_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<Url>,

    /// Local cache directory (overrides `LARKSPUR_DATA_DIR`)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign up and inspect the session
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Quote and place an order for the current cart
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
    /// Order history, addresses, reviews and feedback
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Back-office operations (admin role required)
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("larkspur_storefront=info,larkspur_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = StorefrontConfig::from_env()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    config.data_dir = cli
        .data_dir
        .or(config.data_dir)
        .or_else(|| Some(PathBuf::from(DEFAULT_DATA_DIR)));

    let storefront = Storefront::new(config)?;
    storefront.restore().await;

    match cli.command {
        Commands::Auth { action } => commands::auth::run(&storefront, action).await?,
        Commands::Products { action } => commands::products::run(&storefront, action).await?,
        Commands::Cart { action } => commands::cart::run(&storefront, action).await?,
        Commands::Wishlist { action } => commands::wishlist::run(&storefront, action).await?,
        Commands::Checkout { action } => commands::checkout::run(&storefront, action).await?,
        Commands::Account { action } => commands::account::run(&storefront, action).await?,
        Commands::Admin { action } => commands::admin::run(&storefront, action).await?,
    }
    Ok(())
}
