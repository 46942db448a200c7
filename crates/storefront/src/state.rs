//! The assembled client: one API client shared by every store and service.

use std::sync::Arc;

use crate::account::Account;
use crate::admin::AdminClient;
use crate::api::ApiClient;
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;
use crate::error::InitError;
use crate::session::AuthSession;
use crate::storage::{FileStorage, LocalStorage};
use crate::stores::{CartStore, ProductStore, WishlistStore};

/// Storefront client handle.
///
/// Cheaply cloneable via `Arc`. All stores share the same [`ApiClient`], so
/// a token refresh or logout seen by one is seen by all.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    session: AuthSession,
    products: ProductStore,
    cart: CartStore,
    wishlist: WishlistStore,
    checkout: Checkout,
    account: Account,
    admin: AdminClient,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api_url", &self.inner.config.api_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Build the client. The local cache lives under `config.data_dir` when
    /// set, otherwise in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created or the HTTP
    /// client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, InitError> {
        let storage = match &config.data_dir {
            Some(dir) => LocalStorage::new(FileStorage::open(dir)?),
            None => LocalStorage::in_memory(),
        };
        Self::with_storage(config, storage)
    }

    /// Build the client over an explicit storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_storage(config: StorefrontConfig, storage: LocalStorage) -> Result<Self, InitError> {
        let api = ApiClient::new(&config, storage)?;
        let session = AuthSession::new(api.clone());
        let products = ProductStore::new(api.clone(), &config);
        let cart = CartStore::with_catalog(api.clone(), products.clone());
        let wishlist = WishlistStore::new(api);
        let checkout = Checkout::new(session.clone(), cart.clone());
        let account = Account::new(session.clone());
        let admin = AdminClient::new(session.clone(), config.admin_retry);

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                session,
                products,
                cart,
                wishlist,
                checkout,
                account,
                admin,
            }),
        })
    }

    /// Restore the session, then warm the cart, wishlist and product cache
    /// from local storage.
    pub async fn restore(&self) {
        self.inner.session.initialize().await;
        self.inner.cart.load_from_storage().await;
        self.inner.wishlist.load_from_storage().await;
        self.inner.products.load_from_cache().await;
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        self.inner.session.api()
    }

    #[must_use]
    pub fn session(&self) -> &AuthSession {
        &self.inner.session
    }

    #[must_use]
    pub fn products(&self) -> &ProductStore {
        &self.inner.products
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.inner.account
    }

    #[must_use]
    pub fn admin(&self) -> &AdminClient {
        &self.inner.admin
    }
}
