//! Shopping cart store.

use std::sync::Arc;

use chrono::Utc;
use larkspur_core::{CartItem, CartItemId, CartResponse, CartTotals, LineOptions, ProductId};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::{CachedItems, ProductStore, Synced};
use crate::api::endpoints::cart as endpoints;
use crate::api::{ApiClient, RequestOptions};
use crate::error::ApiError;
use crate::storage::keys;

/// Observable cart state.
///
/// `totals` is always derived from `items`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
    pub loading: bool,
    pub error: Option<String>,
}

impl CartState {
    fn set_items(&mut self, items: Vec<CartItem>) {
        self.items = items.into_iter().map(CartItem::normalized).collect();
        self.totals = CartTotals::from_items(&self.items);
    }
}

/// Result of [`CartStore::sync_with_backend`].
#[derive(Debug, Clone, PartialEq)]
pub struct CartSync {
    /// Offline lines the backend accepted.
    pub synced: usize,
    /// Offline lines the backend rejected; they are dropped by the refetch.
    pub failed: usize,
    pub cart: Synced<CartState>,
}

/// Cart store.
///
/// Mutations call the backend and refetch the whole cart on success. On
/// failure the change is applied locally and written to the local cache.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    api: ApiClient,
    state: RwLock<CartState>,
    catalog: Option<ProductStore>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("has_catalog", &self.inner.catalog.is_some())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self::build(api, None)
    }

    /// A cart that prices offline lines from the product catalog.
    #[must_use]
    pub fn with_catalog(api: ApiClient, catalog: ProductStore) -> Self {
        Self::build(api, Some(catalog))
    }

    fn build(api: ApiClient, catalog: Option<ProductStore>) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                api,
                state: RwLock::new(CartState::default()),
                catalog,
            }),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of a product variant.
    ///
    /// Offline, an existing line with the same product, size and color is
    /// incremented; otherwise an `offline-` line is appended. Without catalog
    /// data for the product that line has a zero price.
    #[instrument(skip(self, options), fields(product_id = %product_id))]
    pub async fn add_to_cart(
        &self,
        product_id: &ProductId,
        quantity: u32,
        options: LineOptions,
    ) -> Synced<CartState> {
        self.begin().await;
        let body = json!({
            "productId": product_id,
            "quantity": quantity,
            "size": options.size,
            "color": options.color,
        });

        match self.send(endpoints::ADD, RequestOptions::post(body)).await {
            Ok(()) => self.fetch_cart().await,
            Err(error) => {
                warn!(error = %error, "Failed to add to cart, applying locally");
                let template = self.offline_line(product_id, &options).await;
                self.fall_back(error, |items| {
                    if let Some(line) = items.iter_mut().find(|i| i.matches(product_id, &options)) {
                        *line = line.with_quantity(line.quantity.saturating_add(quantity));
                    } else {
                        items.push(template.with_quantity(quantity));
                    }
                })
                .await
            }
        }
    }

    /// Remove a line.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_from_cart(&self, item_id: &CartItemId) -> Synced<CartState> {
        self.begin().await;
        match self
            .send(&endpoints::item(item_id.as_str()), RequestOptions::delete())
            .await
        {
            Ok(()) => self.fetch_cart().await,
            Err(error) => {
                warn!(error = %error, "Failed to remove from cart, applying locally");
                self.fall_back(error, |items| items.retain(|i| &i.id != item_id))
                    .await
            }
        }
    }

    /// Set a line's quantity. Zero or below removes the line.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_quantity(&self, item_id: &CartItemId, quantity: i64) -> Synced<CartState> {
        if quantity <= 0 {
            return self.remove_from_cart(item_id).await;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        self.begin().await;
        match self
            .send(
                &endpoints::item(item_id.as_str()),
                RequestOptions::put(json!({ "quantity": quantity })),
            )
            .await
        {
            Ok(()) => self.fetch_cart().await,
            Err(error) => {
                warn!(error = %error, "Failed to update quantity, applying locally");
                self.fall_back(error, |items| {
                    for line in items.iter_mut().filter(|i| &i.id == item_id) {
                        *line = line.with_quantity(quantity);
                    }
                })
                .await
            }
        }
    }

    /// Empty the cart. Succeeds locally even when the backend fails.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Synced<CartState> {
        self.begin().await;
        match self.send(endpoints::CLEAR, RequestOptions::delete()).await {
            Ok(()) => {
                let mut state = self.inner.state.write().await;
                state.set_items(Vec::new());
                state.loading = false;
                state.error = None;
                self.persist(&state.items);
                Synced::Fresh(state.clone())
            }
            Err(error) => {
                warn!(error = %error, "Failed to clear cart, clearing locally");
                self.fall_back(error, Vec::clear).await
            }
        }
    }

    // =========================================================================
    // Data management
    // =========================================================================

    /// Replace local state with the backend cart.
    ///
    /// On failure the local cache is loaded. Authentication failures do not
    /// record an error; signed-out shoppers simply see their cached cart.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Synced<CartState> {
        self.begin().await;
        let result = self
            .inner
            .api
            .request::<CartResponse>(endpoints::GET, RequestOptions::get().authenticated())
            .await;

        match result {
            Ok(cart) => {
                let mut state = self.inner.state.write().await;
                state.set_items(cart.items);
                if state.totals.total_amount != cart.total
                    || state.totals.total_items != cart.item_count
                {
                    debug!(
                        server_total = %cart.total,
                        computed_total = %state.totals.total_amount,
                        "Server cart totals differ from line subtotals"
                    );
                }
                state.loading = false;
                state.error = None;
                self.persist(&state.items);
                Synced::Fresh(state.clone())
            }
            Err(error) => {
                let silent = error.is_auth_failure();
                if silent {
                    debug!(error = %error, "Cart requires sign-in, loading local cache");
                } else {
                    warn!(error = %error, "Failed to fetch cart, loading local cache");
                }
                let cached = self.cached_items();

                let mut state = self.inner.state.write().await;
                if let Some(items) = cached {
                    state.set_items(items);
                }
                state.loading = false;
                state.error = (!silent).then(|| error.user_message());

                if state.items.is_empty() {
                    Synced::Empty { error }
                } else {
                    Synced::Stale {
                        value: state.clone(),
                        error,
                    }
                }
            }
        }
    }

    /// Load the local cache into state. Returns whether anything was loaded.
    pub async fn load_from_storage(&self) -> bool {
        let Some(items) = self.cached_items() else {
            return false;
        };
        let mut state = self.inner.state.write().await;
        state.set_items(items);
        state.error = None;
        true
    }

    /// Push offline lines to the backend, then refetch.
    ///
    /// Skipped (returns `None`) without a token or when nothing is offline.
    /// Lines the backend rejects are logged and skipped.
    #[instrument(skip(self))]
    pub async fn sync_with_backend(&self) -> Option<CartSync> {
        if !self.inner.api.has_access_token().await {
            debug!("No access token, skipping cart sync");
            return None;
        }

        let offline: Vec<CartItem> = self
            .inner
            .state
            .read()
            .await
            .items
            .iter()
            .filter(|i| i.is_offline())
            .cloned()
            .collect();
        if offline.is_empty() {
            debug!("No offline cart lines to sync");
            return None;
        }

        let mut synced = 0;
        let mut failed = 0;
        for line in &offline {
            let body = json!({
                "productId": line.product_id,
                "quantity": line.quantity,
                "size": line.size,
                "color": line.color,
            });
            match self.send(endpoints::ADD, RequestOptions::post(body)).await {
                Ok(()) => synced += 1,
                Err(error) => {
                    warn!(item_id = %line.id, error = %error, "Failed to sync cart line");
                    failed += 1;
                }
            }
        }
        info!(synced, failed, "Synced offline cart lines");

        Some(CartSync {
            synced,
            failed,
            cart: self.fetch_cart().await,
        })
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub async fn state(&self) -> CartState {
        self.inner.state.read().await.clone()
    }

    pub async fn item_count(&self) -> u32 {
        self.inner.state.read().await.totals.total_items
    }

    pub async fn total(&self) -> Decimal {
        self.inner.state.read().await.totals.total_amount
    }

    pub async fn is_in_cart(&self, product_id: &ProductId) -> bool {
        self.inner
            .state
            .read()
            .await
            .items
            .iter()
            .any(|i| &i.product_id == product_id)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn begin(&self) {
        let mut state = self.inner.state.write().await;
        state.loading = true;
        state.error = None;
    }

    async fn send(&self, endpoint: &str, options: RequestOptions) -> Result<(), ApiError> {
        self.inner
            .api
            .request::<Value>(endpoint, options.authenticated())
            .await
            .map(|_| ())
    }

    async fn fall_back(
        &self,
        error: ApiError,
        mutate: impl FnOnce(&mut Vec<CartItem>),
    ) -> Synced<CartState> {
        let mut state = self.inner.state.write().await;
        let mut items = std::mem::take(&mut state.items);
        mutate(&mut items);
        state.set_items(items);
        state.loading = false;
        state.error = Some(error.user_message());
        self.persist(&state.items);
        Synced::Stale {
            value: state.clone(),
            error,
        }
    }

    /// Template for an offline line, priced from the catalog when possible.
    async fn offline_line(&self, product_id: &ProductId, options: &LineOptions) -> CartItem {
        let product = match &self.inner.catalog {
            Some(catalog) => catalog.cached_product(product_id).await,
            None => None,
        };
        let (name, price, image_url) = product.map_or_else(
            || ("Product".to_string(), Decimal::ZERO, String::new()),
            |p| {
                let image = p.primary_image().unwrap_or_default().to_string();
                (p.name, p.price, image)
            },
        );

        CartItem {
            id: CartItemId::offline(product_id, Utc::now().timestamp_millis()),
            product_id: product_id.clone(),
            name,
            price,
            image_url,
            quantity: 0,
            size: options.size.clone(),
            color: options.color.clone(),
            subtotal: Decimal::ZERO,
        }
    }

    fn cached_items(&self) -> Option<Vec<CartItem>> {
        self.inner
            .api
            .storage()
            .get_with_timestamp::<CachedItems<CartItem>>(keys::CART, None)
            .map(|entry| entry.data.items)
            .filter(|items| !items.is_empty())
    }

    fn persist(&self, items: &[CartItem]) {
        let cached = CachedItems {
            items: items.to_vec(),
        };
        if let Err(e) = self.inner.api.storage().set_with_timestamp(keys::CART, &cached) {
            warn!(error = %e, "Failed to write cart cache");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::storage::LocalStorage;

    /// A client pointed at a closed port, so every request fails fast.
    fn offline_store() -> (CartStore, LocalStorage) {
        let storage = LocalStorage::in_memory();
        storage.set(keys::ACCESS_TOKEN, "token").unwrap();
        let config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9/api").unwrap());
        let api = ApiClient::new(&config, storage.clone()).unwrap();
        (CartStore::new(api), storage)
    }

    #[tokio::test]
    async fn test_failed_add_appends_zero_price_offline_line() {
        let (cart, storage) = offline_store();
        let product = ProductId::new("p1");

        let outcome = cart.add_to_cart(&product, 2, LineOptions::none()).await;
        let state = outcome.value().unwrap();
        assert!(outcome.error().is_some());
        assert_eq!(state.items.len(), 1);
        assert!(state.items[0].is_offline());
        assert_eq!(state.items[0].price, Decimal::ZERO);
        assert_eq!(state.totals.total_items, 2);
        assert!(state.error.is_some());

        // Same variant increments the existing line
        cart.add_to_cart(&product, 1, LineOptions::none()).await;
        let state = cart.state().await;
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].quantity, 3);

        // Optimistic state is cached
        let cached = storage
            .get_with_timestamp::<CachedItems<CartItem>>(keys::CART, None)
            .unwrap();
        assert_eq!(cached.data.items.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_quantity_update_removes_line() {
        let (cart, _) = offline_store();
        cart.add_to_cart(&ProductId::new("p1"), 1, LineOptions::none()).await;
        let id = cart.state().await.items[0].id.clone();

        let outcome = cart.update_quantity(&id, 0).await;
        assert!(outcome.value().unwrap().items.is_empty());
        assert_eq!(cart.item_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_loads_cache() {
        let (cart, storage) = offline_store();
        let line = CartItem {
            id: CartItemId::new("c1"),
            product_id: ProductId::new("p1"),
            name: "Tee".into(),
            price: Decimal::from(25),
            image_url: String::new(),
            quantity: 2,
            size: None,
            color: None,
            subtotal: Decimal::ZERO,
        };
        storage
            .set_with_timestamp(keys::CART, &CachedItems { items: vec![line] })
            .unwrap();

        let outcome = cart.fetch_cart().await;
        assert!(matches!(outcome, Synced::Stale { .. }));
        assert_eq!(cart.total().await, Decimal::from(50));
        assert!(cart.is_in_cart(&ProductId::new("p1")).await);
    }

    #[tokio::test]
    async fn test_clear_falls_back_to_local_clear() {
        let (cart, _) = offline_store();
        cart.add_to_cart(&ProductId::new("p1"), 1, LineOptions::none()).await;
        let outcome = cart.clear_cart().await;
        assert!(outcome.value().unwrap().items.is_empty());
        assert!(outcome.error().is_some());
    }
}
