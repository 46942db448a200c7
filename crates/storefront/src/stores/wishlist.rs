//! Wishlist store.

use std::sync::Arc;

use chrono::Utc;
use larkspur_core::{ProductId, WishlistItem, WishlistItemId};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::{CachedItems, CartStore, Synced};
use crate::api::endpoints::wishlist as endpoints;
use crate::api::{ApiClient, RequestOptions};
use crate::error::ApiError;
use crate::storage::keys;

/// Observable wishlist state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WishlistState {
    pub items: Vec<WishlistItem>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct WishlistResponse {
    #[serde(default)]
    items: Vec<WishlistItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    in_wishlist: bool,
}

/// Wishlist store. Entries are keyed by product id.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistStoreInner>,
}

struct WishlistStoreInner {
    api: ApiClient,
    state: RwLock<WishlistState>,
}

impl std::fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistStore").finish_non_exhaustive()
    }
}

impl WishlistStore {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(WishlistStoreInner {
                api,
                state: RwLock::new(WishlistState::default()),
            }),
        }
    }

    /// Add a product. Already-present products are left alone.
    ///
    /// The short-circuit only applies to a list the backend has confirmed.
    /// While offline entries remain, the add is sent again so the result
    /// reports whether the server answered.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_wishlist(&self, product_id: &ProductId) -> Synced<WishlistState> {
        {
            let state = self.inner.state.read().await;
            let present = state.items.iter().any(|i| &i.product_id == product_id);
            let confirmed = !state.items.iter().any(|i| i.id.is_offline());
            if present && confirmed {
                debug!("Product already in wishlist");
                return Synced::Fresh(state.clone());
            }
        }

        self.begin().await;
        match self
            .send(endpoints::ADD, RequestOptions::post(json!({ "productId": product_id })))
            .await
        {
            Ok(()) => self.fetch_wishlist().await,
            Err(error) => {
                warn!(error = %error, "Failed to add to wishlist, applying locally");
                let entry = WishlistItem {
                    id: WishlistItemId::offline(product_id, Utc::now().timestamp_millis()),
                    product_id: product_id.clone(),
                    product: None,
                    added_at: Utc::now(),
                };
                self.fall_back(error, |items| {
                    if !items.iter().any(|i| &i.product_id == product_id) {
                        items.push(entry);
                    }
                })
                .await
            }
        }
    }

    /// Remove a product.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_wishlist(&self, product_id: &ProductId) -> Synced<WishlistState> {
        self.begin().await;
        match self
            .send(
                &endpoints::remove(product_id.as_str()),
                RequestOptions::delete(),
            )
            .await
        {
            Ok(()) => self.fetch_wishlist().await,
            Err(error) => {
                warn!(error = %error, "Failed to remove from wishlist, applying locally");
                self.fall_back(error, |items| items.retain(|i| &i.product_id != product_id))
                    .await
            }
        }
    }

    /// Empty the wishlist. Succeeds locally even when the backend fails.
    #[instrument(skip(self))]
    pub async fn clear_wishlist(&self) -> Synced<WishlistState> {
        self.begin().await;
        match self.send(endpoints::CLEAR, RequestOptions::delete()).await {
            Ok(()) => {
                let mut state = self.inner.state.write().await;
                state.items.clear();
                state.loading = false;
                state.error = None;
                self.persist(&state.items);
                Synced::Fresh(state.clone())
            }
            Err(error) => {
                warn!(error = %error, "Failed to clear wishlist, clearing locally");
                self.fall_back(error, Vec::clear).await
            }
        }
    }

    /// Replace local state with the backend wishlist, falling back to the
    /// local cache.
    #[instrument(skip(self))]
    pub async fn fetch_wishlist(&self) -> Synced<WishlistState> {
        self.begin().await;
        let result = self
            .inner
            .api
            .request::<WishlistResponse>(endpoints::GET, RequestOptions::get().authenticated())
            .await;

        match result {
            Ok(response) => {
                let mut state = self.inner.state.write().await;
                state.items = response.items;
                state.loading = false;
                state.error = None;
                self.persist(&state.items);
                Synced::Fresh(state.clone())
            }
            Err(error) => {
                let silent = error.is_auth_failure();
                if !silent {
                    warn!(error = %error, "Failed to fetch wishlist, loading local cache");
                }
                let cached = self.cached_items();

                let mut state = self.inner.state.write().await;
                if let Some(items) = cached {
                    state.items = items;
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

    /// Move a product to the cart on the backend, then refetch both stores.
    ///
    /// # Errors
    ///
    /// Returns the backend error; there is no offline equivalent.
    #[instrument(skip(self, cart), fields(product_id = %product_id))]
    pub async fn move_to_cart(&self, product_id: &ProductId, cart: &CartStore) -> Result<(), ApiError> {
        self.begin().await;
        if let Err(error) = self
            .send(
                &endpoints::move_to_cart(product_id.as_str()),
                RequestOptions::post_empty(),
            )
            .await
        {
            warn!(error = %error, "Failed to move wishlist item to cart");
            let mut state = self.inner.state.write().await;
            state.loading = false;
            state.error = Some(error.user_message());
            return Err(error);
        }

        self.fetch_wishlist().await;
        cart.fetch_cart().await;
        Ok(())
    }

    /// Ask the backend whether a product is wishlisted, falling back to local
    /// state.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn check(&self, product_id: &ProductId) -> bool {
        match self
            .inner
            .api
            .request::<CheckResponse>(
                &endpoints::check(product_id.as_str()),
                RequestOptions::get().authenticated(),
            )
            .await
        {
            Ok(response) => response.in_wishlist,
            Err(error) => {
                debug!(error = %error, "Wishlist check failed, using local state");
                self.is_in_wishlist(product_id).await
            }
        }
    }

    /// Load the local cache into state. Returns whether anything was loaded.
    pub async fn load_from_storage(&self) -> bool {
        let Some(items) = self.cached_items() else {
            return false;
        };
        let mut state = self.inner.state.write().await;
        state.items = items;
        state.error = None;
        true
    }

    pub async fn state(&self) -> WishlistState {
        self.inner.state.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.inner.state.read().await.items.len()
    }

    pub async fn is_in_wishlist(&self, product_id: &ProductId) -> bool {
        self.inner
            .state
            .read()
            .await
            .items
            .iter()
            .any(|i| &i.product_id == product_id)
    }

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
        mutate: impl FnOnce(&mut Vec<WishlistItem>),
    ) -> Synced<WishlistState> {
        let mut state = self.inner.state.write().await;
        mutate(&mut state.items);
        state.loading = false;
        state.error = Some(error.user_message());
        self.persist(&state.items);
        Synced::Stale {
            value: state.clone(),
            error,
        }
    }

    fn cached_items(&self) -> Option<Vec<WishlistItem>> {
        self.inner
            .api
            .storage()
            .get_with_timestamp::<CachedItems<WishlistItem>>(keys::WISHLIST, None)
            .map(|entry| entry.data.items)
            .filter(|items| !items.is_empty())
    }

    fn persist(&self, items: &[WishlistItem]) {
        let cached = CachedItems {
            items: items.to_vec(),
        };
        if let Err(e) = self
            .inner
            .api
            .storage()
            .set_with_timestamp(keys::WISHLIST, &cached)
        {
            warn!(error = %e, "Failed to write wishlist cache");
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

    fn offline_store() -> WishlistStore {
        let storage = LocalStorage::in_memory();
        storage.set(keys::ACCESS_TOKEN, "token").unwrap();
        let config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9/api").unwrap());
        WishlistStore::new(ApiClient::new(&config, storage).unwrap())
    }

    #[tokio::test]
    async fn test_offline_add_is_idempotent() {
        let wishlist = offline_store();
        let product = ProductId::new("p1");

        let outcome = wishlist.add_to_wishlist(&product).await;
        let state = outcome.value().unwrap();
        assert_eq!(state.items.len(), 1);
        assert!(state.items[0].product.is_none());
        assert!(state.items[0].id.is_offline());

        // The list is unconfirmed, so a repeat add is not reported as fresh
        let again = wishlist.add_to_wishlist(&product).await;
        assert!(!again.is_fresh());
        assert!(again.error().is_some());
        assert_eq!(again.value().unwrap().items.len(), 1);
        assert_eq!(wishlist.count().await, 1);
    }

    #[tokio::test]
    async fn test_offline_remove_and_check() {
        let wishlist = offline_store();
        let product = ProductId::new("p1");
        wishlist.add_to_wishlist(&product).await;
        assert!(wishlist.check(&product).await);

        wishlist.remove_from_wishlist(&product).await;
        assert!(!wishlist.is_in_wishlist(&product).await);
        assert!(!wishlist.check(&product).await);
    }
}
