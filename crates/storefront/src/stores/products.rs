//! Product catalog store.
//!
//! Listings are cached per filter signature, in a `moka` cache and in the
//! timestamped local cache, both expiring after the configured TTL. A fresh
//! entry is served without a request unless the caller forces a refetch.
//! When the backend fails, any cached response for the same key is served
//! regardless of age.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use larkspur_core::{
    Collection, FilterGroup, FilterOptions, Pagination, Product, ProductId, ProductPage,
};
use moka::future::Cache;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::Synced;
use crate::api::endpoints::{self, with_query};
use crate::api::{ApiClient, RequestOptions};
use crate::config::StorefrontConfig;
use crate::error::ApiError;
use crate::storage::keys;

const FEATURED_SUFFIX: &str = "_featured";
const COLLECTIONS_SUFFIX: &str = "_collections";

// =============================================================================
// Cache
// =============================================================================

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Page(ProductPage),
    Products(Vec<Product>),
    Collections(Vec<Collection>),
}

/// A response type the store can cache.
trait CacheEntry: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn into_value(self) -> CacheValue;
    fn from_value(value: CacheValue) -> Option<Self>;
    fn has_data(&self) -> bool;
}

impl CacheEntry for ProductPage {
    fn into_value(self) -> CacheValue {
        CacheValue::Page(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Page(page) => Some(page),
            _ => None,
        }
    }

    fn has_data(&self) -> bool {
        !self.products.is_empty()
    }
}

impl CacheEntry for Vec<Product> {
    fn into_value(self) -> CacheValue {
        CacheValue::Products(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Products(products) => Some(products),
            _ => None,
        }
    }

    fn has_data(&self) -> bool {
        !self.is_empty()
    }
}

impl CacheEntry for Vec<Collection> {
    fn into_value(self) -> CacheValue {
        CacheValue::Collections(self)
    }

    fn from_value(value: CacheValue) -> Option<Self> {
        match value {
            CacheValue::Collections(collections) => Some(collections),
            _ => None,
        }
    }

    fn has_data(&self) -> bool {
        !self.is_empty()
    }
}

// =============================================================================
// Response shapes
// =============================================================================

#[derive(Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<Product>,
}

/// Endpoints that answer either with a bare array or with a wrapping object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Bare(Vec<T>),
    Collections { collections: Vec<T> },
    Suggestions { suggestions: Vec<T> },
    Filters { filters: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(items)
            | Self::Collections { collections: items }
            | Self::Suggestions { suggestions: items }
            | Self::Filters { filters: items } => items,
        }
    }
}

// =============================================================================
// Search debouncing
// =============================================================================

/// Generation counter: only the newest search within the window proceeds.
#[derive(Debug)]
struct SearchDebouncer {
    window: Duration,
    generation: AtomicU64,
}

impl SearchDebouncer {
    fn ticket(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }
}

/// Outcome of [`ProductStore::search_products`].
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// A newer search arrived inside the debounce window; no request was made.
    Superseded,
    Completed(Synced<Vec<Product>>),
}

// =============================================================================
// ProductStore
// =============================================================================

/// Observable product store state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductState {
    pub products: Vec<Product>,
    pub featured: Vec<Product>,
    pub search_results: Vec<Product>,
    pub collections: Vec<Collection>,
    pub current_product: Option<Product>,
    pub filters: FilterOptions,
    pub search_query: String,
    pub pagination: Option<Pagination>,
    pub last_fetched: Option<DateTime<Utc>>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Product catalog store.
#[derive(Clone)]
pub struct ProductStore {
    inner: Arc<ProductStoreInner>,
}

struct ProductStoreInner {
    api: ApiClient,
    state: RwLock<ProductState>,
    cache: Cache<String, CacheValue>,
    ttl: Duration,
    search: SearchDebouncer,
}

impl std::fmt::Debug for ProductStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductStore")
            .field("ttl", &self.inner.ttl)
            .finish_non_exhaustive()
    }
}

impl ProductStore {
    #[must_use]
    pub fn new(api: ApiClient, config: &StorefrontConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(500)
            .time_to_live(config.product_cache_ttl)
            .build();

        Self {
            inner: Arc::new(ProductStoreInner {
                api,
                state: RwLock::new(ProductState::default()),
                cache,
                ttl: config.product_cache_ttl,
                search: SearchDebouncer {
                    window: config.search_debounce,
                    generation: AtomicU64::new(0),
                },
            }),
        }
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> ProductState {
        self.inner.state.read().await.clone()
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Fetch a filtered product listing.
    #[instrument(skip(self, filters), fields(signature = %filters.signature()))]
    pub async fn fetch_products(&self, filters: FilterOptions, force: bool) -> Synced<ProductPage> {
        let key = format!("{}:{}", keys::PRODUCTS, filters.signature());
        let endpoint = with_query(endpoints::products::LIST, filters.query_pairs());
        let api = self.inner.api.clone();

        let outcome = self
            .cache_aside(&key, force, || async move {
                api.request::<ProductPage>(&endpoint, RequestOptions::get())
                    .await
            })
            .await;

        if let Some(page) = outcome.value() {
            let mut state = self.inner.state.write().await;
            state.products.clone_from(&page.products);
            state.pagination = page.pagination;
            state.filters = filters;
            if outcome.is_fresh() {
                state.last_fetched = Some(Utc::now());
            }
        }
        outcome
    }

    /// Fetch featured products, cached per limit.
    #[instrument(skip(self))]
    pub async fn fetch_featured(&self, limit: u32, force: bool) -> Synced<Vec<Product>> {
        let key = format!("{}{FEATURED_SUFFIX}:{limit}", keys::PRODUCTS);
        let endpoint = with_query(
            endpoints::products::FEATURED,
            [("limit", limit.to_string()), ("sortOrder", "desc".to_string())],
        );
        let api = self.inner.api.clone();

        let outcome = self
            .cache_aside(&key, force, || async move {
                api.request::<ProductsResponse>(&endpoint, RequestOptions::get())
                    .await
                    .map(|r| r.products)
            })
            .await;

        if let Some(products) = outcome.value() {
            self.inner.state.write().await.featured.clone_from(products);
        }
        outcome
    }

    /// Fetch one product, served from the loaded listing unless forced.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn fetch_product_by_id(&self, id: &ProductId, force: bool) -> Synced<Product> {
        if !force {
            let mut state = self.inner.state.write().await;
            if let Some(product) = state.products.iter().find(|p| &p.id == id).cloned() {
                debug!("Serving product from loaded listing");
                state.current_product = Some(product.clone());
                return Synced::Fresh(product);
            }
        }

        self.begin().await;
        let result = self
            .inner
            .api
            .request::<Product>(&endpoints::products::by_id(id.as_str()), RequestOptions::get())
            .await;

        let mut state = self.inner.state.write().await;
        state.loading = false;
        match result {
            Ok(product) => {
                state.current_product = Some(product.clone());
                Synced::Fresh(product)
            }
            Err(error) => {
                warn!(error = %error, "Failed to fetch product");
                state.error = Some(error.user_message());
                drop(state);
                match self.cached_product(id).await {
                    Some(value) => Synced::Stale { value, error },
                    None => Synced::Empty { error },
                }
            }
        }
    }

    /// Debounced full-text search.
    ///
    /// Waits out the debounce window first; if another search starts in the
    /// meantime this one returns [`SearchOutcome::Superseded`] without a
    /// request. A blank query clears the results immediately.
    #[instrument(skip(self, filters))]
    pub async fn search_products(&self, query: &str, filters: &FilterOptions) -> SearchOutcome {
        let ticket = self.inner.search.ticket();
        let query = query.trim();

        if query.is_empty() {
            let mut state = self.inner.state.write().await;
            state.search_results.clear();
            state.search_query.clear();
            return SearchOutcome::Completed(Synced::Fresh(Vec::new()));
        }

        tokio::time::sleep(self.inner.search.window).await;
        if !self.inner.search.is_current(ticket) {
            debug!("Search superseded");
            return SearchOutcome::Superseded;
        }

        {
            let mut state = self.inner.state.write().await;
            state.loading = true;
            state.error = None;
            query.clone_into(&mut state.search_query);
        }

        let mut pairs = vec![("search".to_string(), query.to_string())];
        pairs.extend(filters.query_pairs());
        let endpoint = with_query(endpoints::products::LIST, pairs);
        let result = self
            .inner
            .api
            .request::<ProductPage>(&endpoint, RequestOptions::get())
            .await;

        // A newer search owns the observable state once it has started
        let current = self.inner.search.is_current(ticket);
        let mut state = self.inner.state.write().await;
        if current {
            state.loading = false;
        }
        let synced = match result {
            Ok(page) => {
                if current {
                    state.search_results.clone_from(&page.products);
                }
                Synced::Fresh(page.products)
            }
            Err(error) => {
                warn!(error = %error, "Search failed");
                if current {
                    state.error = Some(error.user_message());
                    state.search_results.clear();
                }
                Synced::Empty { error }
            }
        };
        SearchOutcome::Completed(synced)
    }

    /// Fetch the collection list.
    #[instrument(skip(self))]
    pub async fn fetch_collections(&self, force: bool) -> Synced<Vec<Collection>> {
        let key = format!("{}{COLLECTIONS_SUFFIX}", keys::PRODUCTS);
        let api = self.inner.api.clone();

        let outcome = self
            .cache_aside(&key, force, || async move {
                api.request::<ListResponse<Collection>>(
                    endpoints::collections::LIST,
                    RequestOptions::get(),
                )
                .await
                .map(ListResponse::into_vec)
            })
            .await;

        if let Some(collections) = outcome.value() {
            self.inner
                .state
                .write()
                .await
                .collections
                .clone_from(collections);
        }
        outcome
    }

    /// Fetch one collection by id or name.
    ///
    /// # Errors
    ///
    /// Returns the backend error; single collections are not cached.
    #[instrument(skip(self))]
    pub async fn fetch_collection(&self, key: &str) -> Result<Collection, ApiError> {
        self.inner
            .api
            .request(
                &endpoints::collections::by_id_or_name(key),
                RequestOptions::get(),
            )
            .await
    }

    /// Fetch the products of a collection, cached like listings.
    #[instrument(skip(self, filters))]
    pub async fn fetch_collection_products(
        &self,
        collection: &str,
        filters: &FilterOptions,
        force: bool,
    ) -> Synced<ProductPage> {
        let key = format!(
            "{}:collection={collection}:{}",
            keys::PRODUCTS,
            filters.signature()
        );
        let endpoint = with_query(
            &endpoints::collections::products(collection),
            filters.query_pairs(),
        );
        let api = self.inner.api.clone();

        self.cache_aside(&key, force, || async move {
            api.request::<ProductPage>(&endpoint, RequestOptions::get())
                .await
        })
        .await
    }

    /// Autocomplete suggestions for a partial query. Blank input yields none.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn suggestions(&self, query: &str) -> Result<Vec<String>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = with_query(endpoints::products::SUGGESTIONS, [("q", query)]);
        self.inner
            .api
            .request::<ListResponse<String>>(&endpoint, RequestOptions::get())
            .await
            .map(ListResponse::into_vec)
    }

    /// Filter groups available for a category.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn filter_options(&self, category: Option<&str>) -> Result<Vec<FilterGroup>, ApiError> {
        let endpoint = with_query(
            endpoints::products::FILTER_OPTIONS,
            category.map(|c| ("category", c)),
        );
        self.inner
            .api
            .request::<ListResponse<FilterGroup>>(&endpoint, RequestOptions::get())
            .await
            .map(ListResponse::into_vec)
    }

    // =========================================================================
    // Cache management
    // =========================================================================

    /// Drop every cached listing, in memory and on disk.
    pub async fn clear_cache(&self) {
        self.inner.cache.invalidate_all();
        if let Err(e) = self.inner.api.storage().remove_prefix(keys::PRODUCTS) {
            warn!(error = %e, "Failed to clear product cache");
        }
        debug!("Product cache cleared");
    }

    /// Populate state from the local cache without touching the network.
    ///
    /// Returns whether anything was loaded.
    pub async fn load_from_cache(&self) -> bool {
        let storage = self.inner.api.storage();
        let listing = storage
            .get_with_timestamp::<ProductPage>(&format!("{}:all", keys::PRODUCTS), None)
            .filter(|entry| entry.data.has_data());
        let featured = storage
            .keys_with_prefix(&format!("{}{FEATURED_SUFFIX}:", keys::PRODUCTS))
            .into_iter()
            .find_map(|key| storage.get_with_timestamp::<Vec<Product>>(&key, None))
            .filter(|entry| entry.data.has_data());

        let mut state = self.inner.state.write().await;
        let mut loaded = false;
        if let Some(entry) = listing {
            state.products = entry.data.products;
            state.pagination = entry.data.pagination;
            loaded = true;
        }
        if let Some(entry) = featured {
            state.featured = entry.data;
            loaded = true;
        }
        loaded
    }

    /// Look a product up in whatever the store already holds.
    pub async fn cached_product(&self, id: &ProductId) -> Option<Product> {
        let state = self.inner.state.read().await;
        state
            .current_product
            .iter()
            .chain(&state.products)
            .chain(&state.featured)
            .chain(&state.search_results)
            .find(|p| &p.id == id)
            .cloned()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn begin(&self) {
        let mut state = self.inner.state.write().await;
        state.loading = true;
        state.error = None;
    }

    /// Serve `key` from cache when fresh, otherwise fetch and cache, falling
    /// back to any stored copy on failure.
    async fn cache_aside<T, F, Fut>(&self, key: &str, force: bool, fetch: F) -> Synced<T>
    where
        T: CacheEntry,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let storage = self.inner.api.storage();

        if !force {
            if let Some(value) = self.inner.cache.get(key).await.and_then(T::from_value) {
                debug!(key, "Cache hit");
                return Synced::Fresh(value);
            }
            // Not promoted into moka: the stored timestamp keeps governing expiry
            if let Some(entry) = storage.get_with_timestamp::<T>(key, Some(self.inner.ttl))
                && entry.data.has_data()
            {
                debug!(key, "Local cache hit");
                return Synced::Fresh(entry.data);
            }
        }

        self.begin().await;
        let result = fetch().await;

        let synced = match result {
            Ok(value) => {
                self.inner
                    .cache
                    .insert(key.to_string(), value.clone().into_value())
                    .await;
                if let Err(e) = storage.set_with_timestamp(key, &value) {
                    warn!(key, error = %e, "Failed to write product cache");
                }
                Synced::Fresh(value)
            }
            Err(error) => {
                warn!(key, error = %error, "Product fetch failed");
                match storage
                    .get_with_timestamp::<T>(key, None)
                    .filter(|entry| entry.data.has_data())
                {
                    Some(entry) => Synced::Stale {
                        value: entry.data,
                        error,
                    },
                    None => Synced::Empty { error },
                }
            }
        };

        let mut state = self.inner.state.write().await;
        state.loading = false;
        state.error = synced.error().map(ApiError::user_message);
        synced
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::storage::{LocalStorage, Timestamped};

    const LISTING_KEY: &str = "larkspur_products:all";

    /// A store pointed at a closed port, so every request fails fast.
    fn offline_store(ttl: Duration) -> (ProductStore, LocalStorage) {
        let storage = LocalStorage::in_memory();
        let mut config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9/api").unwrap());
        config.product_cache_ttl = ttl;
        let api = ApiClient::new(&config, storage.clone()).unwrap();
        (ProductStore::new(api, &config), storage)
    }

    fn page() -> ProductPage {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "name": "Linen Shirt",
            "price": 90.0,
        }))
        .unwrap();
        ProductPage {
            products: vec![product],
            pagination: None,
        }
    }

    fn seed(storage: &LocalStorage, age: Duration) {
        let age_ms = i64::try_from(age.as_millis()).unwrap();
        let entry = Timestamped {
            data: page(),
            timestamp: Utc::now().timestamp_millis() - age_ms,
        };
        storage.set(LISTING_KEY, &entry).unwrap();
    }

    #[tokio::test]
    async fn test_expired_listing_still_backs_a_failed_fetch() {
        let (products, storage) = offline_store(Duration::from_secs(3600));
        seed(&storage, Duration::from_secs(2 * 3600));

        let outcome = products.fetch_products(FilterOptions::default(), false).await;

        let Synced::Stale { value, .. } = outcome else {
            panic!("expected the expired listing as a fallback");
        };
        assert_eq!(value.products.len(), 1);
        assert!(storage
            .get_with_timestamp::<ProductPage>(LISTING_KEY, None)
            .is_some());
        assert_eq!(products.state().await.products.len(), 1);
    }

    #[tokio::test]
    async fn test_stored_listing_expires_on_its_own_timestamp() {
        let (products, storage) = offline_store(Duration::from_secs(1));
        seed(&storage, Duration::from_millis(600));

        let first = products.fetch_products(FilterOptions::default(), false).await;
        assert!(first.is_fresh());

        // Past the stored entry's window; a full moka TTL would still report it fresh
        tokio::time::sleep(Duration::from_millis(600)).await;
        let second = products.fetch_products(FilterOptions::default(), false).await;
        assert!(matches!(second, Synced::Stale { .. }));
    }
}
