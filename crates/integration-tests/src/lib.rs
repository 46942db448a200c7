//! Integration tests for the Larkspur storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p larkspur-integration-tests
//! ```
//!
//! Each test starts its own [`MockBackend`]: an in-process axum server bound
//! to `127.0.0.1:0` that speaks the backend REST contract, keeps its data in
//! memory and counts the calls tests care about. Nothing external is needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use larkspur_core::Email;
use larkspur_storefront::config::{RetryConfig, StorefrontConfig};
use larkspur_storefront::storage::LocalStorage;
use larkspur_storefront::{InitError, Storefront};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

/// Password every seeded account accepts.
pub const PASSWORD: &str = "secret";
/// Seeded shopper account.
pub const SHOPPER_EMAIL: &str = "ada@example.com";
/// Seeded admin account.
pub const ADMIN_EMAIL: &str = "grace@example.com";

type Reply = (StatusCode, Json<Value>);
type Shared = Arc<MockState>;

// =============================================================================
// MockBackend
// =============================================================================

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    addr: SocketAddr,
    state: Shared,
}

impl MockBackend {
    /// Bind an ephemeral port and serve the mock API on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(MockState::seeded());
        let app = router(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, state })
    }

    /// API base URL, including the `/api` prefix.
    #[must_use]
    pub fn api_url(&self) -> Url {
        let raw = format!("http://{}/api", self.addr);
        Url::parse(&raw).unwrap_or_else(|_| unreachable!("socket address forms a valid URL"))
    }

    /// Client configuration with timings shortened for tests.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let mut config = StorefrontConfig::new(self.api_url());
        config.request_timeout = Duration::from_secs(5);
        config.search_debounce = Duration::from_millis(50);
        config.health_check_interval = Duration::ZERO;
        config.admin_retry = RetryConfig {
            attempts: 3,
            base_delay: Duration::from_millis(10),
        };
        config
    }

    /// A fresh client with in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn storefront(&self) -> Result<Storefront, InitError> {
        self.storefront_with(LocalStorage::in_memory())
    }

    /// A client over existing storage, as after an app restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn storefront_with(&self, storage: LocalStorage) -> Result<Storefront, InitError> {
        Storefront::with_storage(self.config(), storage)
    }

    /// A fresh client logged in as one of the seeded accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or login fails.
    pub async fn signed_in(&self, email: &str) -> Result<Storefront, Box<dyn std::error::Error>> {
        let storefront = self.storefront()?;
        storefront
            .session()
            .login(&Email::parse(email)?, &SecretString::from(PASSWORD))
            .await?;
        Ok(storefront)
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Answer every request, health check included, with 503.
    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// Invalidate the issued access token; the next authenticated call gets 401.
    pub fn expire_access_token(&self) {
        let mut data = self.state.data();
        data.token_serial += 1;
        data.token = Some(format!("expired-{}", data.token_serial));
    }

    /// Whether `POST /auth/refresh` issues a new token.
    pub fn set_refresh_enabled(&self, enabled: bool) {
        self.state.refresh_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Make searches answer 503 after `delay`; `None` restores normal searches.
    pub fn set_failing_searches(&self, delay: Option<Duration>) {
        let delay_ms = delay.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self.state.search_failure_delay_ms.store(delay_ms, Ordering::SeqCst);
        self.state.fail_searches.store(delay.is_some(), Ordering::SeqCst);
    }

    /// Fail the next `n` user listings with 503.
    pub fn fail_next_user_lists(&self, n: usize) {
        self.state.user_list_failures.store(n, Ordering::SeqCst);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// `GET /products` calls carrying a `search` parameter.
    #[must_use]
    pub fn search_calls(&self) -> usize {
        self.state.search_calls.load(Ordering::SeqCst)
    }

    /// `GET /products` calls without a `search` parameter.
    #[must_use]
    pub fn product_list_calls(&self) -> usize {
        self.state.product_list_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn user_list_calls(&self) -> usize {
        self.state.user_list_calls.load(Ordering::SeqCst)
    }

    /// Body of the most recent `POST /orders`.
    #[must_use]
    pub fn last_order_request(&self) -> Option<Value> {
        self.state.data().last_order_request.clone()
    }

    /// Backend-side cart lines as `(product id, quantity)`.
    #[must_use]
    pub fn cart_lines(&self) -> Vec<(String, u32)> {
        self.state
            .data()
            .cart
            .iter()
            .map(|line| (line.product_id.clone(), line.quantity))
            .collect()
    }

    /// Role of a seeded user as the backend stores it.
    #[must_use]
    pub fn user_role(&self, id: &str) -> Option<String> {
        self.state
            .data()
            .users
            .iter()
            .find(|u| u["id"] == id)
            .and_then(|u| u["role"].as_str().map(str::to_string))
    }
}

// =============================================================================
// State
// =============================================================================

struct MockState {
    data: Mutex<Data>,
    offline: AtomicBool,
    refresh_enabled: AtomicBool,
    fail_searches: AtomicBool,
    search_failure_delay_ms: AtomicU64,
    user_list_failures: AtomicUsize,
    refresh_calls: AtomicUsize,
    search_calls: AtomicUsize,
    product_list_calls: AtomicUsize,
    user_list_calls: AtomicUsize,
}

struct CartLine {
    id: String,
    product_id: String,
    quantity: u32,
    size: Option<String>,
    color: Option<String>,
}

#[derive(Default)]
struct Data {
    token: Option<String>,
    token_serial: u32,
    session_user: Option<String>,
    next_id: u32,
    users: Vec<Value>,
    products: Vec<Value>,
    collections: Vec<Value>,
    cart: Vec<CartLine>,
    wishlist: Vec<String>,
    orders: Vec<Value>,
    addresses: Vec<Value>,
    reviews: Vec<Value>,
    feedback: Vec<Value>,
    last_order_request: Option<Value>,
}

impl MockState {
    fn seeded() -> Self {
        let data = Data {
            users: vec![
                json!({ "id": "u1", "email": SHOPPER_EMAIL, "firstName": "Ada", "lastName": "Lovelace", "role": "USER", "isVerified": true }),
                json!({ "id": "u2", "email": ADMIN_EMAIL, "firstName": "Grace", "lastName": "Hopper", "role": "ADMIN", "isVerified": true }),
            ],
            products: vec![
                product("p1", "Linen Shirt", 90.0, None, "Shirts"),
                product("p2", "Silk Scarf", 45.0, Some(60.0), "Accessories"),
                product("p3", "Wool Coat", 180.0, None, "Outerwear"),
                product("p4", "Linen Trousers", 120.0, None, "Trousers"),
            ],
            collections: vec![
                json!({ "id": "c1", "name": "Summer", "description": "Light layers", "isActive": true }),
            ],
            feedback: vec![
                json!({ "id": "f1", "message": "Lovely fabrics", "user": { "firstName": "Ada", "lastName": "Lovelace" } }),
            ],
            ..Data::default()
        };
        Self {
            data: Mutex::new(data),
            offline: AtomicBool::new(false),
            refresh_enabled: AtomicBool::new(true),
            fail_searches: AtomicBool::new(false),
            search_failure_delay_ms: AtomicU64::new(0),
            user_list_failures: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            product_list_calls: AtomicUsize::new(0),
            user_list_calls: AtomicUsize::new(0),
        }
    }

    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Data {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn issue_token(&mut self) -> String {
        self.token_serial += 1;
        let token = format!("token-{}", self.token_serial);
        self.token = Some(token.clone());
        token
    }

    fn product(&self, id: &str) -> Option<&Value> {
        self.products.iter().find(|p| p["id"] == id)
    }

    fn current_user(&self) -> Option<&Value> {
        let id = self.session_user.as_deref()?;
        self.users.iter().find(|u| u["id"] == id)
    }

    fn add_to_cart(&mut self, product_id: &str, quantity: u32, size: Option<String>, color: Option<String>) {
        if let Some(line) = self
            .cart
            .iter_mut()
            .find(|l| l.product_id == product_id && l.size == size && l.color == color)
        {
            line.quantity += quantity;
            return;
        }
        let id = self.next_id("ci");
        self.cart.push(CartLine {
            id,
            product_id: product_id.to_string(),
            quantity,
            size,
            color,
        });
    }

    fn cart_json(&self) -> Value {
        let mut total = 0.0;
        let mut count = 0;
        let items: Vec<Value> = self
            .cart
            .iter()
            .map(|line| {
                let product = self.product(&line.product_id);
                let price = product.and_then(|p| p["price"].as_f64()).unwrap_or_default();
                let subtotal = price * f64::from(line.quantity);
                total += subtotal;
                count += line.quantity;
                json!({
                    "id": line.id,
                    "productId": line.product_id,
                    "name": product.map_or(Value::Null, |p| p["name"].clone()),
                    "price": price,
                    "quantity": line.quantity,
                    "size": line.size,
                    "color": line.color,
                    "subtotal": subtotal,
                })
            })
            .collect();
        json!({ "items": items, "itemCount": count, "total": total })
    }

    fn wishlist_json(&self) -> Value {
        let items: Vec<Value> = self
            .wishlist
            .iter()
            .map(|product_id| {
                json!({
                    "id": format!("wi-{product_id}"),
                    "productId": product_id,
                    "product": self.product(product_id),
                    "addedAt": "2024-05-01T12:00:00Z",
                })
            })
            .collect();
        json!({ "items": items })
    }
}

fn product(id: &str, name: &str, price: f64, compare: Option<f64>, kind: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "price": price,
        "comparePrice": compare,
        "images": [format!("/images/{id}.jpg")],
        "stock": 10,
        "sizes": ["S", "M", "L"],
        "colors": ["black", "white"],
        "type": kind,
        "collectionId": "c1",
        "avgRating": 4.5,
        "reviewCount": 12,
    })
}

// =============================================================================
// Router
// =============================================================================

fn router(state: Shared) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        // Auth
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/auth/verify", get(verify))
        .route("/auth/profile", get(verify))
        // Catalog
        .route("/products", get(list_products).post(create_product))
        .route("/products/featured", get(featured))
        .route("/products/{id}", get(show_product).delete(delete_product))
        .route("/search/suggestions", get(suggestions))
        .route("/filter-options", get(filter_options))
        .route("/collections", get(collections))
        .route("/collections/{key}", get(show_collection))
        .route("/collections/{key}/products", get(collection_products))
        // Cart
        .route("/cart", get(show_cart))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/item/{id}", put(update_cart_item).delete(remove_cart_item))
        .route("/cart/clear", delete(clear_cart))
        // Wishlist
        .route("/wishlist", get(show_wishlist))
        .route("/wishlist/add", post(add_to_wishlist))
        .route("/wishlist/remove/{id}", delete(remove_from_wishlist))
        .route("/wishlist/clear", delete(clear_wishlist))
        .route("/wishlist/check/{id}", get(check_wishlist))
        .route("/wishlist/move-to-cart/{id}", post(move_to_cart))
        // Orders and payments
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(show_order))
        .route("/payments/create-payment-intent", post(create_payment_intent))
        // Account
        .route("/addresses", get(list_addresses).post(create_address))
        .route("/addresses/{id}", put(update_address).delete(delete_address))
        .route("/reviews", post(create_review))
        .route("/feedback/featured", get(featured_feedback))
        .route("/feedback", post(create_feedback))
        // Admin
        .route("/users", get(list_users))
        .route("/users/{id}", delete(delete_user))
        .route("/users/{id}/role", put(update_role));

    Router::new()
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(Arc::clone(&state), gate))
        .with_state(state)
}

async fn gate(State(state): State<Shared>, request: Request, next: Next) -> Response {
    if state.offline.load(Ordering::SeqCst) {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response();
    }
    next.run(request).await
}

// =============================================================================
// Helpers
// =============================================================================

fn ok(body: Value) -> Reply {
    (StatusCode::OK, Json(body))
}

fn error(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "message": message })))
}

fn not_found() -> Reply {
    error(StatusCode::NOT_FOUND, "Not found")
}

/// Check the bearer token against the one currently issued.
fn authorize(data: &Data, headers: &HeaderMap) -> Result<(), Reply> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match (presented, data.token.as_deref()) {
        (Some(presented), Some(issued)) if presented == issued => Ok(()),
        _ => Err(error(StatusCode::UNAUTHORIZED, "Invalid or expired token")),
    }
}

fn authorize_admin(data: &Data, headers: &HeaderMap) -> Result<(), Reply> {
    authorize(data, headers)?;
    let is_admin = data
        .current_user()
        .is_some_and(|u| matches!(u["role"].as_str(), Some("ADMIN" | "SUPER_ADMIN")));
    if is_admin {
        Ok(())
    } else {
        Err(error(StatusCode::FORBIDDEN, "Admin access required"))
    }
}

macro_rules! guard {
    ($check:expr) => {
        if let Err(reply) = $check {
            return reply;
        }
    };
}

// =============================================================================
// Handlers: auth
// =============================================================================

async fn health() -> Reply {
    ok(json!({ "status": "ok" }))
}

fn sign_in(data: &mut Data, user_id: &str) -> Response {
    data.session_user = Some(user_id.to_string());
    let token = data.issue_token();
    let user = data.current_user().cloned().unwrap_or(Value::Null);
    (
        [(header::SET_COOKIE, "refreshToken=rt; Path=/api/auth; HttpOnly")],
        Json(json!({ "accessToken": token, "user": user })),
    )
        .into_response()
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut data = state.data();
    let user_id = data
        .users
        .iter()
        .find(|u| u["email"] == body["email"])
        .and_then(|u| u["id"].as_str().map(str::to_string));
    match user_id {
        Some(id) if body["password"] == PASSWORD => sign_in(&mut data, &id),
        _ => error(StatusCode::UNAUTHORIZED, "Invalid email or password").into_response(),
    }
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut data = state.data();
    if data.users.iter().any(|u| u["email"] == body["email"]) {
        return error(StatusCode::CONFLICT, "Email already registered").into_response();
    }
    let id = data.next_id("u");
    data.users.push(json!({
        "id": id,
        "email": body["email"],
        "firstName": body["firstName"],
        "lastName": body["lastName"],
        "phone": body["phone"],
        "role": "USER",
        "isVerified": false,
    }));
    sign_in(&mut data, &id)
}

async fn logout(State(state): State<Shared>) -> Reply {
    let mut data = state.data();
    data.token = None;
    data.session_user = None;
    ok(json!({ "message": "Logged out" }))
}

async fn refresh(State(state): State<Shared>) -> Reply {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let mut data = state.data();
    if !state.refresh_enabled.load(Ordering::SeqCst) || data.session_user.is_none() {
        return error(StatusCode::UNAUTHORIZED, "Refresh token invalid");
    }
    let token = data.issue_token();
    ok(json!({ "accessToken": token }))
}

async fn verify(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let data = state.data();
    guard!(authorize(&data, &headers));
    ok(json!({ "user": data.current_user() }))
}

// =============================================================================
// Handlers: catalog
// =============================================================================

async fn list_products(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    if params.contains_key("search") && state.fail_searches.load(Ordering::SeqCst) {
        let delay = state.search_failure_delay_ms.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        return error(StatusCode::SERVICE_UNAVAILABLE, "Search index unavailable");
    }
    let data = state.data();
    let products: Vec<&Value> = match params.get("search") {
        Some(term) => {
            state.search_calls.fetch_add(1, Ordering::SeqCst);
            let term = term.to_lowercase();
            data.products
                .iter()
                .filter(|p| p["name"].as_str().is_some_and(|n| n.to_lowercase().contains(&term)))
                .collect()
        }
        None => {
            state.product_list_calls.fetch_add(1, Ordering::SeqCst);
            data.products.iter().collect()
        }
    };
    let total = products.len();
    ok(json!({
        "products": products,
        "pagination": { "page": 1, "limit": 20, "total": total, "pages": 1 },
    }))
}

async fn featured(State(state): State<Shared>, Query(params): Query<HashMap<String, String>>) -> Reply {
    let limit = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(8);
    let data = state.data();
    let products: Vec<&Value> = data.products.iter().take(limit).collect();
    ok(json!({ "products": products }))
}

async fn show_product(State(state): State<Shared>, Path(id): Path<String>) -> Reply {
    state.data().product(&id).cloned().map_or_else(not_found, ok)
}

async fn create_product(State(state): State<Shared>, headers: HeaderMap, Json(mut body): Json<Value>) -> Reply {
    let mut data = state.data();
    guard!(authorize_admin(&data, &headers));
    let id = data.next_id("p");
    body["id"] = json!(id);
    data.products.push(body.clone());
    (StatusCode::CREATED, Json(json!({ "product": body })))
}

async fn delete_product(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let mut data = state.data();
    guard!(authorize_admin(&data, &headers));
    data.products.retain(|p| p["id"] != id.as_str());
    ok(json!({ "message": "Product deleted" }))
}

async fn suggestions(State(state): State<Shared>, Query(params): Query<HashMap<String, String>>) -> Reply {
    let term = params.get("q").map(|q| q.to_lowercase()).unwrap_or_default();
    let data = state.data();
    let names: Vec<&Value> = data
        .products
        .iter()
        .map(|p| &p["name"])
        .filter(|n| n.as_str().is_some_and(|n| n.to_lowercase().contains(&term)))
        .collect();
    ok(json!({ "suggestions": names }))
}

async fn filter_options() -> Reply {
    ok(json!({
        "filters": [
            { "title": "Size", "key": "size", "options": [
                { "label": "Small", "value": "S" },
                { "label": "Medium", "value": "M" },
                { "label": "Large", "value": "L" },
            ]},
            { "title": "Color", "key": "color", "options": [
                { "label": "Black", "value": "black" },
                { "label": "White", "value": "white" },
            ]},
        ]
    }))
}

async fn collections(State(state): State<Shared>) -> Reply {
    ok(json!({ "collections": state.data().collections }))
}

fn find_collection<'a>(data: &'a Data, key: &str) -> Option<&'a Value> {
    data.collections
        .iter()
        .find(|c| c["id"] == key || c["name"].as_str().is_some_and(|n| n.eq_ignore_ascii_case(key)))
}

async fn show_collection(State(state): State<Shared>, Path(key): Path<String>) -> Reply {
    let data = state.data();
    find_collection(&data, &key).cloned().map_or_else(not_found, ok)
}

async fn collection_products(State(state): State<Shared>, Path(key): Path<String>) -> Reply {
    let data = state.data();
    let Some(id) = find_collection(&data, &key).map(|c| c["id"].clone()) else {
        return not_found();
    };
    let products: Vec<&Value> = data.products.iter().filter(|p| p["collectionId"] == id).collect();
    ok(json!({ "products": products }))
}

// =============================================================================
// Handlers: cart and wishlist
// =============================================================================

async fn show_cart(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let data = state.data();
    guard!(authorize(&data, &headers));
    ok(data.cart_json())
}

async fn add_to_cart(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    let Some(product_id) = body["productId"].as_str().map(str::to_string) else {
        return error(StatusCode::BAD_REQUEST, "productId is required");
    };
    if data.product(&product_id).is_none() {
        return error(StatusCode::NOT_FOUND, "Product not found");
    }
    let quantity = body["quantity"]
        .as_u64()
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(1);
    let size = body["size"].as_str().map(str::to_string);
    let color = body["color"].as_str().map(str::to_string);
    data.add_to_cart(&product_id, quantity, size, color);
    ok(data.cart_json())
}

async fn update_cart_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    let quantity = body["quantity"]
        .as_u64()
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(1);
    let Some(line) = data.cart.iter_mut().find(|l| l.id == id) else {
        return not_found();
    };
    line.quantity = quantity;
    ok(data.cart_json())
}

async fn remove_cart_item(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    data.cart.retain(|l| l.id != id);
    ok(data.cart_json())
}

async fn clear_cart(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    data.cart.clear();
    ok(data.cart_json())
}

async fn show_wishlist(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let data = state.data();
    guard!(authorize(&data, &headers));
    ok(data.wishlist_json())
}

async fn add_to_wishlist(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    let Some(product_id) = body["productId"].as_str().map(str::to_string) else {
        return error(StatusCode::BAD_REQUEST, "productId is required");
    };
    if !data.wishlist.contains(&product_id) {
        data.wishlist.push(product_id);
    }
    ok(data.wishlist_json())
}

async fn remove_from_wishlist(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    data.wishlist.retain(|p| *p != id);
    ok(data.wishlist_json())
}

async fn clear_wishlist(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    data.wishlist.clear();
    ok(data.wishlist_json())
}

async fn check_wishlist(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let data = state.data();
    guard!(authorize(&data, &headers));
    ok(json!({ "inWishlist": data.wishlist.contains(&id) }))
}

async fn move_to_cart(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    if !data.wishlist.contains(&id) {
        return error(StatusCode::NOT_FOUND, "Product not in wishlist");
    }
    data.wishlist.retain(|p| *p != id);
    data.add_to_cart(&id, 1, None, None);
    ok(json!({ "message": "Moved to cart" }))
}

// =============================================================================
// Handlers: orders and payments
// =============================================================================

async fn create_order(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    let id = data.next_id("o");
    let order = json!({
        "id": id,
        "orderNumber": format!("LS-{id}"),
        "status": "PENDING",
        "paymentStatus": "PENDING",
        "shipping": body["shippingCost"],
        "tax": body["tax"],
        "total": body["totalAmount"],
        "shippingAddress": body["shippingAddress"],
        "items": [],
    });
    data.orders.push(order.clone());
    data.last_order_request = Some(body);
    (StatusCode::CREATED, Json(order))
}

async fn list_orders(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let data = state.data();
    guard!(authorize(&data, &headers));
    ok(json!({ "orders": data.orders }))
}

async fn show_order(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let data = state.data();
    guard!(authorize(&data, &headers));
    data.orders
        .iter()
        .find(|o| o["id"] == id.as_str())
        .map_or_else(not_found, |order| ok(json!({ "order": order })))
}

async fn create_payment_intent(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let data = state.data();
    guard!(authorize(&data, &headers));
    let Some(order_id) = body["orderId"].as_str() else {
        return error(StatusCode::BAD_REQUEST, "orderId is required");
    };
    ok(json!({ "clientSecret": format!("pi_{order_id}_secret") }))
}

// =============================================================================
// Handlers: account
// =============================================================================

async fn list_addresses(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let data = state.data();
    guard!(authorize(&data, &headers));
    ok(json!({ "addresses": data.addresses }))
}

async fn create_address(State(state): State<Shared>, headers: HeaderMap, Json(mut body): Json<Value>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    let id = data.next_id("a");
    body["id"] = json!(id);
    data.addresses.push(body.clone());
    (StatusCode::CREATED, Json(json!({ "address": body })))
}

async fn update_address(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    let Some(slot) = data.addresses.iter_mut().find(|a| a["id"] == id.as_str()) else {
        return not_found();
    };
    body["id"] = json!(id);
    slot.clone_from(&body);
    ok(json!({ "address": body }))
}

async fn delete_address(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    data.addresses.retain(|a| a["id"] != id.as_str());
    ok(json!({ "message": "Address deleted" }))
}

async fn create_review(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    data.reviews.push(body);
    (StatusCode::CREATED, Json(json!({ "message": "Review created" })))
}

async fn featured_feedback(State(state): State<Shared>) -> Reply {
    ok(json!(state.data().feedback))
}

async fn create_feedback(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let mut data = state.data();
    guard!(authorize(&data, &headers));
    let id = data.next_id("f");
    data.feedback.push(json!({ "id": id, "message": body["message"] }));
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

// =============================================================================
// Handlers: admin
// =============================================================================

async fn list_users(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    state.user_list_calls.fetch_add(1, Ordering::SeqCst);
    let failing = state
        .user_list_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Database busy");
    }
    let data = state.data();
    guard!(authorize_admin(&data, &headers));
    ok(json!({ "users": data.users }))
}

async fn update_role(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut data = state.data();
    guard!(authorize_admin(&data, &headers));
    let Some(user) = data.users.iter_mut().find(|u| u["id"] == id.as_str()) else {
        return not_found();
    };
    user["role"] = body["role"].clone();
    ok(json!({ "user": user }))
}

async fn delete_user(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    let mut data = state.data();
    guard!(authorize_admin(&data, &headers));
    data.users.retain(|u| u["id"] != id.as_str());
    ok(json!({ "message": "User deleted" }))
}
