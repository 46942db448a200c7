//! Back-office calls: user management and product CRUD.
//!
//! Every call is gated locally on the signed-in user's role before it is
//! sent; the backend still enforces the same rule.

use larkspur_core::{CollectionId, Pagination, Product, ProductId, ProductPage, Role, User, UserId};
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::api::endpoints::{products, users, with_query};
use crate::api::{RequestOptions, unwrap_field};
use crate::config::RetryConfig;
use crate::error::ApiError;
use crate::session::AuthSession;

/// Product form submitted by the back-office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_price: Option<Decimal>,
    pub images: Vec<String>,
    pub stock: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<CollectionId>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub tags: Vec<String>,
    pub is_featured: bool,
}

/// Admin client handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AdminClient {
    session: AuthSession,
    retry: RetryConfig,
}

impl AdminClient {
    #[must_use]
    pub const fn new(session: AuthSession, retry: RetryConfig) -> Self {
        Self { session, retry }
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// All registered users.
    ///
    /// Transient failures are retried with exponential backoff: the first
    /// retry waits `base_delay`, each later one twice as long as the last.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or the first
    /// non-transient error.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.ensure_admin()?;
        let attempts = self.retry.attempts.max(1);
        let mut delay = self.retry.base_delay;
        let mut attempt = 1;
        loop {
            match self.fetch_users().await {
                Ok(users) => {
                    info!(count = users.len(), attempt, "Fetched users");
                    return Ok(users);
                }
                Err(error) if error.is_transient() && attempt < attempts => {
                    warn!(error = %error, attempt, delay_ms = delay.as_millis(), "User listing failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PermissionDenied`] for non-admins, or the backend
    /// error.
    #[instrument(skip(self), fields(user_id = %id, role = %role))]
    pub async fn update_role(&self, id: &UserId, role: Role) -> Result<User, ApiError> {
        self.ensure_admin()?;
        let body: Value = self
            .session
            .authenticated_request(
                &users::update_role(id.as_str()),
                RequestOptions::put(json!({ "role": role })),
            )
            .await?;
        info!("Role updated");
        unwrap_field(body, "user")
    }

    /// # Errors
    ///
    /// Returns [`ApiError::PermissionDenied`] for non-admins, or the backend
    /// error.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: &UserId) -> Result<(), ApiError> {
        self.ensure_admin()?;
        self.session
            .authenticated_request::<Value>(&users::delete(id.as_str()), RequestOptions::delete())
            .await?;
        info!("User deleted");
        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// One page of the full product list, bypassing the shopper cache.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PermissionDenied`] for non-admins, or the backend
    /// error.
    #[instrument(skip(self))]
    pub async fn list_products(&self, page: u32, limit: u32) -> Result<ProductPage, ApiError> {
        self.ensure_admin()?;
        let path = with_query(
            products::LIST,
            [("page", page.to_string()), ("limit", limit.to_string())],
        );
        let mut listing: ProductPage = self
            .session
            .authenticated_request(&path, RequestOptions::get())
            .await?;
        if listing.pagination.is_none() {
            listing.pagination = Some(Pagination {
                page,
                limit,
                ..Pagination::default()
            });
        }
        Ok(listing)
    }

    /// # Errors
    ///
    /// Returns [`ApiError::PermissionDenied`] for non-admins, or the backend
    /// error.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ApiError> {
        self.ensure_admin()?;
        let body: Value = self
            .session
            .authenticated_request(products::CREATE, RequestOptions::json(Method::POST, product)?)
            .await?;
        let created: Product = unwrap_field(body, "product")?;
        info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns [`ApiError::PermissionDenied`] for non-admins, or the backend
    /// error.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), ApiError> {
        self.ensure_admin()?;
        self.session
            .authenticated_request::<Value>(&products::delete(id.as_str()), RequestOptions::delete())
            .await?;
        info!("Product deleted");
        Ok(())
    }

    async fn fetch_users(&self) -> Result<Vec<User>, ApiError> {
        let body: Value = self
            .session
            .authenticated_request(users::LIST, RequestOptions::get())
            .await?;
        unwrap_field(body, "users")
    }

    fn ensure_admin(&self) -> Result<(), ApiError> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(ApiError::PermissionDenied(
                "admin role required".to_string(),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::api::ApiClient;
    use crate::config::StorefrontConfig;
    use crate::storage::LocalStorage;

    #[tokio::test]
    async fn test_signed_out_calls_are_denied_locally() {
        let config = StorefrontConfig::new(Url::parse("http://127.0.0.1:9/api").unwrap());
        let api = ApiClient::new(&config, LocalStorage::in_memory()).unwrap();
        let admin = AdminClient::new(AuthSession::new(api), RetryConfig::default());

        let error = admin.list_users().await.unwrap_err();
        assert_eq!(error.status(), Some(403));
        assert!(matches!(
            admin.delete_product(&ProductId::new("p1")).await,
            Err(ApiError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_new_product_wire_shape() {
        let product = NewProduct {
            name: "Linen Shirt".into(),
            price: Decimal::new(9000, 2),
            stock: 4,
            ..NewProduct::default()
        };
        let body = serde_json::to_value(&product).unwrap();
        assert_eq!(body["name"], "Linen Shirt");
        assert_eq!(body["price"], 90.0);
        assert_eq!(body["isFeatured"], false);
        assert!(body.get("comparePrice").is_none());
    }
}
