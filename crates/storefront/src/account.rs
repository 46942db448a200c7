//! Account services: order history, saved addresses, reviews and feedback.
//!
//! Everything except the featured feedback list runs through
//! [`AuthSession::authenticated_request`], so an expired session is cleared
//! the same way it is for the stores.

use larkspur_core::{Address, AddressId, Feedback, Order, OrderId, ProductId};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument};

use crate::api::endpoints::{addresses, feedback, orders, reviews};
use crate::api::{RequestOptions, unwrap_field};
use crate::error::ApiError;
use crate::session::AuthSession;

/// Lowest accepted star rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted star rating.
pub const MAX_RATING: u8 = 5;

/// Errors from account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Rating must be between {MIN_RATING} and {MAX_RATING}, got {0}")]
    InvalidRating(u8),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A product review before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDraft {
    pub product_id: ProductId,
    pub rating: u8,
    pub comment: String,
}

impl ReviewDraft {
    /// Check the draft locally before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidRating`] or [`AccountError::EmptyField`].
    pub fn validate(&self) -> Result<(), AccountError> {
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(AccountError::InvalidRating(self.rating));
        }
        if self.comment.trim().is_empty() {
            return Err(AccountError::EmptyField("comment"));
        }
        Ok(())
    }
}

/// Account service handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Account {
    session: AuthSession,
}

impl Account {
    #[must_use]
    pub const fn new(session: AuthSession) -> Self {
        Self { session }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Orders placed by the current user, newest first as the backend sends them.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<Order>, ApiError> {
        let body: Value = self
            .session
            .authenticated_request(orders::LIST, RequestOptions::get())
            .await?;
        unwrap_field(body, "orders")
    }

    /// A single order.
    ///
    /// # Errors
    ///
    /// Returns the backend error, typically 404 for someone else's order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order(&self, id: &OrderId) -> Result<Order, ApiError> {
        let body: Value = self
            .session
            .authenticated_request(&orders::by_id(id.as_str()), RequestOptions::get())
            .await?;
        unwrap_field(body, "order")
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn addresses(&self) -> Result<Vec<Address>, ApiError> {
        let body: Value = self
            .session
            .authenticated_request(addresses::LIST, RequestOptions::get())
            .await?;
        unwrap_field(body, "addresses")
    }

    /// Save a new address. The returned copy carries the server id.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self, address))]
    pub async fn create_address(&self, address: &Address) -> Result<Address, ApiError> {
        let body: Value = self
            .session
            .authenticated_request(
                addresses::CREATE,
                RequestOptions::json(reqwest::Method::POST, address)?,
            )
            .await?;
        let created: Address = unwrap_field(body, "address")?;
        info!(address_id = ?created.id, "Address created");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self, address), fields(address_id = %id))]
    pub async fn update_address(&self, id: &AddressId, address: &Address) -> Result<Address, ApiError> {
        let body: Value = self
            .session
            .authenticated_request(
                &addresses::by_id(id.as_str()),
                RequestOptions::json(reqwest::Method::PUT, address)?,
            )
            .await?;
        unwrap_field(body, "address")
    }

    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete_address(&self, id: &AddressId) -> Result<(), ApiError> {
        self.session
            .authenticated_request::<Value>(&addresses::by_id(id.as_str()), RequestOptions::delete())
            .await?;
        info!("Address deleted");
        Ok(())
    }

    // =========================================================================
    // Reviews and feedback
    // =========================================================================

    /// Validate and submit a product review.
    ///
    /// # Errors
    ///
    /// Returns a validation error without contacting the backend, or the
    /// backend error.
    #[instrument(skip(self, draft), fields(product_id = %draft.product_id, rating = draft.rating))]
    pub async fn submit_review(&self, draft: &ReviewDraft) -> Result<(), AccountError> {
        draft.validate()?;
        let body = json!({
            "productId": draft.product_id,
            "rating": draft.rating,
            "comment": draft.comment.trim(),
        });
        self.session
            .authenticated_request::<Value>(reviews::CREATE, RequestOptions::post(body))
            .await?;
        info!("Review submitted");
        Ok(())
    }

    /// Featured testimonials. Public; no session required.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub async fn featured_feedback(&self) -> Result<Vec<Feedback>, ApiError> {
        let body: Value = self
            .session
            .api()
            .request(feedback::FEATURED, RequestOptions::get())
            .await?;
        unwrap_field(body, "feedbacks")
    }

    /// Send free-form storefront feedback.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::EmptyField`] for a blank message, or the
    /// backend error.
    #[instrument(skip(self, message))]
    pub async fn submit_feedback(&self, message: &str) -> Result<(), AccountError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AccountError::EmptyField("message"));
        }
        self.session
            .authenticated_request::<Value>(feedback::CREATE, RequestOptions::post(json!({ "message": message })))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(rating: u8, comment: &str) -> ReviewDraft {
        ReviewDraft {
            product_id: ProductId::new("p1"),
            rating,
            comment: comment.to_string(),
        }
    }

    #[test]
    fn test_review_rating_bounds() {
        assert!(draft(1, "ok").validate().is_ok());
        assert!(draft(5, "great").validate().is_ok());
        assert!(matches!(
            draft(0, "meh").validate(),
            Err(AccountError::InvalidRating(0))
        ));
        assert!(matches!(
            draft(6, "wow").validate(),
            Err(AccountError::InvalidRating(6))
        ));
    }

    #[test]
    fn test_review_requires_comment() {
        assert!(matches!(
            draft(4, "   ").validate(),
            Err(AccountError::EmptyField("comment"))
        ));
    }
}
