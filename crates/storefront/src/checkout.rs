//! Checkout: quote arithmetic, shipping form validation, order and
//! payment-intent creation, and payment confirmation.
//!
//! The flow has two steps. [`Checkout::begin`] validates the shipping form,
//! creates a pending order and obtains a payment client secret; the front end
//! hands that secret to the payment processor. When the shopper returns,
//! [`Checkout::complete`] polls the processor and clears the cart only once
//! the payment intent reports `succeeded`.

use std::future::Future;
use std::time::Duration;

use larkspur_core::{
    Address, CartItem, Email, OrderId, PaymentIntentStatus, Price, round_cents,
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::RequestOptions;
use crate::api::endpoints::{orders, payments};
use crate::error::ApiError;
use crate::session::AuthSession;
use crate::stores::CartStore;

/// Sales tax applied to the cart subtotal (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

// =============================================================================
// Quote
// =============================================================================

/// Shipping speed offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
}

impl ShippingMethod {
    /// Flat shipping cost.
    #[must_use]
    pub const fn cost(self) -> Decimal {
        match self {
            Self::Standard => Decimal::from_parts(999, 0, 0, false, 2),
            Self::Express => Decimal::from_parts(1999, 0, 0, false, 2),
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "Standard Shipping",
            Self::Express => "Express Shipping",
        }
    }
}

impl std::str::FromStr for ShippingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "express" => Ok(Self::Express),
            _ => Err(format!("invalid shipping method: {s}")),
        }
    }
}

/// Order totals shown on the checkout summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderQuote {
    /// `total = subtotal + shipping + round_cents(subtotal * TAX_RATE)`.
    #[must_use]
    pub fn compute(subtotal: Decimal, method: ShippingMethod) -> Self {
        let shipping = method.cost();
        let tax = round_cents(subtotal.saturating_mul(TAX_RATE));
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal.saturating_add(shipping).saturating_add(tax),
        }
    }

    #[must_use]
    pub fn total_display(&self) -> String {
        Price::usd(self.total).display()
    }
}

// =============================================================================
// Shipping form
// =============================================================================

/// A single invalid form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Shipping details entered at checkout. Phone is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// A form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidShipping {
    pub email: Email,
    pub address: Address,
}

impl ShippingForm {
    /// Check required fields and the email address.
    ///
    /// # Errors
    ///
    /// Returns every invalid field, in form order.
    pub fn validate(&self) -> Result<ValidShipping, Vec<FieldError>> {
        let mut errors = Vec::new();
        require(&mut errors, "firstName", &self.first_name, "First name");
        require(&mut errors, "lastName", &self.last_name, "Last name");
        let email = if self.email.trim().is_empty() {
            require(&mut errors, "email", &self.email, "Email");
            None
        } else {
            Email::parse(&self.email)
                .map_err(|e| {
                    errors.push(FieldError {
                        field: "email",
                        message: format!("Email is invalid: {e}"),
                    });
                })
                .ok()
        };
        require(&mut errors, "address", &self.address1, "Address");
        require(&mut errors, "city", &self.city, "City");
        require(&mut errors, "state", &self.state, "State");
        require(&mut errors, "postalCode", &self.postal_code, "Postal code");
        require(&mut errors, "country", &self.country, "Country");

        match email {
            Some(email) if errors.is_empty() => Ok(ValidShipping {
                email,
                address: Address {
                    id: None,
                    first_name: self.first_name.trim().to_string(),
                    last_name: self.last_name.trim().to_string(),
                    company: None,
                    address1: self.address1.trim().to_string(),
                    address2: non_blank(self.address2.as_deref()),
                    city: self.city.trim().to_string(),
                    state: self.state.trim().to_string(),
                    postal_code: self.postal_code.trim().to_string(),
                    country: self.country.trim().to_string(),
                    phone: non_blank(self.phone.as_deref()),
                    is_default: false,
                },
            }),
            _ => Err(errors),
        }
    }
}

fn require(errors: &mut Vec<FieldError>, field: &'static str, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError {
            field,
            message: format!("{label} is required"),
        });
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Payment processor seam
// =============================================================================

/// Error reported by a payment processor integration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payment processor error: {0}")]
pub struct ProcessorError(pub String);

/// The hosted payment processor, reduced to the one call checkout needs.
pub trait PaymentProcessor: Send + Sync {
    /// Current status of the payment intent behind `client_secret`.
    fn retrieve_status(
        &self,
        client_secret: &str,
    ) -> impl Future<Output = Result<PaymentIntentStatus, ProcessorError>> + Send;
}

// =============================================================================
// Checkout
// =============================================================================

/// Position in the checkout flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutStep {
    Shipping = 1,
    Payment = 2,
}

impl CheckoutStep {
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Shipping details are invalid: {}", join_fields(.0))]
    InvalidShipping(Vec<FieldError>),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("Payment was not completed: {}", .0.message())]
    PaymentNotCompleted(PaymentIntentStatus),

    #[error("Payment is still processing")]
    PaymentPending,
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A created order waiting for payment.
#[derive(Debug, Clone)]
pub struct PendingPayment {
    pub order_id: OrderId,
    pub client_secret: SecretString,
    pub quote: OrderQuote,
    pub step: CheckoutStep,
}

#[derive(Deserialize)]
struct CreatedOrder {
    id: OrderId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentIntentResponse {
    client_secret: String,
}

/// Checkout flow over the current cart.
#[derive(Debug, Clone)]
pub struct Checkout {
    session: AuthSession,
    cart: CartStore,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl Checkout {
    #[must_use]
    pub const fn new(session: AuthSession, cart: CartStore) -> Self {
        Self {
            session,
            cart,
            poll_attempts: 10,
            poll_interval: Duration::from_secs(2),
        }
    }

    /// Override how long [`Checkout::complete`] waits on a pending payment.
    #[must_use]
    pub const fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    /// Quote the current cart.
    pub async fn quote(&self, method: ShippingMethod) -> OrderQuote {
        OrderQuote::compute(self.cart.total().await, method)
    }

    /// Validate shipping, create the pending order and request a payment
    /// client secret.
    ///
    /// # Errors
    ///
    /// - `EmptyCart` if there is nothing to buy
    /// - `InvalidShipping` with every invalid field
    /// - `Api` if order or payment-intent creation fails
    #[instrument(skip(self, form))]
    pub async fn begin(
        &self,
        form: &ShippingForm,
        method: ShippingMethod,
    ) -> Result<PendingPayment, CheckoutError> {
        let cart = self.cart.state().await;
        if cart.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let shipping = form.validate().map_err(CheckoutError::InvalidShipping)?;
        let quote = OrderQuote::compute(cart.totals.total_amount, method);

        let body = json!({
            "items": cart.items.iter().map(order_line).collect::<Vec<_>>(),
            "shippingCost": quote.shipping,
            "shippingMethod": method,
            "tax": quote.tax,
            "totalAmount": quote.total,
            "email": shipping.email.as_str(),
            "shippingAddress": shipping.address,
        });
        let order: CreatedOrder = self
            .session
            .authenticated_request(orders::CREATE, RequestOptions::post(body))
            .await?;
        info!(order_id = %order.id, total = %quote.total, "Order created");

        let intent: PaymentIntentResponse = self
            .session
            .authenticated_request(
                payments::CREATE_PAYMENT_INTENT,
                RequestOptions::post(json!({ "orderId": order.id })),
            )
            .await?;
        debug!(order_id = %order.id, "Payment intent created");

        Ok(PendingPayment {
            order_id: order.id,
            client_secret: SecretString::from(intent.client_secret),
            quote,
            step: CheckoutStep::Payment,
        })
    }

    /// Confirm the payment after the shopper returns from the processor.
    ///
    /// Polls while the intent is pending. The cart is cleared only when the
    /// status is `succeeded`.
    ///
    /// # Errors
    ///
    /// - `PaymentNotCompleted` for a terminal non-success status
    /// - `PaymentPending` if polling runs out while still pending
    /// - `Processor` if the processor call fails
    #[instrument(skip(self, processor, client_secret))]
    pub async fn complete<P: PaymentProcessor>(
        &self,
        processor: &P,
        client_secret: &SecretString,
    ) -> Result<PaymentIntentStatus, CheckoutError> {
        for attempt in 1..=self.poll_attempts.max(1) {
            let status = processor
                .retrieve_status(client_secret.expose_secret())
                .await?;
            match status {
                PaymentIntentStatus::Succeeded => {
                    info!(attempt, "Payment succeeded, clearing cart");
                    self.cart.clear_cart().await;
                    return Ok(status);
                }
                s if s.is_pending() => {
                    debug!(attempt, status = ?s, "Payment pending");
                    if attempt < self.poll_attempts {
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
                s => {
                    warn!(status = ?s, "Payment not completed");
                    return Err(CheckoutError::PaymentNotCompleted(s));
                }
            }
        }
        Err(CheckoutError::PaymentPending)
    }
}

fn order_line(item: &CartItem) -> serde_json::Value {
    json!({
        "productId": item.product_id,
        "quantity": item.quantity,
        "price": item.price,
        "size": item.size,
        "color": item.color,
    })
}
