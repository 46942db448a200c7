//! Checkout flow against the mock backend with a scripted payment processor.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use larkspur_core::{LineOptions, PaymentIntentStatus, ProductId};
use larkspur_integration_tests::{MockBackend, SHOPPER_EMAIL};
use larkspur_storefront::checkout::{
    CheckoutError, CheckoutStep, PaymentProcessor, ProcessorError, ShippingForm, ShippingMethod,
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;

/// Processor that replays a fixed sequence of statuses.
struct ScriptedProcessor {
    statuses: Mutex<VecDeque<PaymentIntentStatus>>,
}

impl ScriptedProcessor {
    fn new(statuses: impl IntoIterator<Item = PaymentIntentStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
        }
    }

    fn remaining(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }
}

impl PaymentProcessor for ScriptedProcessor {
    async fn retrieve_status(
        &self,
        _client_secret: &str,
    ) -> Result<PaymentIntentStatus, ProcessorError> {
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProcessorError("no status scripted".into()))
    }
}

fn shipping() -> ShippingForm {
    ShippingForm {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: SHOPPER_EMAIL.into(),
        phone: Some("555-0100".into()),
        address1: "12 Analytical Way".into(),
        address2: None,
        city: "London".into(),
        state: "LDN".into(),
        postal_code: "N1 9GU".into(),
        country: "UK".into(),
    }
}

#[tokio::test]
async fn test_successful_payment_places_order_and_clears_cart() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    storefront
        .cart()
        .add_to_cart(&ProductId::new("p3"), 2, LineOptions::none())
        .await;
    let checkout = storefront
        .checkout()
        .clone()
        .with_polling(5, Duration::from_millis(1));

    let quote = checkout.quote(ShippingMethod::Standard).await;
    assert_eq!(quote.total, Decimal::new(39879, 2));

    let pending = checkout
        .begin(&shipping(), ShippingMethod::Standard)
        .await
        .unwrap();
    assert_eq!(pending.step, CheckoutStep::Payment);
    assert_eq!(pending.quote, quote);
    assert!(pending.client_secret.expose_secret().starts_with("pi_"));

    let request = backend.last_order_request().unwrap();
    assert_eq!(request["items"].as_array().unwrap().len(), 1);
    assert_eq!(request["items"][0]["quantity"], 2);
    assert_eq!(request["shippingMethod"], "standard");
    assert_eq!(request["totalAmount"].as_f64(), Some(398.79));
    assert_eq!(request["shippingAddress"]["city"], "London");

    let processor = ScriptedProcessor::new([
        PaymentIntentStatus::Processing,
        PaymentIntentStatus::Succeeded,
    ]);
    let status = checkout
        .complete(&processor, &pending.client_secret)
        .await
        .unwrap();

    assert_eq!(status, PaymentIntentStatus::Succeeded);
    assert_eq!(processor.remaining(), 0);
    assert!(backend.cart_lines().is_empty());
    assert_eq!(storefront.cart().item_count().await, 0);
}

#[tokio::test]
async fn test_declined_payment_keeps_cart() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    storefront
        .cart()
        .add_to_cart(&ProductId::new("p1"), 1, LineOptions::none())
        .await;
    let checkout = storefront.checkout();

    let pending = checkout
        .begin(&shipping(), ShippingMethod::Express)
        .await
        .unwrap();
    let processor = ScriptedProcessor::new([PaymentIntentStatus::RequiresPaymentMethod]);
    let error = checkout
        .complete(&processor, &pending.client_secret)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        CheckoutError::PaymentNotCompleted(PaymentIntentStatus::RequiresPaymentMethod)
    ));
    assert_eq!(backend.cart_lines(), vec![("p1".to_string(), 1)]);
    assert_eq!(storefront.cart().item_count().await, 1);
}

#[tokio::test]
async fn test_payment_still_processing_after_polling() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    storefront
        .cart()
        .add_to_cart(&ProductId::new("p2"), 1, LineOptions::none())
        .await;
    let checkout = storefront
        .checkout()
        .clone()
        .with_polling(2, Duration::from_millis(1));

    let pending = checkout
        .begin(&shipping(), ShippingMethod::Standard)
        .await
        .unwrap();
    let processor = ScriptedProcessor::new([
        PaymentIntentStatus::Processing,
        PaymentIntentStatus::RequiresAction,
        PaymentIntentStatus::Succeeded,
    ]);
    let error = checkout
        .complete(&processor, &pending.client_secret)
        .await
        .unwrap_err();

    assert!(matches!(error, CheckoutError::PaymentPending));
    assert_eq!(processor.remaining(), 1);
    assert_eq!(storefront.cart().item_count().await, 1);
}

#[tokio::test]
async fn test_empty_cart_cannot_check_out() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();

    let error = storefront
        .checkout()
        .begin(&shipping(), ShippingMethod::Standard)
        .await
        .unwrap_err();

    assert!(matches!(error, CheckoutError::EmptyCart));
    assert!(backend.last_order_request().is_none());
}

#[tokio::test]
async fn test_invalid_shipping_creates_no_order() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    storefront
        .cart()
        .add_to_cart(&ProductId::new("p1"), 1, LineOptions::none())
        .await;

    let form = ShippingForm {
        postal_code: String::new(),
        ..shipping()
    };
    let error = storefront
        .checkout()
        .begin(&form, ShippingMethod::Standard)
        .await
        .unwrap_err();

    let CheckoutError::InvalidShipping(fields) = error else {
        panic!("expected a validation failure");
    };
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].field, "postalCode");
    assert!(backend.last_order_request().is_none());
}
