//! Account services against the mock backend.

#![allow(clippy::unwrap_used)]

use larkspur_core::{Address, LineOptions, OrderStatus, ProductId};
use larkspur_integration_tests::{MockBackend, SHOPPER_EMAIL};
use larkspur_storefront::account::{AccountError, ReviewDraft};
use larkspur_storefront::checkout::{ShippingForm, ShippingMethod};

fn address(city: &str) -> Address {
    Address {
        id: None,
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        company: None,
        address1: "12 Analytical Way".into(),
        address2: None,
        city: city.into(),
        state: "LDN".into(),
        postal_code: "N1 9GU".into(),
        country: "UK".into(),
        phone: None,
        is_default: true,
    }
}

#[tokio::test]
async fn test_address_book_round_trip() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let account = storefront.account();

    let created = account.create_address(&address("London")).await.unwrap();
    let id = created.id.clone().unwrap();

    let updated = account
        .update_address(&id, &address("Cambridge"))
        .await
        .unwrap();
    assert_eq!(updated.id.as_ref(), Some(&id));
    assert_eq!(updated.city, "Cambridge");

    let saved = account.addresses().await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].city, "Cambridge");

    account.delete_address(&id).await.unwrap();
    assert!(account.addresses().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_placed_order_appears_in_history() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    storefront
        .cart()
        .add_to_cart(&ProductId::new("p1"), 1, LineOptions::none())
        .await;
    let form = ShippingForm {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: SHOPPER_EMAIL.into(),
        address1: "12 Analytical Way".into(),
        city: "London".into(),
        state: "LDN".into(),
        postal_code: "N1 9GU".into(),
        country: "UK".into(),
        ..ShippingForm::default()
    };
    let pending = storefront
        .checkout()
        .begin(&form, ShippingMethod::Standard)
        .await
        .unwrap();

    let orders = storefront.account().orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, pending.order_id);
    assert_eq!(orders[0].status, OrderStatus::Pending);

    let order = storefront.account().order(&pending.order_id).await.unwrap();
    assert_eq!(order.shipping_address.unwrap().city, "London");
}

#[tokio::test]
async fn test_invalid_review_is_rejected_locally() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();

    let error = storefront
        .account()
        .submit_review(&ReviewDraft {
            product_id: ProductId::new("p1"),
            rating: 6,
            comment: "Too good".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(error, AccountError::InvalidRating(6)));
}

#[tokio::test]
async fn test_review_and_feedback_submission() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let account = storefront.account();

    account
        .submit_review(&ReviewDraft {
            product_id: ProductId::new("p1"),
            rating: 5,
            comment: "  Breathes well in summer ".into(),
        })
        .await
        .unwrap();

    let featured = account.featured_feedback().await.unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0].message, "Lovely fabrics");

    assert!(matches!(
        account.submit_feedback("   ").await,
        Err(AccountError::EmptyField("message"))
    ));
    account.submit_feedback("Fast delivery").await.unwrap();
    assert_eq!(account.featured_feedback().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_featured_feedback_needs_no_session() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();

    let featured = storefront.account().featured_feedback().await.unwrap();
    assert_eq!(featured[0].user.as_ref().unwrap().first_name, "Ada");
}
