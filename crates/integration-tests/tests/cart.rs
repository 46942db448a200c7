//! Cart and wishlist stores against the mock backend.

#![allow(clippy::unwrap_used)]

use larkspur_core::{FilterOptions, LineOptions, ProductId};
use larkspur_integration_tests::{MockBackend, SHOPPER_EMAIL};
use larkspur_storefront::stores::Synced;
use rust_decimal::Decimal;

#[tokio::test]
async fn test_add_update_remove_keeps_totals_consistent() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let cart = storefront.cart();
    let shirt = ProductId::new("p1");

    let added = cart.add_to_cart(&shirt, 2, LineOptions::none()).await;
    assert!(added.is_fresh());
    let state = added.into_value().unwrap();
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.totals.total_items, 2);
    assert_eq!(state.totals.total_amount, Decimal::from(180));
    let line = state.items[0].id.clone();

    let updated = cart.update_quantity(&line, 1).await.into_value().unwrap();
    assert_eq!(updated.totals.total_amount, Decimal::from(90));
    assert_eq!(cart.item_count().await, 1);

    let removed = cart.remove_from_cart(&line).await.into_value().unwrap();
    assert!(removed.items.is_empty());
    assert_eq!(removed.totals.total_amount, Decimal::ZERO);
    assert!(backend.cart_lines().is_empty());
}

#[tokio::test]
async fn test_same_variant_merges_into_one_line() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let cart = storefront.cart();
    let shirt = ProductId::new("p1");
    let medium = LineOptions {
        size: Some("M".into()),
        color: None,
    };

    cart.add_to_cart(&shirt, 1, medium.clone()).await;
    cart.add_to_cart(&shirt, 1, medium).await;
    let state = cart
        .add_to_cart(&shirt, 1, LineOptions::none())
        .await
        .into_value()
        .unwrap();

    assert_eq!(state.items.len(), 2);
    assert_eq!(state.totals.total_items, 3);
}

#[tokio::test]
async fn test_zero_quantity_removes_line() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let cart = storefront.cart();

    let state = cart
        .add_to_cart(&ProductId::new("p2"), 1, LineOptions::none())
        .await
        .into_value()
        .unwrap();
    let line = state.items[0].id.clone();

    let state = cart.update_quantity(&line, 0).await.into_value().unwrap();
    assert!(state.items.is_empty());
    assert!(backend.cart_lines().is_empty());
}

#[tokio::test]
async fn test_offline_add_uses_catalog_price_and_syncs_later() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    storefront
        .products()
        .fetch_products(FilterOptions::default(), false)
        .await;
    let cart = storefront.cart();
    cart.add_to_cart(&ProductId::new("p1"), 1, LineOptions::none()).await;

    backend.set_offline(true);
    let outcome = cart
        .add_to_cart(&ProductId::new("p2"), 1, LineOptions::none())
        .await;

    let Synced::Stale { value, error } = outcome else {
        panic!("expected a local fallback");
    };
    assert_eq!(error.status(), Some(503));
    assert_eq!(value.items.len(), 2);
    assert!(value.items[1].is_offline());
    assert_eq!(value.totals.total_amount, Decimal::from(135));
    assert!(value.error.is_some());

    backend.set_offline(false);
    let sync = cart.sync_with_backend().await.unwrap();
    assert_eq!(sync.synced, 1);
    assert_eq!(sync.failed, 0);
    assert!(sync.cart.is_fresh());
    assert_eq!(
        backend.cart_lines(),
        vec![("p1".to_string(), 1), ("p2".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_fetch_falls_back_to_cached_cart() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let cart = storefront.cart();
    cart.add_to_cart(&ProductId::new("p3"), 2, LineOptions::none()).await;

    backend.set_offline(true);
    let outcome = cart.fetch_cart().await;

    assert!(!outcome.is_fresh());
    let state = outcome.into_value().unwrap();
    assert_eq!(state.totals.total_amount, Decimal::from(360));
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_signed_out_cart_is_local_and_silent() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    let cart = storefront.cart();

    let outcome = cart
        .add_to_cart(&ProductId::new("p1"), 1, LineOptions::none())
        .await;
    assert!(!outcome.is_fresh());
    assert_eq!(cart.item_count().await, 1);

    // Fetching without a session keeps the local line and records no error
    let state = cart.fetch_cart().await.into_value().unwrap();
    assert_eq!(state.items.len(), 1);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_wishlist_round_trip_and_move_to_cart() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let wishlist = storefront.wishlist();
    let scarf = ProductId::new("p2");

    let state = wishlist.add_to_wishlist(&scarf).await.into_value().unwrap();
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].product.as_ref().unwrap().name, "Silk Scarf");
    assert!(wishlist.check(&scarf).await);

    wishlist.move_to_cart(&scarf, storefront.cart()).await.unwrap();

    assert_eq!(wishlist.count().await, 0);
    assert!(storefront.cart().is_in_cart(&scarf).await);
    assert_eq!(backend.cart_lines(), vec![("p2".to_string(), 1)]);
}

#[tokio::test]
async fn test_wishlist_remove_and_clear() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let wishlist = storefront.wishlist();

    wishlist.add_to_wishlist(&ProductId::new("p1")).await;
    wishlist.add_to_wishlist(&ProductId::new("p3")).await;
    let state = wishlist
        .remove_from_wishlist(&ProductId::new("p1"))
        .await
        .into_value()
        .unwrap();
    assert_eq!(state.items.len(), 1);
    assert!(!wishlist.check(&ProductId::new("p1")).await);

    let cleared = wishlist.clear_wishlist().await;
    assert!(cleared.is_fresh());
    assert_eq!(wishlist.count().await, 0);
}
