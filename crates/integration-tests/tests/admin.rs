//! Admin back-office against the mock backend: role gating and retries.

#![allow(clippy::unwrap_used)]

use larkspur_core::{ProductId, Role, UserId};
use larkspur_integration_tests::{ADMIN_EMAIL, MockBackend, SHOPPER_EMAIL};
use larkspur_storefront::ApiError;
use larkspur_storefront::admin::NewProduct;
use rust_decimal::Decimal;

#[tokio::test]
async fn test_user_listing_retries_transient_failures() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(ADMIN_EMAIL).await.unwrap();
    backend.fail_next_user_lists(2);

    let users = storefront.admin().list_users().await.unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(backend.user_list_calls(), 3);
}

#[tokio::test]
async fn test_user_listing_gives_up_after_configured_attempts() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(ADMIN_EMAIL).await.unwrap();
    backend.fail_next_user_lists(3);

    let error = storefront.admin().list_users().await.unwrap_err();

    assert_eq!(error.status(), Some(503));
    assert_eq!(backend.user_list_calls(), 3);
}

#[tokio::test]
async fn test_shopper_is_denied_without_request() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();

    let error = storefront.admin().list_users().await.unwrap_err();

    assert!(matches!(error, ApiError::PermissionDenied(_)));
    assert_eq!(backend.user_list_calls(), 0);
}

#[tokio::test]
async fn test_role_change_is_applied() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(ADMIN_EMAIL).await.unwrap();

    let user = storefront
        .admin()
        .update_role(&UserId::new("u1"), Role::Admin)
        .await
        .unwrap();

    assert_eq!(user.role, Role::Admin);
    assert_eq!(backend.user_role("u1").as_deref(), Some("ADMIN"));
}

#[tokio::test]
async fn test_delete_user() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(ADMIN_EMAIL).await.unwrap();
    let admin = storefront.admin();

    admin.delete_user(&UserId::new("u1")).await.unwrap();

    assert_eq!(backend.user_role("u1"), None);
    assert_eq!(admin.list_users().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_list_and_delete_product() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(ADMIN_EMAIL).await.unwrap();
    let admin = storefront.admin();

    let created = admin
        .create_product(&NewProduct {
            name: "Cotton Tee".into(),
            price: Decimal::from(35),
            stock: 25,
            sizes: vec!["S".into(), "M".into()],
            ..NewProduct::default()
        })
        .await
        .unwrap();
    assert_eq!(created.name, "Cotton Tee");
    assert_eq!(created.stock, 25);

    let listing = admin.list_products(1, 20).await.unwrap();
    assert_eq!(listing.products.len(), 5);
    assert_eq!(listing.pagination.unwrap().total, 5);

    admin.delete_product(&created.id).await.unwrap();
    admin.delete_product(&ProductId::new("p4")).await.unwrap();
    assert_eq!(admin.list_products(1, 20).await.unwrap().products.len(), 3);
}
