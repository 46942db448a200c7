//! Session lifecycle against the mock backend: login, restore, refresh on
//! 401 and expiry.

#![allow(clippy::unwrap_used)]

use larkspur_core::{Email, Role};
use larkspur_integration_tests::{MockBackend, PASSWORD, SHOPPER_EMAIL};
use larkspur_storefront::ApiError;
use larkspur_storefront::session::SessionState;
use larkspur_storefront::storage::LocalStorage;
use secrecy::SecretString;

#[tokio::test]
async fn test_login_persists_user_and_role_cookie() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let session = storefront.session();

    let user = session.user().unwrap();
    assert_eq!(user.email, SHOPPER_EMAIL);
    assert_eq!(session.role_cookie(), Some(Role::User));
    assert!(!session.is_admin());
    assert!(storefront.api().has_access_token().await);
}

#[tokio::test]
async fn test_bad_password_leaves_session_signed_out() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    storefront.session().initialize().await;

    let error = storefront
        .session()
        .login(
            &Email::parse(SHOPPER_EMAIL).unwrap(),
            &SecretString::from("wrong".to_string()),
        )
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(401));
    assert_eq!(storefront.session().state(), SessionState::SignedOut);
    // Credential exchanges never trigger a refresh
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_restart_restores_verified_session() {
    let backend = MockBackend::start().await.unwrap();
    let storage = LocalStorage::in_memory();

    let first = backend.storefront_with(storage.clone()).unwrap();
    first
        .session()
        .login(
            &Email::parse(SHOPPER_EMAIL).unwrap(),
            &SecretString::from(PASSWORD.to_string()),
        )
        .await
        .unwrap();

    let second = backend.storefront_with(storage).unwrap();
    let state = second.session().initialize().await;
    assert!(matches!(state, SessionState::SignedIn(ref user) if user.email == SHOPPER_EMAIL));
}

#[tokio::test]
async fn test_unreachable_backend_reports_server_unavailable() {
    let backend = MockBackend::start().await.unwrap();
    backend.set_offline(true);
    let storefront = backend.storefront().unwrap();

    assert_eq!(
        storefront.session().initialize().await,
        SessionState::ServerUnavailable
    );
}

#[tokio::test]
async fn test_rejected_token_refreshes_exactly_once() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();

    backend.expire_access_token();
    let orders = storefront.account().orders().await.unwrap();

    assert!(orders.is_empty());
    assert_eq!(backend.refresh_calls(), 1);
    assert!(matches!(storefront.session().state(), SessionState::SignedIn(_)));
}

#[tokio::test]
async fn test_failed_refresh_expires_session() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();
    let mut changes = storefront.session().subscribe();

    backend.set_refresh_enabled(false);
    backend.expire_access_token();
    let error = storefront.account().orders().await.unwrap_err();

    assert_eq!(error, ApiError::SessionExpired);
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(*changes.borrow_and_update(), SessionState::Expired);
    assert!(!storefront.api().has_access_token().await);
    assert_eq!(storefront.session().role_cookie(), None);
}

#[tokio::test]
async fn test_logout_clears_local_credentials() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.signed_in(SHOPPER_EMAIL).await.unwrap();

    storefront.session().logout().await;

    assert_eq!(storefront.session().state(), SessionState::SignedOut);
    assert!(!storefront.api().has_access_token().await);
    assert_eq!(storefront.session().role_cookie(), None);
}
