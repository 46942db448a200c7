//! Product store against the mock backend: caching, fallback and debounced
//! search.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use larkspur_core::{FilterOptions, ProductId, SortBy};
use larkspur_integration_tests::MockBackend;
use larkspur_storefront::storage::LocalStorage;
use larkspur_storefront::stores::{SearchOutcome, Synced};

#[tokio::test]
async fn test_listing_is_served_from_cache_until_forced() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    let products = storefront.products();

    let first = products.fetch_products(FilterOptions::default(), false).await;
    assert!(first.is_fresh());
    assert_eq!(first.value().unwrap().products.len(), 4);

    products.fetch_products(FilterOptions::default(), false).await;
    assert_eq!(backend.product_list_calls(), 1);

    products.fetch_products(FilterOptions::default(), true).await;
    assert_eq!(backend.product_list_calls(), 2);

    // A different filter set is a different cache entry
    let sorted = FilterOptions {
        sort_by: Some(SortBy::PriceAsc),
        ..FilterOptions::default()
    };
    products.fetch_products(sorted, false).await;
    assert_eq!(backend.product_list_calls(), 3);
}

#[tokio::test]
async fn test_failed_refresh_serves_stale_listing() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    let products = storefront.products();
    products.fetch_products(FilterOptions::default(), false).await;

    backend.set_offline(true);
    let outcome = products.fetch_products(FilterOptions::default(), true).await;

    let Synced::Stale { value, error } = outcome else {
        panic!("expected stale listing");
    };
    assert_eq!(value.products.len(), 4);
    assert_eq!(error.status(), Some(503));
    assert!(products.state().await.error.is_some());
}

#[tokio::test]
async fn test_persisted_listing_survives_restart() {
    let backend = MockBackend::start().await.unwrap();
    let storage = LocalStorage::in_memory();
    backend
        .storefront_with(storage.clone())
        .unwrap()
        .products()
        .fetch_products(FilterOptions::default(), false)
        .await;

    backend.set_offline(true);
    let restarted = backend.storefront_with(storage).unwrap();
    assert!(restarted.products().load_from_cache().await);
    let outcome = restarted
        .products()
        .fetch_products(FilterOptions::default(), false)
        .await;

    // Still inside the cache window, so no request is made
    assert!(outcome.is_fresh());
    assert_eq!(backend.product_list_calls(), 1);
}

#[tokio::test]
async fn test_nothing_cached_and_offline_is_empty() {
    let backend = MockBackend::start().await.unwrap();
    backend.set_offline(true);
    let storefront = backend.storefront().unwrap();

    let outcome = storefront
        .products()
        .fetch_products(FilterOptions::default(), false)
        .await;
    assert!(matches!(outcome, Synced::Empty { .. }));
}

#[tokio::test]
async fn test_product_detail_prefers_loaded_listing() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    let products = storefront.products();

    let direct = products
        .fetch_product_by_id(&ProductId::new("p3"), false)
        .await
        .into_value()
        .unwrap();
    assert_eq!(direct.name, "Wool Coat");

    products.fetch_products(FilterOptions::default(), false).await;
    backend.set_offline(true);
    let cached = products.fetch_product_by_id(&ProductId::new("p2"), false).await;
    assert!(cached.is_fresh());
    assert!(cached.value().unwrap().on_sale());

    let missing = products.fetch_product_by_id(&ProductId::new("p9"), true).await;
    assert!(matches!(missing, Synced::Empty { .. }));
}

#[tokio::test]
async fn test_rapid_searches_issue_one_request() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    let products = storefront.products();
    let filters = FilterOptions::default();

    let (first, second, third) = tokio::join!(
        products.search_products("linen", &filters),
        products.search_products("linen", &filters),
        products.search_products("linen", &filters),
    );

    assert_eq!(first, SearchOutcome::Superseded);
    assert_eq!(second, SearchOutcome::Superseded);
    let SearchOutcome::Completed(Synced::Fresh(results)) = third else {
        panic!("expected the last search to complete");
    };
    assert_eq!(results.len(), 2);
    assert_eq!(backend.search_calls(), 1);
    assert_eq!(products.state().await.search_results.len(), 2);
}

#[tokio::test]
async fn test_outdated_failing_search_leaves_newer_results() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    let products = storefront.products();
    let filters = FilterOptions::default();
    backend.set_failing_searches(Some(Duration::from_millis(400)));

    // The first search is already in flight when the second one starts
    let (older, newer) = tokio::join!(products.search_products("linen", &filters), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        backend.set_failing_searches(None);
        products.search_products("wool", &filters).await
    });

    assert!(matches!(older, SearchOutcome::Completed(Synced::Empty { .. })));
    let SearchOutcome::Completed(Synced::Fresh(results)) = newer else {
        panic!("expected the newer search to complete");
    };
    assert_eq!(results.len(), 1);

    let state = products.state().await;
    assert_eq!(state.search_results.len(), 1);
    assert_eq!(state.search_query, "wool");
    assert!(state.error.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn test_blank_search_clears_without_request() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();

    let outcome = storefront
        .products()
        .search_products("   ", &FilterOptions::default())
        .await;

    assert_eq!(outcome, SearchOutcome::Completed(Synced::Fresh(Vec::new())));
    assert_eq!(backend.search_calls(), 0);
}

#[tokio::test]
async fn test_collections_suggestions_and_filters() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    let products = storefront.products();

    let collections = products.fetch_collections(false).await.into_value().unwrap();
    assert_eq!(collections.len(), 1);

    let summer = products.fetch_collection("summer").await.unwrap();
    assert_eq!(summer.name, "Summer");
    let page = products
        .fetch_collection_products("c1", &FilterOptions::default(), false)
        .await
        .into_value()
        .unwrap();
    assert_eq!(page.products.len(), 4);

    let suggestions = products.suggestions("lin").await.unwrap();
    assert_eq!(suggestions, vec!["Linen Shirt", "Linen Trousers"]);
    assert!(products.suggestions(" ").await.unwrap().is_empty());

    let groups = products.filter_options(Some("Shirts")).await.unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].options.len(), 3);
}

#[tokio::test]
async fn test_featured_is_limited_and_cached_per_limit() {
    let backend = MockBackend::start().await.unwrap();
    let storefront = backend.storefront().unwrap();
    let products = storefront.products();

    let two = products.fetch_featured(2, false).await.into_value().unwrap();
    assert_eq!(two.len(), 2);
    let three = products.fetch_featured(3, false).await.into_value().unwrap();
    assert_eq!(three.len(), 3);
    assert_eq!(products.state().await.featured.len(), 3);
}
