// Process-wide registry lifecycle. Kept to a single test function so the
// before/after-initialize ordering is deterministic within this process.

mod support;

use std::sync::Arc;
use std::time::Duration;

use rusty_pool::{registry, PoolError, PoolSettings};

use support::FakeFactory;

#[tokio::test]
async fn registry_initializes_once_and_hands_out_the_same_pool() {
    // Before initialize, instance() must refuse.
    match registry::instance() {
        Err(PoolError::NotInitialized) => {}
        other => panic!("expected NotInitialized, got {:?}", other.map(|_| ())),
    }

    let settings = PoolSettings::builder()
        .baseline_capacity(2)
        .initial_fill(1)
        .max_capacity(8)
        .acquire_timeout(Duration::from_secs(1))
        .build()
        .unwrap();
    let factory = FakeFactory::new();

    let pool = registry::initialize(settings.clone(), factory.clone())
        .await
        .unwrap();
    assert_eq!(pool.free_count(), 1);

    let resolved = registry::instance().unwrap();
    assert!(Arc::ptr_eq(&pool, &resolved));

    // A second initialize is silently absorbed: same pool, no new
    // sessions opened against the backend.
    let opened_before = factory.open_count();
    let again = registry::initialize(settings, FakeFactory::new())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&pool, &again));
    assert_eq!(factory.open_count(), opened_before);

    // The registry pool is fully operational.
    let session = pool.acquire().await.unwrap();
    assert!(pool.is_active(&session));
    pool.release(session).await.unwrap();
    assert_eq!(pool.active_count(), 0);
}
