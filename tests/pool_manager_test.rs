mod common;

use std::sync::Arc;

use common::{MemoryDriver, Store, options, settle};
use sqlpool::{DbError, PoolManager, Statement, Value};

#[tokio::test]
async fn test_init_is_idempotent() {
    let store = Store::new();
    let manager = PoolManager::new();

    let first = manager
        .init_with(&options(1, 2), MemoryDriver::new(store.clone()))
        .await
        .unwrap();
    let second = manager
        .init_with(&options(1, 2), MemoryDriver::new(store.clone()))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.opened(), 1);
    assert!(manager.is_initialized().await);
}

#[tokio::test]
async fn test_concurrent_init_creates_one_pool() {
    let store = Store::new();
    let manager = PoolManager::new();
    let opts = options(2, 4);

    let (a, b) = tokio::join!(
        manager.init_with(&opts, MemoryDriver::new(store.clone())),
        manager.init_with(&opts, MemoryDriver::new(store.clone())),
    );
    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(store.opened(), 2);
}

#[tokio::test]
async fn test_shutdown_twice_is_a_no_op() {
    let store = Store::new();
    let manager = PoolManager::new();
    let pool = manager
        .init_with(&options(2, 2), MemoryDriver::new(store.clone()))
        .await
        .unwrap();

    manager.shutdown().await;
    assert!(pool.is_closed());
    assert!(!manager.is_initialized().await);
    assert_eq!(store.closed(), 2);

    manager.shutdown().await;
    assert_eq!(store.closed(), 2);
}

#[tokio::test]
async fn test_shutdown_without_init_is_a_no_op() {
    let manager = PoolManager::new();
    manager.shutdown().await;
    assert!(!manager.is_initialized().await);
}

#[tokio::test]
async fn test_missing_host_fails_init() {
    let manager = PoolManager::new();
    let mut bad = options(1, 2);
    bad.host.clear();

    let err = manager
        .init_with(&bad, MemoryDriver::new(Store::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Configuration(_)));
    assert!(!manager.is_initialized().await);
}

#[tokio::test]
async fn test_unreachable_store_fails_init() {
    let store = Store::new();
    store.set_unreachable(true);
    let manager = PoolManager::new();

    let err = manager
        .init_with(&options(1, 2), MemoryDriver::new(store))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Configuration(ref m) if m.contains("unreachable")));
    assert!(!manager.is_initialized().await);
}

#[tokio::test]
async fn test_unknown_backend_fails_init() {
    let manager = PoolManager::new();
    let err = manager.init(&options(1, 2)).await.unwrap_err();
    assert!(matches!(err, DbError::Configuration(ref m) if m.contains("memory")));
}

#[tokio::test]
async fn test_owning_scope_shuts_pool_down_once() {
    let store = Store::new();
    let manager = PoolManager::new();

    let scope = manager
        .enter_with(&options(1, 2), MemoryDriver::new(store.clone()))
        .await
        .unwrap();
    assert!(scope.is_owner());

    // a nested scope finds the pool already there and leaves it alone
    let nested = manager
        .enter_with(&options(1, 2), MemoryDriver::new(store.clone()))
        .await
        .unwrap();
    assert!(!nested.is_owner());
    assert!(Arc::ptr_eq(scope.pool(), nested.pool()));
    nested.close().await;
    assert!(manager.is_initialized().await);

    let pool = scope.pool().clone();
    scope.close().await;
    assert!(pool.is_closed());
    assert!(!manager.is_initialized().await);
    assert_eq!(store.closed(), 1);
}

#[tokio::test]
async fn test_dropped_scope_shuts_pool_down() {
    let store = Store::new();
    let manager = PoolManager::new();

    let pool = {
        let scope = manager
            .enter_with(&options(1, 2), MemoryDriver::new(store.clone()))
            .await
            .unwrap();
        scope.pool().clone()
    };
    settle().await;

    assert!(pool.is_closed());
    assert!(!manager.is_initialized().await);
}

#[tokio::test]
async fn test_stale_scope_does_not_close_newer_pool() {
    let store = Store::new();
    let manager = PoolManager::new();

    let scope = manager
        .enter_with(&options(1, 2), MemoryDriver::new(store.clone()))
        .await
        .unwrap();
    manager.shutdown().await;
    let newer = manager
        .init_with(&options(1, 2), MemoryDriver::new(store.clone()))
        .await
        .unwrap();

    scope.close().await;
    assert!(!newer.is_closed());
    assert!(manager.is_initialized().await);
}

#[tokio::test]
async fn test_scope_session_runs_statements() {
    let store = Store::new();
    let manager = PoolManager::new();
    let scope = manager
        .enter_with(&options(1, 2), MemoryDriver::new(store.clone()))
        .await
        .unwrap();

    let session = scope.session();
    session
        .execute(&Statement::new("INSERT INTO items (item) VALUES (?)").bind("a"))
        .await
        .unwrap();
    scope.close().await;

    assert_eq!(store.items(), vec![Value::from("a")]);
    let err = session
        .fetch_all(&Statement::new("SELECT item FROM items"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::PoolClosed));
}

#[tokio::test]
async fn test_use_after_shutdown_fails_with_pool_closed() {
    let store = Store::new();
    let manager = PoolManager::new();
    let pool = manager
        .init_with(&options(1, 1), MemoryDriver::new(store.clone()))
        .await
        .unwrap();

    let mut held = pool.borrow().await.unwrap();
    manager.shutdown().await;

    assert!(matches!(held.connection(), Err(DbError::PoolClosed)));
    drop(held);
    settle().await;
    assert_eq!(store.closed(), 1);
    assert_eq!(pool.stats().total, 0);
}

#[tokio::test]
async fn test_scoped_surfaces_init_failure() {
    let manager = PoolManager::new();
    let mut ran = false;
    let result = manager
        .scoped(&options(1, 2), |_session| {
            ran = true;
            async { Ok::<_, DbError>(()) }
        })
        .await;
    assert!(matches!(result, Err(DbError::Configuration(_))));
    assert!(!ran);
}
