//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 层级解析测试：用户覆盖 > 租户覆盖 > 平台默认值

#[path = "../common/mod.rs"]
mod common;

use common::client_with_cache;
use oxflag::cache::{CacheBackend, MemoryCache, NullCache};
use oxflag::FlagClient;
use std::sync::Arc;

async fn seeded(cache: Arc<dyn CacheBackend>) -> FlagClient {
    let client = client_with_cache(cache).await;
    let admin = client.admin();
    admin.create_flag("dark-mode", false, None).await.unwrap();
    admin.set_tenant_override("dark-mode", "acme", true).await.unwrap();
    admin
        .create_flag("beta", true, Some("beta features".into()))
        .await
        .unwrap();
    admin.set_tenant_override("beta", "acme", false).await.unwrap();
    admin.set_user_override("beta", "acme", "u2", true).await.unwrap();
    client
}

fn backends() -> Vec<Arc<dyn CacheBackend>> {
    vec![Arc::new(NullCache), Arc::new(MemoryCache::default())]
}

#[tokio::test]
async fn test_tenant_override_beats_platform_default() {
    for cache in backends() {
        let client = seeded(cache).await;
        assert!(client.resolve("dark-mode", Some("acme"), Some("u1")).await.unwrap());
        assert!(!client
            .resolve("dark-mode", Some("other-tenant"), Some("u1"))
            .await
            .unwrap());
        assert!(client.resolve("dark-mode", Some("acme"), None).await.unwrap());
        assert!(!client.resolve("dark-mode", None, None).await.unwrap());
    }
}

#[tokio::test]
async fn test_user_override_beats_tenant_and_platform() {
    for cache in backends() {
        let client = seeded(cache).await;
        assert!(client.resolve("beta", Some("acme"), Some("u2")).await.unwrap());
        assert!(!client.resolve("beta", Some("acme"), Some("u1")).await.unwrap());
        assert!(client.resolve("beta", Some("globex"), Some("u2")).await.unwrap());
    }
}

#[tokio::test]
async fn test_user_override_ignored_without_tenant() {
    let client = seeded(Arc::new(NullCache)).await;
    // 用户覆盖只在 tenant 与 user 同时存在时生效
    assert!(client.resolve("beta", None, Some("u2")).await.unwrap());
    client
        .admin()
        .set_flag_enabled("beta", false)
        .await
        .unwrap();
    assert!(!client.resolve("beta", None, Some("u2")).await.unwrap());
}

#[tokio::test]
async fn test_unknown_flag_is_false_and_counted_once_per_call() {
    let client = seeded(Arc::new(MemoryCache::default())).await;

    assert!(!client
        .resolve("nonexistent", Some("acme"), Some("u1"))
        .await
        .unwrap());
    assert_eq!(client.metrics().unknown_flags(), 1);

    assert!(!client.resolve("nonexistent", None, None).await.unwrap());
    assert_eq!(client.metrics().unknown_flags(), 2);
}

#[tokio::test]
async fn test_resolve_any_and_all_short_circuit() {
    let client = client_with_cache(Arc::new(NullCache)).await;
    let admin = client.admin();
    admin.create_flag("a", false, None).await.unwrap();
    admin.create_flag("b", true, None).await.unwrap();

    assert!(client.resolve_any(&["a", "b"], None, None).await.unwrap());
    assert!(!client.resolve_all(&["a", "b"], None, None).await.unwrap());

    // 第一个 true 之后不再解析，因此未知名称不会被计数
    assert!(client.resolve_any(&["b", "missing"], None, None).await.unwrap());
    assert_eq!(client.metrics().unknown_flags(), 0);

    // 第一个 false 之后不再解析
    assert!(!client.resolve_all(&["a", "missing"], None, None).await.unwrap());
    assert_eq!(client.metrics().unknown_flags(), 0);

    assert!(!client.resolve_any(&[], None, None).await.unwrap());
    assert!(client.resolve_all(&[], None, None).await.unwrap());
}

#[tokio::test]
async fn test_cached_and_uncached_resolution_agree() {
    let plain = seeded(Arc::new(NullCache)).await;
    let cached = seeded(Arc::new(MemoryCache::default())).await;

    let cases = [
        ("dark-mode", Some("acme"), Some("u1")),
        ("dark-mode", Some("other"), None),
        ("beta", Some("acme"), Some("u2")),
        ("beta", Some("acme"), Some("u3")),
        ("beta", None, None),
        ("nope", Some("acme"), Some("u2")),
    ];
    for _ in 0..2 {
        for (name, tenant, user) in cases {
            assert_eq!(
                plain.resolve(name, tenant, user).await.unwrap(),
                cached.resolve(name, tenant, user).await.unwrap(),
                "{} {:?} {:?}",
                name,
                tenant,
                user
            );
        }
    }
    assert!(cached.metrics().count("cache", "get", "hit") > 0);
}

#[tokio::test]
async fn test_evaluate_without_context_uses_resolver() {
    let client = seeded(Arc::new(MemoryCache::default())).await;

    let all = client.evaluate(None, Some("acme"), Some("u2")).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["dark-mode"], true);
    assert_eq!(all["beta"], true);

    let names = vec!["dark-mode".to_string(), "ghost".to_string()];
    let some = client
        .evaluate(Some(&names), Some("other"), None)
        .await
        .unwrap();
    assert_eq!(some.len(), 2);
    assert_eq!(some["dark-mode"], false);
    assert_eq!(some["ghost"], false);
}

#[tokio::test]
async fn test_admin_write_to_unknown_flag_fails() {
    let client = client_with_cache(Arc::new(NullCache)).await;
    let err = client
        .admin()
        .set_tenant_override("ghost", "acme", true)
        .await
        .unwrap_err();
    assert!(matches!(err, oxflag::FlagError::FlagNotFound(name) if name == "ghost"));
}

#[tokio::test]
async fn test_list_overrides() {
    let client = seeded(Arc::new(NullCache)).await;
    let store = client.store();

    let all = store.list_overrides(None).await.unwrap();
    let rows: Vec<(&str, &str, Option<&str>, bool)> = all
        .iter()
        .map(|e| (e.flag.as_str(), e.tenant_id.as_str(), e.user_id.as_deref(), e.enabled))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("beta", "acme", None, false),
            ("beta", "acme", Some("u2"), true),
            ("dark-mode", "acme", None, true),
        ]
    );

    let dark = store.list_overrides(Some("dark-mode")).await.unwrap();
    assert_eq!(dark.len(), 1);
    assert_eq!(dark[0].user_id, None);

    assert!(matches!(
        store.list_overrides(Some("missing")).await,
        Err(oxflag::FlagError::FlagNotFound(_))
    ));
}
