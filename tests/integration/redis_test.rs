//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! Redis 后端集成测试，Redis 不可用时跳过

#[path = "../common/mod.rs"]
mod common;

use common::{is_redis_available, memory_db, redis_url, setup_logging};
use oxflag::cache::{CacheBackend, RedisCache};
use oxflag::config::{CacheBackendType, CacheConfig, Config};
use oxflag::error::FlagError;
use oxflag::FlagClient;
use secrecy::SecretString;
use std::sync::Arc;

async fn connect() -> Option<RedisCache> {
    setup_logging();
    let url = redis_url();
    if !is_redis_available(&url).await {
        println!("Redis not available at {}, skipping", url);
        return None;
    }
    Some(
        RedisCache::connect(&SecretString::new(url.into()), 2000, 1000)
            .await
            .unwrap(),
    )
}

fn unique_prefix() -> String {
    format!("oxflag-test-{}", uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_redis_get_set_delete() {
    let Some(cache) = connect().await else {
        return;
    };
    let key = format!("{}:flags", unique_prefix());

    assert_eq!(cache.get(&key).await.unwrap(), None);
    cache.set(&key, "{\"a\":true}".into(), Some(30)).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("{\"a\":true}"));
    cache.delete(&key).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), None);
    // 删除不存在的键也成功
    cache.delete(&key).await.unwrap();
}

#[tokio::test]
async fn test_redis_ttl_expires_entry() {
    let Some(cache) = connect().await else {
        return;
    };
    let key = format!("{}:tenant:acme", unique_prefix());

    cache.set(&key, "{}".into(), Some(1)).await.unwrap();
    assert!(cache.get(&key).await.unwrap().is_some());
    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert!(cache.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_redis_backed_client_invalidates_on_write() {
    let Some(cache) = connect().await else {
        return;
    };
    let prefix = unique_prefix();
    let config = CacheConfig {
        key_prefix: Some(prefix.clone()),
        ..CacheConfig::default()
    };
    let cache = Arc::new(cache);
    let client = FlagClient::with_cache_config(memory_db().await, cache.clone(), &config);
    let admin = client.admin();

    admin.create_flag("dark-mode", false, None).await.unwrap();
    assert!(!client.resolve("dark-mode", Some("acme"), None).await.unwrap());
    assert!(cache
        .get(&format!("{}:tenant:acme", prefix))
        .await
        .unwrap()
        .is_some());

    admin.set_tenant_override("dark-mode", "acme", true).await.unwrap();
    assert!(client.resolve("dark-mode", Some("acme"), None).await.unwrap());

    admin.delete_flag("dark-mode").await.unwrap();
}

#[tokio::test]
async fn test_malformed_url_is_config_error() {
    setup_logging();
    let err = RedisCache::connect(&SecretString::new("not a url".into()), 500, 500)
        .await
        .unwrap_err();
    assert!(matches!(err, FlagError::Config(_)));
}

#[tokio::test]
async fn test_client_starts_with_redis_down() {
    setup_logging();
    let mut config = Config::default();
    config.cache.backend = CacheBackendType::Redis;
    config.cache.redis_url = Some(SecretString::new("redis://127.0.0.1:1".into()));
    config.cache.connection_timeout_ms = 100;
    config.cache.command_timeout_ms = 100;

    let client = FlagClient::connect(&config).await.unwrap();
    assert_eq!(client.cache().name(), "redis");

    let admin = client.admin();
    admin.create_flag("dark-mode", false, None).await.unwrap();
    admin.set_tenant_override("dark-mode", "acme", true).await.unwrap();

    assert!(client.resolve("dark-mode", Some("acme"), Some("u1")).await.unwrap());
    assert!(!client.resolve("dark-mode", Some("other"), None).await.unwrap());
    assert!(client.resolver().cache_health().is_degraded());
    assert!(client.metrics().count("store", "load", "ok") > 0);
}
