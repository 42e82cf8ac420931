//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 请求级上下文测试：加载、隔离、取消与临时覆盖

#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use common::client_with_cache;
use oxflag::cache::{CacheBackend, NullCache};
use oxflag::context;
use oxflag::error::{FlagError, Result};
use oxflag::FlagClient;
use sea_orm::ConnectionTrait;
use std::sync::Arc;
use std::time::Duration;

/// 读操作永远比调用方的超时慢的缓存
struct SlowCache;

#[async_trait]
impl CacheBackend for SlowCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<u64>) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

async fn seeded() -> FlagClient {
    let client = client_with_cache(Arc::new(NullCache)).await;
    let admin = client.admin();
    admin.create_flag("dark-mode", false, None).await.unwrap();
    admin.create_flag("search", true, None).await.unwrap();
    admin.set_tenant_override("dark-mode", "acme", true).await.unwrap();
    admin.set_user_override("search", "acme", "u1", false).await.unwrap();
    client
}

#[tokio::test]
async fn test_load_then_sync_reads() {
    let client = seeded().await;
    context::scope(async {
        client.load_context(Some("acme"), Some("u1")).await.unwrap();

        assert!(context::is_enabled("dark-mode").unwrap());
        assert!(context::is_disabled("search").unwrap());
        assert!(!context::is_enabled("unknown").unwrap());

        let all = context::get_all().unwrap();
        assert_eq!(all.len(), 2);
        let enabled = context::get_enabled().unwrap();
        assert_eq!(enabled.into_iter().collect::<Vec<_>>(), vec!["dark-mode"]);

        assert!(context::is_any_enabled(&["search", "dark-mode"]).unwrap());
        assert!(!context::is_all_enabled(&["search", "dark-mode"]).unwrap());
        assert_eq!(
            context::current_scope().unwrap(),
            (Some("acme".to_string()), Some("u1".to_string()))
        );
    })
    .await;
}

#[tokio::test]
async fn test_sync_read_without_load_is_usage_error() {
    let _client = seeded().await;
    context::scope(async {
        let err = context::is_enabled("dark-mode").unwrap_err();
        assert!(matches!(err, FlagError::ContextNotLoaded));
        assert!(err.is_usage_error());
    })
    .await;
}

#[tokio::test]
async fn test_reload_replaces_snapshot() {
    let client = seeded().await;
    context::scope(async {
        client.load_context(Some("acme"), None).await.unwrap();
        assert!(context::is_enabled("dark-mode").unwrap());

        client.load_context(Some("other"), None).await.unwrap();
        assert!(!context::is_enabled("dark-mode").unwrap());
        assert_eq!(
            context::current_scope().unwrap(),
            (Some("other".to_string()), None)
        );
    })
    .await;
}

#[tokio::test]
async fn test_cancelled_load_fails_loudly() {
    let client = client_with_cache(Arc::new(SlowCache)).await;
    client.admin().create_flag("dark-mode", true, None).await.unwrap();

    context::scope(async {
        let res = tokio::time::timeout(
            Duration::from_millis(20),
            client.load_context(Some("acme"), None),
        )
        .await;
        assert!(res.is_err());
        assert!(matches!(
            context::is_enabled("dark-mode"),
            Err(FlagError::ContextLoadIncomplete)
        ));
    })
    .await;
}

#[tokio::test]
async fn test_failed_load_hides_previous_snapshot() {
    let client = seeded().await;
    context::scope(async {
        client.load_context(Some("acme"), Some("u1")).await.unwrap();
        assert!(context::is_enabled("dark-mode").unwrap());

        client
            .store()
            .connection()
            .execute_unprepared("DROP TABLE oxflag_user_flags")
            .await
            .unwrap();

        let err = client.load_context(Some("acme"), Some("u1")).await.unwrap_err();
        assert!(matches!(err, FlagError::Store(_)));
        assert!(matches!(
            context::is_enabled("dark-mode"),
            Err(FlagError::ContextLoadIncomplete)
        ));
    })
    .await;
}

#[tokio::test]
async fn test_concurrent_requests_do_not_share_snapshots() {
    let client = Arc::new(seeded().await);

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        handles.push(tokio::spawn(context::scope(async move {
            let tenant = if i % 2 == 0 { "acme" } else { "other" };
            client.load_context(Some(tenant), None).await.unwrap();
            tokio::task::yield_now().await;
            (i, context::is_enabled("dark-mode").unwrap())
        })));
    }

    for handle in handles {
        let (i, dark_mode) = handle.await.unwrap();
        assert_eq!(dark_mode, i % 2 == 0);
    }
}

#[tokio::test]
async fn test_override_restores_previous_snapshot_on_error() {
    let client = seeded().await;
    context::scope(async {
        client.load_context(Some("other"), None).await.unwrap();
        assert!(!context::is_enabled("dark-mode").unwrap());

        let result: Result<()> = (|| {
            let _guard = context::override_flags([("dark-mode", true)])?;
            assert!(context::is_enabled("dark-mode")?);
            // 其余开关沿用覆盖前的快照
            assert!(context::is_enabled("search")?);
            context::require_enabled("missing")?;
            Ok(())
        })();
        assert!(matches!(result, Err(FlagError::FlagDisabled(name)) if name == "missing"));

        assert!(!context::is_enabled("dark-mode").unwrap());
    })
    .await;
}

#[tokio::test]
async fn test_evaluate_prefers_loaded_snapshot() {
    let client = seeded().await;
    context::scope(async {
        client.load_context(Some("acme"), None).await.unwrap();
        client
            .admin()
            .clear_tenant_override("dark-mode", "acme")
            .await
            .unwrap();

        // 同一身份：读取快照
        let names = vec!["dark-mode".to_string()];
        let snap = client.evaluate(Some(&names), Some("acme"), None).await.unwrap();
        assert_eq!(snap["dark-mode"], true);

        // 不同身份：走解析器，看到最新数据
        let live = client.evaluate(Some(&names), Some("acme"), Some("u9")).await.unwrap();
        assert_eq!(live["dark-mode"], false);
    })
    .await;

    assert!(client.resolve_async("dark-mode", Some("acme"), None).await.is_ok());
}
