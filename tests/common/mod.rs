//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和设置。

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use oxflag::cache::CacheBackend;
use oxflag::config::DatabaseConfig;
use oxflag::error::Result;
use oxflag::schema::{current_version, SchemaManager};
use oxflag::{store, FlagClient};
use sea_orm::DatabaseConnection;
use std::sync::{Arc, Once};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

/// 打开一个已迁移到最新版本的 SQLite 内存库
pub async fn memory_db() -> DatabaseConnection {
    setup_logging();
    let db = store::connect(&DatabaseConfig::default())
        .await
        .expect("open sqlite memory database");
    SchemaManager::new(db.clone())
        .ensure_schema(current_version())
        .await
        .expect("migrate sqlite memory database");
    db
}

/// 基于 SQLite 内存库与给定缓存的客户端
pub async fn client_with_cache(cache: Arc<dyn CacheBackend>) -> FlagClient {
    FlagClient::new(memory_db().await, cache)
}

/// 临时文件中的 SQLite 数据库 URL，多个连接共享同一个库
pub fn sqlite_file_url(dir: &tempfile::TempDir, name: &str) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join(name).display())
}

/// 检查 Redis 是否可用
pub async fn is_redis_available(url: &str) -> bool {
    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(_) => return false,
    };
    matches!(
        tokio::time::timeout(
            std::time::Duration::from_millis(500),
            client.get_multiplexed_async_connection()
        )
        .await,
        Ok(Ok(_))
    )
}

/// 测试用 Redis URL
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

mock! {
    pub Cache {}

    #[async_trait]
    impl CacheBackend for Cache {
        async fn get(&self, key: &str) -> Result<Option<String>>;
        async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()>;
        async fn delete(&self, key: &str) -> Result<()>;
        async fn close(&self) -> Result<()>;
        fn name(&self) -> &'static str;
    }
}
