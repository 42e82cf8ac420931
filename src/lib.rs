//! oxflag - 多租户特性开关库
//!
//! 按"用户覆盖 > 租户覆盖 > 平台默认值"的层级解析布尔开关，
//! 支持可替换的缓存后端、写穿失效、请求级上下文快照和版本化模式迁移。

#![doc(html_root_url = "https://docs.rs/oxflag/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod admin;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod invalidation;
pub mod manager;
pub mod metrics;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod telemetry;

// Re-export commonly used items
pub use admin::FlagAdmin;
pub use cache::{CacheBackend, CacheKeys, MemoryCache, NullCache, RedisCache};
pub use client::FlagClient;
pub use config::Config;
pub use context::{
    current_scope, get_all, get_enabled, is_all_enabled, is_any_enabled, is_disabled, is_enabled,
    override_flags, require_enabled, with_overrides, OverrideGuard, ResolvedContext,
};
pub use error::{FlagError, Result};
pub use invalidation::InvalidationScope;
pub use manager::{get_client, shutdown, FlagManager};
pub use resolver::Resolver;
pub use schema::SchemaManager;

/// oxflag 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 使用全局客户端为当前请求作用域加载快照
///
/// 必须在 [`context::scope`] 内调用
pub async fn load_context(tenant_id: Option<&str>, user_id: Option<&str>) -> Result<()> {
    get_client()?.load_context(tenant_id, user_id).await
}

/// 使用全局客户端直接解析开关，不读取请求快照
pub async fn is_enabled_async(
    name: &str,
    tenant_id: Option<&str>,
    user_id: Option<&str>,
) -> Result<bool> {
    get_client()?.resolve_async(name, tenant_id, user_id).await
}

/// 使用全局客户端失效指定作用域
pub async fn invalidate(scope: &InvalidationScope) -> Result<()> {
    get_client()?.invalidate(scope).await
}
