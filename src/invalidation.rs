//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了写穿失效钩子。
//!
//! 每条写路径必须在写入持久化提交之后、向调用方返回成功之前，
//! 同步等待对应作用域的失效完成，否则读者可能无限期地看到旧的缓存值。

use crate::cache::{CacheBackend, CacheKeys};
use crate::error::Result;
use crate::metrics::FlagMetrics;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 失效作用域
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InvalidationScope {
    /// 平台开关集合
    Platform,
    /// 某个租户的覆盖集合
    Tenant(String),
    /// 某个租户下某个用户的覆盖集合 (tenant_id, user_id)
    User(String, String),
}

impl fmt::Display for InvalidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationScope::Platform => write!(f, "platform"),
            InvalidationScope::Tenant(t) => write!(f, "tenant({})", t),
            InvalidationScope::User(t, u) => write!(f, "user({}, {})", t, u),
        }
    }
}

/// 缓存失效器
#[derive(Clone)]
pub struct Invalidator {
    cache: Arc<dyn CacheBackend>,
    keys: CacheKeys,
    metrics: FlagMetrics,
}

impl Invalidator {
    /// 创建失效器
    pub fn new(cache: Arc<dyn CacheBackend>, keys: CacheKeys, metrics: FlagMetrics) -> Self {
        Self {
            cache,
            keys,
            metrics,
        }
    }

    /// 作用域对应的缓存键
    pub fn key_for(&self, scope: &InvalidationScope) -> String {
        match scope {
            InvalidationScope::Platform => self.keys.flags(),
            InvalidationScope::Tenant(tenant_id) => self.keys.tenant(tenant_id),
            InvalidationScope::User(tenant_id, user_id) => self.keys.user(tenant_id, user_id),
        }
    }

    /// 删除作用域对应的缓存项
    ///
    /// 与读路径不同，这里的缓存错误会返回给调用方：写入已经持久化，
    /// 但调用方需要知道缓存可能仍然持有旧值。
    #[instrument(skip(self), level = "debug", fields(scope = %scope))]
    pub async fn invalidate(&self, scope: &InvalidationScope) -> Result<()> {
        let key = self.key_for(scope);
        match self.cache.delete(&key).await {
            Ok(()) => {
                self.metrics.record("cache", "delete", "ok");
                debug!("Invalidated cache key {}", key);
                Ok(())
            }
            Err(e) => {
                self.metrics.record("cache", "delete", "error");
                warn!("Failed to invalidate cache key {}: {}", key, e);
                Err(e)
            }
        }
    }

    /// 依次失效多个作用域
    ///
    /// 遇到错误时仍会尝试剩余作用域，并返回第一个错误
    pub async fn invalidate_all(&self, scopes: &[InvalidationScope]) -> Result<()> {
        let mut first_error = None;
        for scope in scopes {
            if let Err(e) = self.invalidate(scope).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
