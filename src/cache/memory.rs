//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了进程内缓存后端的实现，基于 Moka。
//!
//! 注意：进程内缓存只在单个进程实例内有效，不在进程之间共享。
//! 多实例部署时，一个实例上的失效不会影响其他实例，调用方需要接受
//! 实例之间在 TTL 窗口内的不一致。需要集群级一致性请使用 Redis 后端。

use super::CacheBackend;
use crate::error::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// 进程内缓存后端
///
/// 值: (数据, 过期时间)
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, (String, Option<Instant>)>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MemoryCache {
    /// 创建新的进程内缓存
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大条目数
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(10000)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.cache.get(key).await {
            Some((value, expire_at)) => {
                if let Some(expire_time) = expire_at {
                    if Instant::now() >= expire_time {
                        self.cache.remove(key).await;
                        debug!("memory get: key={}, expired=true, removed", key);
                        return Ok(None);
                    }
                }
                debug!("memory get: key={}, found=true", key);
                Ok(Some(value))
            }
            None => {
                debug!("memory get: key={}, found=false", key);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()> {
        let expire_at = match ttl {
            Some(secs) if secs > 0 => Some(Instant::now() + Duration::from_secs(secs)),
            _ => None,
        };
        self.cache.insert(key.to_string(), (value, expire_at)).await;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.remove(key).await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
