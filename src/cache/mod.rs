//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存协议及其后端实现（Redis、进程内、空操作）。
//!
//! 缓存只是性能优化：所有后端都必须在任意时刻可被 [`null::NullCache`] 替换，
//! 而解析结果保持不变。

pub mod keys;
pub mod memory;
pub mod null;
pub mod redis;

use crate::config::{CacheBackendType, CacheConfig};
use crate::error::{FlagError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use self::keys::CacheKeys;
pub use self::memory::MemoryCache;
pub use self::null::NullCache;
pub use self::redis::RedisCache;

/// 缓存协议
///
/// 所有缓存后端必须满足的最小键值契约。实现必须允许多个请求并发调用。
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 获取缓存值，不存在时返回 None
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 设置缓存值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    /// * `value` - 缓存值
    /// * `ttl` - 过期时间（秒），None 表示不过期
    async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()>;

    /// 删除缓存项，键不存在时也返回成功
    async fn delete(&self, key: &str) -> Result<()>;

    /// 释放后端持有的资源
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// 后端名称，用于日志与指标
    fn name(&self) -> &'static str;
}

/// 根据配置构建缓存后端
///
/// 在初始化阶段完成后端选择；配置非法时立即失败，而不是在首次使用时失败。
pub async fn build_cache(config: &CacheConfig) -> Result<Arc<dyn CacheBackend>> {
    let cache: Arc<dyn CacheBackend> = match config.backend {
        CacheBackendType::None => Arc::new(NullCache),
        CacheBackendType::Memory => Arc::new(MemoryCache::new(config.memory_capacity)),
        CacheBackendType::Redis => {
            let url = config.redis_url.as_ref().ok_or_else(|| {
                FlagError::Config("cache.redis_url is required for the redis backend".to_string())
            })?;
            Arc::new(
                RedisCache::connect(url, config.connection_timeout_ms, config.command_timeout_ms)
                    .await?,
            )
        }
    };
    info!("Cache backend selected: {}", cache.name());
    Ok(cache)
}
