//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于 Redis 的网络缓存后端。
//!
//! 后端本身只负责把错误如实返回；把 Redis 不可用降级为"总是未命中"
//! 是解析器边界的职责。

use super::CacheBackend;
use crate::error::{FlagError, Result};
use ::redis::{aio::ConnectionManager, AsyncCommands, Client, RedisResult};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::time::{timeout, Duration};
use tracing::{debug, instrument, warn};

/// Redis 缓存后端
///
/// 启动时 Redis 不可达不会导致构建失败，连接会在之后的命令中按需建立；
/// 在连接建立之前，每条命令都返回缓存错误。
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
    manager: Arc<OnceCell<ConnectionManager>>,
    connection_timeout_ms: u64,
    command_timeout_ms: u64,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("connected", &self.is_connected())
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("command_timeout_ms", &self.command_timeout_ms)
            .finish()
    }
}

impl RedisCache {
    /// 连接 Redis
    ///
    /// 只有连接字符串格式错误才返回配置错误；连接超时或被拒绝时记录警告，
    /// 并返回一个延迟连接的后端。
    ///
    /// # 参数
    ///
    /// * `url` - 连接字符串
    /// * `connection_timeout_ms` - 建立连接的超时时间（毫秒）
    /// * `command_timeout_ms` - 单条命令的超时时间（毫秒）
    #[instrument(skip(url), level = "info", name = "init_redis_cache")]
    pub async fn connect(
        url: &SecretString,
        connection_timeout_ms: u64,
        command_timeout_ms: u64,
    ) -> Result<Self> {
        let client = Client::open(url.expose_secret())
            .map_err(|e| FlagError::Config(format!("invalid redis connection string: {}", e)))?;

        let cache = Self {
            client,
            manager: Arc::new(OnceCell::new()),
            connection_timeout_ms,
            command_timeout_ms,
        };

        if let Err(e) = cache.connection().await {
            warn!("Redis unavailable at startup, will connect on demand: {}", e);
        }
        Ok(cache)
    }

    /// 是否已建立连接
    pub fn is_connected(&self) -> bool {
        self.manager.initialized()
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                match timeout(
                    Duration::from_millis(self.connection_timeout_ms),
                    self.client.get_connection_manager(),
                )
                .await
                {
                    Ok(res) => res
                        .map(|manager| {
                            debug!("redis connection established");
                            manager
                        })
                        .map_err(FlagError::from),
                    Err(_) => Err(FlagError::Cache(format!(
                        "Connection timed out after {}ms",
                        self.connection_timeout_ms
                    ))),
                }
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match timeout(Duration::from_millis(self.command_timeout_ms), fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(FlagError::Cache(format!(
                "redis {} timed out after {}ms",
                op, self.command_timeout_ms
            ))),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = self.bounded("GET", conn.get(key)).await?;
        debug!("redis get: key={}, found={}", key, value.is_some());
        Ok(value)
    }

    #[instrument(skip(self, value), level = "debug", fields(value_len = value.len()))]
    async fn set(&self, key: &str, value: String, ttl: Option<u64>) -> Result<()> {
        let mut conn = self.connection().await?;
        match ttl {
            Some(secs) if secs > 0 => {
                let _: () = self
                    .bounded("SET EX", conn.set_ex(key, value, secs))
                    .await?;
            }
            _ => {
                let _: () = self.bounded("SET", conn.set(key, value)).await?;
            }
        }
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = self.bounded("DEL", conn.del(key)).await?;
        debug!("redis delete: key={}", key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
