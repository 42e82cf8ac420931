//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了特性开关系统的配置结构和解析逻辑。

use crate::error::{FlagError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;

/// 顶层配置
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// 持久化存储配置
    pub database: DatabaseConfig,
    /// 缓存配置
    pub cache: CacheConfig,
    /// 模式版本配置
    pub schema: SchemaConfig,
}

/// 数据库配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 连接字符串（sqlite:// / postgres:// / mysql://）
    pub url: String,
    /// 连接池最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

/// 缓存后端类型
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    /// 不使用缓存
    #[default]
    None,
    /// 进程内缓存
    Memory,
    /// Redis缓存
    Redis,
}

/// 缓存配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CacheConfig {
    /// 后端类型
    pub backend: CacheBackendType,
    /// Redis 连接字符串（使用 SecretString 保护）
    pub redis_url: Option<SecretString>,
    /// 缓存条目过期时间（秒），None 表示永不过期
    pub ttl_secs: Option<u64>,
    /// 键前缀，None 表示使用裸键 `flags` / `tenant:{t}` / `user:{t}:{u}`
    pub key_prefix: Option<String>,
    /// 进程内缓存最大条目数
    pub memory_capacity: u64,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendType::None,
            redis_url: None,
            ttl_secs: Some(300),
            key_prefix: None,
            memory_capacity: 10000,
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
        }
    }
}

/// 模式版本配置
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct SchemaConfig {
    /// 目标版本，None 表示最新注册的迁移版本
    pub target_version: Option<i64>,
}

impl Config {
    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FlagError::Config(format!("invalid TOML: {}", e)))
    }

    /// 从 TOML 文件解析配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlagError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有必需的字段都已设置，并且值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("database.url cannot be empty".to_string());
        }

        if self.database.max_connections == 0 {
            return Err("database.max_connections cannot be zero".to_string());
        }

        let cache = &self.cache;

        if let Some(ttl) = cache.ttl_secs {
            if ttl == 0 {
                return Err("cache.ttl_secs cannot be zero (omit it to disable expiry)".to_string());
            }
            if ttl > 86400 * 30 {
                return Err("cache.ttl_secs cannot exceed 30 days (2592000 seconds)".to_string());
            }
        }

        if let Some(prefix) = &cache.key_prefix {
            if prefix.is_empty() || prefix.chars().any(|c| c.is_whitespace() || c == ':') {
                return Err(format!(
                    "cache.key_prefix '{}' must be non-empty and contain no whitespace or ':'",
                    prefix
                ));
            }
        }

        match cache.backend {
            CacheBackendType::None => {}
            CacheBackendType::Memory => {
                if cache.memory_capacity == 0 {
                    return Err("cache.memory_capacity cannot be zero".to_string());
                }
            }
            CacheBackendType::Redis => {
                let url = cache
                    .redis_url
                    .as_ref()
                    .ok_or_else(|| "cache.redis_url is required for the redis backend".to_string())?;
                let url = url.expose_secret();
                if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                    return Err(
                        "cache.redis_url must start with redis:// or rediss://".to_string()
                    );
                }

                if !(100..=30000).contains(&cache.connection_timeout_ms) {
                    return Err(
                        "cache.connection_timeout_ms must be between 100 and 30000 ms".to_string(),
                    );
                }

                if !(100..=60000).contains(&cache.command_timeout_ms) {
                    return Err(
                        "cache.command_timeout_ms must be between 100 and 60000 ms".to_string()
                    );
                }
            }
        }

        if let Some(target) = self.schema.target_version {
            if target < 1 {
                return Err("schema.target_version must be at least 1".to_string());
            }
        }

        Ok(())
    }
}
