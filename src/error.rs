//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了特性开关系统的错误类型和处理机制。

use thiserror::Error;

/// 特性开关系统错误类型枚举
///
/// 使用错误（未初始化、未加载上下文、配置非法）与可恢复的业务数据严格区分，
/// 调用方不会把使用错误误认为开关值。
#[derive(Error, Debug)]
pub enum FlagError {
    /// 全局客户端尚未初始化
    #[error("oxflag is not initialized: call FlagManager::init() before using the global API")]
    NotInitialized,

    /// 同步上下文API在未加载上下文时被调用
    #[error(
        "flag context is not loaded: call load_context() inside a request scope before sync flag checks, \
         or use is_enabled_async() instead"
    )]
    ContextNotLoaded,

    /// 最近一次上下文加载失败或被取消
    #[error("the last load_context() in this scope did not complete; refusing to serve a stale snapshot")]
    ContextLoadIncomplete,

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 持久化存储错误
    #[error("Store error: {0}")]
    Store(#[from] sea_orm::DbErr),

    /// 缓存后端错误
    #[error("Cache error: {0}")]
    Cache(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// 迁移步骤失败
    #[error("Migration to schema version {version} failed: {source}")]
    Migration {
        version: i64,
        #[source]
        source: sea_orm::DbErr,
    },

    /// 管理写操作引用了不存在的开关
    #[error("Unknown feature flag: {0}")]
    FlagNotFound(String),

    /// 开关未启用（用于路由守卫）
    #[error("Feature flag '{0}' is not enabled")]
    FlagDisabled(String),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FlagError {
    /// 是否为使用错误
    ///
    /// 使用错误意味着集成代码有缺陷，而不是数据或基础设施问题
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            FlagError::NotInitialized
                | FlagError::ContextNotLoaded
                | FlagError::ContextLoadIncomplete
                | FlagError::Config(_)
        )
    }
}

impl From<serde_json::Error> for FlagError {
    fn from(e: serde_json::Error) -> Self {
        FlagError::Serialization(e.to_string())
    }
}

/// 特性开关操作结果类型别名
pub type Result<T> = std::result::Result<T, FlagError>;
