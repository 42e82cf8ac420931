//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了特性开关客户端，把存储、缓存、解析器与失效器组装在一起。

use crate::admin::FlagAdmin;
use crate::cache::{build_cache, CacheBackend, CacheKeys, NullCache};
use crate::config::{CacheConfig, Config};
use crate::context::{self, ResolvedContext};
use crate::error::{FlagError, Result};
use crate::invalidation::{InvalidationScope, Invalidator};
use crate::metrics::FlagMetrics;
use crate::resolver::Resolver;
use crate::schema::{SchemaManager, SchemaReport};
use crate::store::{self, FlagStore};
use sea_orm::DatabaseConnection;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// 特性开关客户端
#[derive(Clone)]
pub struct FlagClient {
    store: FlagStore,
    cache: Arc<dyn CacheBackend>,
    resolver: Resolver,
    invalidator: Invalidator,
    metrics: FlagMetrics,
}

impl std::fmt::Debug for FlagClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagClient")
            .field("cache", &self.cache.name())
            .field("cache_degraded", &self.resolver.cache_health().is_degraded())
            .finish()
    }
}

impl FlagClient {
    /// 根据配置连接存储与缓存，并确保模式为最新
    ///
    /// 配置非法、缓存后端不可构建或迁移失败都会使初始化失败。
    #[instrument(skip(config), level = "info", fields(cache = ?config.cache.backend))]
    pub async fn connect(config: &Config) -> Result<Self> {
        config.validate().map_err(FlagError::Config)?;

        let db = store::connect(&config.database).await?;
        let cache = build_cache(&config.cache).await?;
        let client = Self::with_cache_config(db, cache, &config.cache);

        let target = config
            .schema
            .target_version
            .unwrap_or_else(crate::schema::current_version);
        client.ensure_schema(target).await?;
        info!("oxflag client ready");
        Ok(client)
    }

    /// 使用默认缓存设置（裸键、300 秒 TTL）创建客户端
    pub fn new(db: DatabaseConnection, cache: Arc<dyn CacheBackend>) -> Self {
        Self::with_cache_config(db, cache, &CacheConfig::default())
    }

    /// 不使用缓存创建客户端
    pub fn without_cache(db: DatabaseConnection) -> Self {
        Self::new(db, Arc::new(NullCache))
    }

    /// 使用缓存配置中的键前缀与 TTL 创建客户端
    pub fn with_cache_config(
        db: DatabaseConnection,
        cache: Arc<dyn CacheBackend>,
        cache_config: &CacheConfig,
    ) -> Self {
        let metrics = FlagMetrics::default();
        let keys = CacheKeys::new(cache_config.key_prefix.clone());
        let store = FlagStore::new(db);
        let resolver = Resolver::new(
            store.clone(),
            cache.clone(),
            keys.clone(),
            cache_config.ttl_secs,
            metrics.clone(),
        );
        let invalidator = Invalidator::new(cache.clone(), keys, metrics.clone());
        Self {
            store,
            cache,
            resolver,
            invalidator,
            metrics,
        }
    }

    pub fn store(&self) -> &FlagStore {
        &self.store
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn metrics(&self) -> &FlagMetrics {
        &self.metrics
    }

    pub fn cache(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    /// 带缓存失效的管理写入器
    pub fn admin(&self) -> FlagAdmin {
        FlagAdmin::new(self.store.clone(), self.invalidator.clone())
    }

    /// 应用迁移直到目标版本
    pub async fn ensure_schema(&self, target_version: i64) -> Result<SchemaReport> {
        SchemaManager::new(self.store.connection().clone())
            .ensure_schema(target_version)
            .await
    }

    /// 解析单个开关
    pub async fn resolve(
        &self,
        name: &str,
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<bool> {
        self.resolver.resolve(name, tenant_id, user_id).await
    }

    /// 逻辑或，短路
    pub async fn resolve_any(
        &self,
        names: &[&str],
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<bool> {
        self.resolver.resolve_any(names, tenant_id, user_id).await
    }

    /// 逻辑与，短路
    pub async fn resolve_all(
        &self,
        names: &[&str],
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<bool> {
        self.resolver.resolve_all(names, tenant_id, user_id).await
    }

    /// 绕过请求快照直接调用解析器
    pub async fn resolve_async(
        &self,
        name: &str,
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<bool> {
        self.resolve(name, tenant_id, user_id).await
    }

    /// 为当前请求作用域加载快照
    ///
    /// 必须在 [`context::scope`] 内调用。
    #[instrument(skip(self), level = "debug")]
    pub async fn load_context(&self, tenant_id: Option<&str>, user_id: Option<&str>) -> Result<()> {
        context::begin_load()?;
        let flags = self.resolver.resolve_snapshot(tenant_id, user_id).await?;
        debug!("Loaded {} flags into request context", flags.len());
        context::install(ResolvedContext::new(
            tenant_id.map(str::to_string),
            user_id.map(str::to_string),
            flags,
        ))
    }

    /// 求值接口
    ///
    /// 当前作用域已为同一身份加载快照时直接读取快照，否则通过解析器求值。
    /// `names` 为 None 时返回所有已知开关；未知名称映射为 false。
    #[instrument(skip(self, names), level = "debug")]
    pub async fn evaluate(
        &self,
        names: Option<&[String]>,
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<BTreeMap<String, bool>> {
        if let Ok(ctx) = context::snapshot() {
            if ctx.matches(tenant_id, user_id) {
                return Ok(match names {
                    Some(names) => names
                        .iter()
                        .map(|name| (name.clone(), ctx.lookup(name)))
                        .collect(),
                    None => ctx.flags().clone().into_iter().collect(),
                });
            }
        }

        match names {
            Some(names) => {
                let mut result = BTreeMap::new();
                for name in names {
                    let enabled = self.resolver.resolve(name, tenant_id, user_id).await?;
                    result.insert(name.clone(), enabled);
                }
                Ok(result)
            }
            None => Ok(self
                .resolver
                .resolve_snapshot(tenant_id, user_id)
                .await?
                .into_iter()
                .collect()),
        }
    }

    /// 失效指定作用域的缓存
    pub async fn invalidate(&self, scope: &InvalidationScope) -> Result<()> {
        self.invalidator.invalidate(scope).await
    }

    /// 释放缓存资源
    pub async fn close(&self) -> Result<()> {
        self.cache.close().await
    }
}
