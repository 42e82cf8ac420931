//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了开关的层级解析：用户覆盖 > 租户覆盖 > 平台默认值。
//!
//! 每一层查找都先读缓存，未命中时查询存储并回填缓存。缓存读写从不改变
//! 解析结果；缓存后端出错时在此边界被吞掉并按未命中处理，存储出错则
//! 原样返回给调用方，平台默认值是数据而不是失败时的兜底假设。

use crate::cache::{CacheBackend, CacheKeys};
use crate::error::Result;
use crate::metrics::FlagMetrics;
use crate::store::FlagStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 缓存健康状态
///
/// 一次连续失败只在开始时记录一条 warn，恢复时记录一条 info，
/// 中间的失败降为 debug，避免日志泛滥但不会永久静默。
#[derive(Debug, Default)]
pub struct CacheHealth {
    degraded: AtomicBool,
    failures: AtomicU64,
}

impl CacheHealth {
    /// 当前是否处于降级状态
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn on_failure(&self, op: &str, key: &str, err: &dyn std::fmt::Display) {
        self.failures.fetch_add(1, Ordering::AcqRel);
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(
                "Cache unavailable ({} {}): {}; treating as miss and reading from store",
                op, key, err
            );
        } else {
            debug!("Cache still unavailable ({} {}): {}", op, key, err);
        }
    }

    fn on_success(&self) {
        if self.degraded.load(Ordering::Acquire) && self.degraded.swap(false, Ordering::AcqRel) {
            let failures = self.failures.swap(0, Ordering::AcqRel);
            info!("Cache recovered after {} failed operations", failures);
        }
    }
}

/// 开关解析器
#[derive(Clone)]
pub struct Resolver {
    store: FlagStore,
    cache: Arc<dyn CacheBackend>,
    keys: CacheKeys,
    ttl: Option<u64>,
    health: Arc<CacheHealth>,
    metrics: FlagMetrics,
}

impl Resolver {
    /// 创建解析器
    ///
    /// # 参数
    ///
    /// * `store` - 存储访问器
    /// * `cache` - 缓存后端
    /// * `keys` - 缓存键生成器
    /// * `ttl` - 回填缓存时使用的过期时间（秒）
    /// * `metrics` - 指标收集器
    pub fn new(
        store: FlagStore,
        cache: Arc<dyn CacheBackend>,
        keys: CacheKeys,
        ttl: Option<u64>,
        metrics: FlagMetrics,
    ) -> Self {
        Self {
            store,
            cache,
            keys,
            ttl,
            health: Arc::new(CacheHealth::default()),
            metrics,
        }
    }

    /// 缓存健康状态
    pub fn cache_health(&self) -> &CacheHealth {
        &self.health
    }

    /// 解析单个开关
    ///
    /// 按顺序短路：
    /// 1. tenant 与 user 都存在时查找用户覆盖
    /// 2. tenant 存在时查找租户覆盖
    /// 3. 查找平台默认值
    /// 4. 都不存在时记录 warn 并返回 false
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(
        &self,
        name: &str,
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<bool> {
        if let (Some(tenant_id), Some(user_id)) = (tenant_id, user_id) {
            if let Some(enabled) = self.user_overrides(tenant_id, user_id).await?.get(name) {
                return Ok(*enabled);
            }
        }

        if let Some(tenant_id) = tenant_id {
            if let Some(enabled) = self.tenant_overrides(tenant_id).await?.get(name) {
                return Ok(*enabled);
            }
        }

        if let Some(enabled) = self.platform_flags().await?.get(name) {
            return Ok(*enabled);
        }

        self.metrics.record("resolver", "resolve", "unknown");
        warn!(flag = name, "Unknown feature flag '{}', returning false", name);
        Ok(false)
    }

    /// 任一开关为 true 即返回 true，遇到第一个 true 立即停止
    pub async fn resolve_any(
        &self,
        names: &[&str],
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<bool> {
        for name in names {
            if self.resolve(name, tenant_id, user_id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 所有开关为 true 才返回 true，遇到第一个 false 立即停止
    pub async fn resolve_all(
        &self,
        names: &[&str],
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<bool> {
        for name in names {
            if !self.resolve(name, tenant_id, user_id).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 解析所有已知平台开关在给定作用域下的值
    ///
    /// 用于构建请求级快照，结果只包含平台开关表中存在的名称。
    /// 三个作用域并发读取，任一存储错误都会使整个快照失败。
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve_snapshot(
        &self,
        tenant_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<HashMap<String, bool>> {
        let tenant = async {
            match tenant_id {
                Some(t) => self.tenant_overrides(t).await,
                None => Ok(HashMap::new()),
            }
        };
        let user = async {
            match (tenant_id, user_id) {
                (Some(t), Some(u)) => self.user_overrides(t, u).await,
                _ => Ok(HashMap::new()),
            }
        };
        let (platform, tenant, user) =
            futures::future::try_join3(self.platform_flags(), tenant, user).await?;

        Ok(platform
            .into_iter()
            .map(|(name, default)| {
                let enabled = user
                    .get(&name)
                    .or_else(|| tenant.get(&name))
                    .copied()
                    .unwrap_or(default);
                (name, enabled)
            })
            .collect())
    }

    async fn platform_flags(&self) -> Result<HashMap<String, bool>> {
        self.scope_map(self.keys.flags(), self.store.platform_flags())
            .await
    }

    async fn tenant_overrides(&self, tenant_id: &str) -> Result<HashMap<String, bool>> {
        self.scope_map(
            self.keys.tenant(tenant_id),
            self.store.tenant_overrides(tenant_id),
        )
        .await
    }

    async fn user_overrides(&self, tenant_id: &str, user_id: &str) -> Result<HashMap<String, bool>> {
        self.scope_map(
            self.keys.user(tenant_id, user_id),
            self.store.user_overrides(tenant_id, user_id),
        )
        .await
    }

    /// 读取某一作用域的映射：缓存命中直接返回，否则查询存储并回填
    async fn scope_map<F>(&self, key: String, load: F) -> Result<HashMap<String, bool>>
    where
        F: Future<Output = Result<HashMap<String, bool>>>,
    {
        if let Some(map) = self.cache_read(&key).await {
            return Ok(map);
        }

        let map = match load.await {
            Ok(map) => map,
            Err(e) => {
                self.metrics.record("store", "load", "error");
                return Err(e);
            }
        };
        self.metrics.record("store", "load", "ok");
        self.cache_write(&key, &map).await;
        Ok(map)
    }

    async fn cache_read(&self, key: &str) -> Option<HashMap<String, bool>> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => {
                self.health.on_success();
                match decode_entry(&raw) {
                    Ok(map) => {
                        self.metrics.record("cache", "get", "hit");
                        Some(map)
                    }
                    Err(e) => {
                        self.metrics.record("cache", "get", "corrupt");
                        warn!("Discarding unreadable cache entry {}: {}", key, e);
                        None
                    }
                }
            }
            Ok(None) => {
                self.health.on_success();
                self.metrics.record("cache", "get", "miss");
                None
            }
            Err(e) => {
                self.metrics.record("cache", "get", "error");
                self.health.on_failure("get", key, &e);
                None
            }
        }
    }

    async fn cache_write(&self, key: &str, map: &HashMap<String, bool>) {
        let raw = match encode_entry(map) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to encode cache entry {}: {}", key, e);
                return;
            }
        };
        match self.cache.set(key, raw, self.ttl).await {
            Ok(()) => {
                self.health.on_success();
                self.metrics.record("cache", "set", "ok");
            }
            Err(e) => {
                self.metrics.record("cache", "set", "error");
                self.health.on_failure("set", key, &e);
            }
        }
    }
}

/// 把开关映射编码为缓存条目
fn encode_entry(map: &HashMap<String, bool>) -> Result<String> {
    Ok(serde_json::to_string(map)?)
}

/// 解码缓存条目，内容不可读时返回序列化错误
fn decode_entry(raw: &str) -> Result<HashMap<String, bool>> {
    Ok(serde_json::from_str(raw)?)
}
