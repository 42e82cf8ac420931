//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 管理写入面。
//!
//! 每个写操作先通过 [`FlagStore`] 持久化，再等待对应作用域的缓存失效完成，
//! 之后才向调用方返回成功。

use crate::entity::{flag, tenant_flag, user_flag};
use crate::error::Result;
use crate::invalidation::{InvalidationScope, Invalidator};
use crate::store::FlagStore;
use tracing::{info, instrument};

/// 管理写入器
#[derive(Clone)]
pub struct FlagAdmin {
    store: FlagStore,
    invalidator: Invalidator,
}

impl FlagAdmin {
    pub fn new(store: FlagStore, invalidator: Invalidator) -> Self {
        Self { store, invalidator }
    }

    /// 创建平台开关
    #[instrument(skip(self, description), level = "info")]
    pub async fn create_flag(
        &self,
        name: &str,
        enabled: bool,
        description: Option<String>,
    ) -> Result<flag::Model> {
        let model = self.store.create_flag(name, enabled, description).await?;
        self.invalidator
            .invalidate(&InvalidationScope::Platform)
            .await?;
        info!("Created flag {} (enabled={})", name, enabled);
        Ok(model)
    }

    /// 切换平台默认值
    #[instrument(skip(self), level = "info")]
    pub async fn set_flag_enabled(&self, name: &str, enabled: bool) -> Result<flag::Model> {
        let model = self.store.set_flag_enabled(name, enabled).await?;
        self.invalidator
            .invalidate(&InvalidationScope::Platform)
            .await?;
        info!("Set flag {} enabled={}", name, enabled);
        Ok(model)
    }

    /// 修改描述
    pub async fn set_flag_description(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<flag::Model> {
        let model = self.store.set_flag_description(name, description).await?;
        self.invalidator
            .invalidate(&InvalidationScope::Platform)
            .await?;
        Ok(model)
    }

    /// 删除开关，并失效平台以及所有曾有覆盖的租户/用户作用域
    #[instrument(skip(self), level = "info")]
    pub async fn delete_flag(&self, name: &str) -> Result<()> {
        let scopes = self.store.delete_flag(name).await?;
        self.invalidator.invalidate_all(&scopes).await?;
        info!("Deleted flag {} ({} scopes invalidated)", name, scopes.len());
        Ok(())
    }

    /// 设置租户覆盖
    #[instrument(skip(self), level = "info")]
    pub async fn set_tenant_override(
        &self,
        name: &str,
        tenant_id: &str,
        enabled: bool,
    ) -> Result<tenant_flag::Model> {
        let model = self
            .store
            .upsert_tenant_override(name, tenant_id, enabled)
            .await?;
        self.invalidator
            .invalidate(&InvalidationScope::Tenant(tenant_id.to_string()))
            .await?;
        Ok(model)
    }

    /// 清除租户覆盖，返回是否存在
    #[instrument(skip(self), level = "info")]
    pub async fn clear_tenant_override(&self, name: &str, tenant_id: &str) -> Result<bool> {
        let existed = self.store.delete_tenant_override(name, tenant_id).await?;
        self.invalidator
            .invalidate(&InvalidationScope::Tenant(tenant_id.to_string()))
            .await?;
        Ok(existed)
    }

    /// 设置用户覆盖
    #[instrument(skip(self), level = "info")]
    pub async fn set_user_override(
        &self,
        name: &str,
        tenant_id: &str,
        user_id: &str,
        enabled: bool,
    ) -> Result<user_flag::Model> {
        let model = self
            .store
            .upsert_user_override(name, tenant_id, user_id, enabled)
            .await?;
        self.invalidator
            .invalidate(&InvalidationScope::User(
                tenant_id.to_string(),
                user_id.to_string(),
            ))
            .await?;
        Ok(model)
    }

    /// 清除用户覆盖，返回是否存在
    #[instrument(skip(self), level = "info")]
    pub async fn clear_user_override(
        &self,
        name: &str,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        let existed = self
            .store
            .delete_user_override(name, tenant_id, user_id)
            .await?;
        self.invalidator
            .invalidate(&InvalidationScope::User(
                tenant_id.to_string(),
                user_id.to_string(),
            ))
            .await?;
        Ok(existed)
    }
}
