//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了持久化表之上的薄查询层。
//!
//! 读操作供解析器使用，每次返回某一作用域下的完整 `name -> enabled` 映射；
//! 写操作只负责持久化，缓存失效由 [`crate::admin::FlagAdmin`] 负责。

use crate::config::DatabaseConfig;
use crate::entity::{flag, generate_id, tenant_flag, user_flag, Flag, TenantFlag, UserFlag};
use crate::error::{FlagError, Result};
use crate::invalidation::InvalidationScope;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectOptions, Database,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, instrument};

/// 打开数据库连接
///
/// SQLite 内存库在每个连接上都是独立的数据库，因此连接池大小由配置决定，
/// 默认配置为单连接。
#[instrument(skip(config), level = "info", name = "connect_store")]
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(false);
    let db = Database::connect(opt).await?;
    Ok(db)
}

/// 一条租户或用户覆盖
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OverrideEntry {
    /// 开关名
    pub flag: String,
    /// 租户标识
    pub tenant_id: String,
    /// 用户标识，租户覆盖时为空
    pub user_id: Option<String>,
    /// 覆盖值
    pub enabled: bool,
}

/// 开关存储访问器
#[derive(Debug, Clone)]
pub struct FlagStore {
    db: DatabaseConnection,
}

impl FlagStore {
    /// 创建新的存储访问器
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 底层数据库连接
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 所有平台开关的默认值
    #[instrument(skip(self), level = "debug")]
    pub async fn platform_flags(&self) -> Result<HashMap<String, bool>> {
        let rows: Vec<(String, bool)> = Flag::find()
            .select_only()
            .column(flag::Column::Name)
            .column(flag::Column::Enabled)
            .into_tuple()
            .all(&self.db)
            .await?;
        debug!("loaded {} platform flags", rows.len());
        Ok(rows.into_iter().collect())
    }

    /// 指定租户的所有覆盖
    #[instrument(skip(self), level = "debug")]
    pub async fn tenant_overrides(&self, tenant_id: &str) -> Result<HashMap<String, bool>> {
        let rows = TenantFlag::find()
            .filter(tenant_flag::Column::TenantId.eq(tenant_id))
            .find_also_related(Flag)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(o, f)| f.map(|f| (f.name, o.enabled)))
            .collect())
    }

    /// 指定租户下指定用户的所有覆盖
    #[instrument(skip(self), level = "debug")]
    pub async fn user_overrides(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<HashMap<String, bool>> {
        let rows = UserFlag::find()
            .filter(user_flag::Column::TenantId.eq(tenant_id))
            .filter(user_flag::Column::UserId.eq(user_id))
            .find_also_related(Flag)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(o, f)| f.map(|f| (f.name, o.enabled)))
            .collect())
    }

    /// 按名称查找平台开关
    pub async fn get_flag(&self, name: &str) -> Result<Option<flag::Model>> {
        Ok(Flag::find()
            .filter(flag::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }

    /// 按名称排序列出所有平台开关
    pub async fn list_flags(&self) -> Result<Vec<flag::Model>> {
        Ok(Flag::find()
            .order_by_asc(flag::Column::Name)
            .all(&self.db)
            .await?)
    }

    /// 列出租户与用户覆盖
    ///
    /// 指定 `name` 时只列出该开关的覆盖，开关不存在时返回 `FlagNotFound`。
    /// 结果按开关名、租户、用户排序，租户覆盖排在同租户的用户覆盖之前。
    #[instrument(skip(self), level = "debug")]
    pub async fn list_overrides(&self, name: Option<&str>) -> Result<Vec<OverrideEntry>> {
        let flag_id = match name {
            Some(name) => Some(self.require_flag(name).await?.id),
            None => None,
        };

        let mut tenant_query = TenantFlag::find();
        let mut user_query = UserFlag::find();
        if let Some(id) = &flag_id {
            tenant_query = tenant_query.filter(tenant_flag::Column::FlagId.eq(id.as_str()));
            user_query = user_query.filter(user_flag::Column::FlagId.eq(id.as_str()));
        }

        let tenant_rows = tenant_query.find_also_related(Flag).all(&self.db).await?;
        let user_rows = user_query.find_also_related(Flag).all(&self.db).await?;

        let mut entries: Vec<OverrideEntry> = tenant_rows
            .into_iter()
            .filter_map(|(o, f)| {
                f.map(|f| OverrideEntry {
                    flag: f.name,
                    tenant_id: o.tenant_id,
                    user_id: None,
                    enabled: o.enabled,
                })
            })
            .chain(user_rows.into_iter().filter_map(|(o, f)| {
                f.map(|f| OverrideEntry {
                    flag: f.name,
                    tenant_id: o.tenant_id,
                    user_id: Some(o.user_id),
                    enabled: o.enabled,
                })
            }))
            .collect();
        entries.sort();
        debug!("listed {} overrides", entries.len());
        Ok(entries)
    }

    async fn require_flag(&self, name: &str) -> Result<flag::Model> {
        self.get_flag(name)
            .await?
            .ok_or_else(|| FlagError::FlagNotFound(name.to_string()))
    }

    /// 创建平台开关
    #[instrument(skip(self, description), level = "debug")]
    pub async fn create_flag(
        &self,
        name: &str,
        enabled: bool,
        description: Option<String>,
    ) -> Result<flag::Model> {
        let now = Utc::now();
        let model = flag::ActiveModel {
            id: Set(generate_id()),
            name: Set(name.to_string()),
            description: Set(description),
            enabled: Set(enabled),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;
        Ok(model)
    }

    /// 修改平台开关默认值
    #[instrument(skip(self), level = "debug")]
    pub async fn set_flag_enabled(&self, name: &str, enabled: bool) -> Result<flag::Model> {
        let mut am: flag::ActiveModel = self.require_flag(name).await?.into();
        am.enabled = Set(enabled);
        am.updated_at = Set(Utc::now());
        Ok(am.update(&self.db).await?)
    }

    /// 修改平台开关描述
    pub async fn set_flag_description(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<flag::Model> {
        let mut am: flag::ActiveModel = self.require_flag(name).await?.into();
        am.description = Set(description);
        am.updated_at = Set(Utc::now());
        Ok(am.update(&self.db).await?)
    }

    /// 删除平台开关及其全部覆盖
    ///
    /// 返回受影响的作用域（平台 + 曾有覆盖的租户/用户），调用方据此失效缓存。
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_flag(&self, name: &str) -> Result<Vec<InvalidationScope>> {
        let flag = self.require_flag(name).await?;
        let txn = self.db.begin().await?;

        let tenants: BTreeSet<String> = TenantFlag::find()
            .filter(tenant_flag::Column::FlagId.eq(flag.id.as_str()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|o| o.tenant_id)
            .collect();
        let users: BTreeSet<(String, String)> = UserFlag::find()
            .filter(user_flag::Column::FlagId.eq(flag.id.as_str()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|o| (o.tenant_id, o.user_id))
            .collect();

        TenantFlag::delete_many()
            .filter(tenant_flag::Column::FlagId.eq(flag.id.as_str()))
            .exec(&txn)
            .await?;
        UserFlag::delete_many()
            .filter(user_flag::Column::FlagId.eq(flag.id.as_str()))
            .exec(&txn)
            .await?;
        Flag::delete_by_id(flag.id.clone()).exec(&txn).await?;
        txn.commit().await?;

        let mut scopes = vec![InvalidationScope::Platform];
        scopes.extend(tenants.into_iter().map(InvalidationScope::Tenant));
        scopes.extend(
            users
                .into_iter()
                .map(|(tenant_id, user_id)| InvalidationScope::User(tenant_id, user_id)),
        );
        Ok(scopes)
    }

    /// 创建或更新租户覆盖
    #[instrument(skip(self), level = "debug")]
    pub async fn upsert_tenant_override(
        &self,
        name: &str,
        tenant_id: &str,
        enabled: bool,
    ) -> Result<tenant_flag::Model> {
        let flag = self.require_flag(name).await?;
        let now = Utc::now();
        let existing = TenantFlag::find()
            .filter(tenant_flag::Column::FlagId.eq(flag.id.as_str()))
            .filter(tenant_flag::Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?;

        let model = match existing {
            Some(model) => {
                let mut am: tenant_flag::ActiveModel = model.into();
                am.enabled = Set(enabled);
                am.updated_at = Set(now);
                am.update(&self.db).await?
            }
            None => {
                tenant_flag::ActiveModel {
                    id: Set(generate_id()),
                    flag_id: Set(flag.id),
                    tenant_id: Set(tenant_id.to_string()),
                    enabled: Set(enabled),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&self.db)
                .await?
            }
        };
        Ok(model)
    }

    /// 删除租户覆盖，返回是否存在
    pub async fn delete_tenant_override(&self, name: &str, tenant_id: &str) -> Result<bool> {
        let flag = self.require_flag(name).await?;
        let res = TenantFlag::delete_many()
            .filter(tenant_flag::Column::FlagId.eq(flag.id.as_str()))
            .filter(tenant_flag::Column::TenantId.eq(tenant_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    /// 创建或更新用户覆盖
    #[instrument(skip(self), level = "debug")]
    pub async fn upsert_user_override(
        &self,
        name: &str,
        tenant_id: &str,
        user_id: &str,
        enabled: bool,
    ) -> Result<user_flag::Model> {
        let flag = self.require_flag(name).await?;
        let now = Utc::now();
        let existing = UserFlag::find()
            .filter(user_flag::Column::FlagId.eq(flag.id.as_str()))
            .filter(user_flag::Column::TenantId.eq(tenant_id))
            .filter(user_flag::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;

        let model = match existing {
            Some(model) => {
                let mut am: user_flag::ActiveModel = model.into();
                am.enabled = Set(enabled);
                am.updated_at = Set(now);
                am.update(&self.db).await?
            }
            None => {
                user_flag::ActiveModel {
                    id: Set(generate_id()),
                    flag_id: Set(flag.id),
                    tenant_id: Set(tenant_id.to_string()),
                    user_id: Set(user_id.to_string()),
                    enabled: Set(enabled),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&self.db)
                .await?
            }
        };
        Ok(model)
    }

    /// 删除用户覆盖，返回是否存在
    pub async fn delete_user_override(
        &self,
        name: &str,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        let flag = self.require_flag(name).await?;
        let res = UserFlag::delete_many()
            .filter(user_flag::Column::FlagId.eq(flag.id.as_str()))
            .filter(user_flag::Column::TenantId.eq(tenant_id))
            .filter(user_flag::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }
}
