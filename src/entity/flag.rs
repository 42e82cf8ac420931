//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 平台开关实体。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 平台开关
///
/// `name` 全局唯一，`enabled` 是没有任何覆盖时的默认值
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oxflag_flags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tenant_flag::Entity")]
    TenantFlag,
    #[sea_orm(has_many = "super::user_flag::Entity")]
    UserFlag,
}

impl Related<super::tenant_flag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TenantFlag.def()
    }
}

impl Related<super::user_flag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserFlag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
