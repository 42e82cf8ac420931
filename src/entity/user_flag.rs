//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 用户覆盖实体。每个 (flag, tenant, user) 至多一条，由唯一索引 `uq_user_flag` 保证。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oxflag_user_flags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub flag_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub enabled: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::flag::Entity",
        from = "Column::FlagId",
        to = "super::flag::Column::Id",
        on_delete = "Cascade"
    )]
    Flag,
}

impl Related<super::flag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Flag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
