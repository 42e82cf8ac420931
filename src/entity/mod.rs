//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 持久化实体定义（平台开关、租户覆盖、用户覆盖、模式版本）。

pub mod flag;
pub mod schema_version;
pub mod tenant_flag;
pub mod user_flag;

pub use flag::Entity as Flag;
pub use schema_version::Entity as SchemaVersion;
pub use tenant_flag::Entity as TenantFlag;
pub use user_flag::Entity as UserFlag;

/// 生成实体主键
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
