//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了模式版本管理器：读取持久化的整数版本号，并按严格升序
//! 逐步应用迁移，使存储布局在多次部署之间保持一致。
//!
//! 每个迁移步骤在独立事务中执行，事务的第一条语句是对版本行的
//! 自赋值写入（`UPDATE ... SET version = version`），它在 PostgreSQL/MySQL
//! 上获取行锁，在 SQLite 上获取数据库写锁。持锁后重新读取版本号，
//! 因此多个进程并发初始化时同一步骤只会被应用一次。
//!
//! 注意：MySQL 的 DDL 会隐式提交事务，步骤中途失败时已执行的 DDL 不会回滚，
//! 但版本号仍停留在上一个完整步骤。

use crate::entity::{flag, schema_version, tenant_flag, user_flag, Flag, SchemaVersion, TenantFlag, UserFlag};
use crate::error::{FlagError, Result};
use sea_orm::sea_query::{Expr, Index, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, QueryFilter, Schema, Statement, StatementBuilder, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

const VERSION_ROW_ID: i32 = 1;

/// 迁移步骤
#[derive(Clone)]
pub struct Migration {
    /// 应用后的版本号
    pub version: i64,
    /// 步骤说明
    pub description: &'static str,
    /// 生成该步骤在指定后端上的语句
    pub statements: fn(DbBackend) -> Vec<Statement>,
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish()
    }
}

/// 一次 `ensure_schema` 的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReport {
    /// 执行前的持久化版本
    pub from_version: i64,
    /// 执行后的持久化版本
    pub to_version: i64,
    /// 本次应用的迁移版本
    pub applied: Vec<i64>,
}

fn build<S: StatementBuilder>(backend: DbBackend, stmt: &S) -> Statement {
    backend.build(stmt)
}

fn create_flag_tables(backend: DbBackend) -> Vec<Statement> {
    let schema = Schema::new(backend);
    vec![
        build(backend, schema.create_table_from_entity(Flag).if_not_exists()),
        build(backend, schema.create_table_from_entity(TenantFlag).if_not_exists()),
        build(backend, schema.create_table_from_entity(UserFlag).if_not_exists()),
        build(
            backend,
            Index::create()
                .if_not_exists()
                .name("uq_tenant_flag")
                .table(TenantFlag)
                .col(tenant_flag::Column::FlagId)
                .col(tenant_flag::Column::TenantId)
                .unique(),
        ),
        build(
            backend,
            Index::create()
                .if_not_exists()
                .name("uq_user_flag")
                .table(UserFlag)
                .col(user_flag::Column::FlagId)
                .col(user_flag::Column::TenantId)
                .col(user_flag::Column::UserId)
                .unique(),
        ),
    ]
}

fn create_lookup_indexes(backend: DbBackend) -> Vec<Statement> {
    vec![
        build(
            backend,
            Index::create()
                .if_not_exists()
                .name("idx_tenant_flags_tenant")
                .table(TenantFlag)
                .col(tenant_flag::Column::TenantId),
        ),
        build(
            backend,
            Index::create()
                .if_not_exists()
                .name("idx_user_flags_scope")
                .table(UserFlag)
                .col(user_flag::Column::TenantId)
                .col(user_flag::Column::UserId),
        ),
        build(
            backend,
            Index::create()
                .if_not_exists()
                .name("idx_flags_enabled")
                .table(Flag)
                .col(flag::Column::Enabled),
        ),
    ]
}

/// 内置迁移序列
pub fn builtin_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "create flag and override tables",
            statements: create_flag_tables,
        },
        Migration {
            version: 2,
            description: "add override lookup indexes",
            statements: create_lookup_indexes,
        },
    ]
}

/// 当前代码期望的模式版本
pub fn current_version() -> i64 {
    builtin_migrations().last().map(|m| m.version).unwrap_or(0)
}

/// 模式版本管理器
#[derive(Debug, Clone)]
pub struct SchemaManager {
    db: DatabaseConnection,
    migrations: Vec<Migration>,
}

impl SchemaManager {
    /// 使用内置迁移创建管理器
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            migrations: builtin_migrations(),
        }
    }

    /// 使用自定义迁移序列创建管理器
    ///
    /// 版本号必须从 1 开始连续递增
    pub fn with_migrations(db: DatabaseConnection, migrations: Vec<Migration>) -> Result<Self> {
        for (idx, migration) in migrations.iter().enumerate() {
            let expected = idx as i64 + 1;
            if migration.version != expected {
                return Err(FlagError::Config(format!(
                    "migration versions must be contiguous from 1: expected {}, found {}",
                    expected, migration.version
                )));
            }
        }
        Ok(Self { db, migrations })
    }

    /// 已注册的最高版本
    pub fn latest_version(&self) -> i64 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    /// 读取持久化版本，未初始化时返回 0
    pub async fn persisted_version(&self) -> Result<i64> {
        self.bootstrap().await?;
        let row = SchemaVersion::find_by_id(VERSION_ROW_ID).one(&self.db).await?;
        Ok(row.map(|r| r.version).unwrap_or(0))
    }

    /// 确保模式达到目标版本
    ///
    /// 幂等，可以在每次进程启动时调用。版本号只增不减：持久化版本高于
    /// 目标版本时不做任何事。
    #[instrument(skip(self), level = "info", fields(latest = self.latest_version()))]
    pub async fn ensure_schema(&self, target_version: i64) -> Result<SchemaReport> {
        if target_version < 0 || target_version > self.latest_version() {
            return Err(FlagError::Config(format!(
                "target schema version {} is outside the registered range 0..={}",
                target_version,
                self.latest_version()
            )));
        }

        let from_version = self.persisted_version().await?;
        let mut applied = Vec::new();

        if from_version >= target_version {
            debug!(
                "Schema already at version {} (target {}), nothing to do",
                from_version, target_version
            );
            return Ok(SchemaReport {
                from_version,
                to_version: from_version,
                applied,
            });
        }

        for migration in self
            .migrations
            .iter()
            .filter(|m| m.version > from_version && m.version <= target_version)
        {
            if self.apply_step(migration).await? {
                applied.push(migration.version);
            }
        }

        let to_version = self.persisted_version().await?;
        info!(
            "Schema migrated from version {} to {} ({} steps applied)",
            from_version,
            to_version,
            applied.len()
        );

        Ok(SchemaReport {
            from_version,
            to_version,
            applied,
        })
    }

    /// 创建版本表并插入初始行（版本 0）
    async fn bootstrap(&self) -> Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        self.db
            .execute(build(
                backend,
                schema.create_table_from_entity(SchemaVersion).if_not_exists(),
            ))
            .await?;

        SchemaVersion::insert(schema_version::ActiveModel {
            id: Set(VERSION_ROW_ID),
            version: Set(0),
        })
        .on_conflict(
            OnConflict::column(schema_version::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;
        Ok(())
    }

    /// 应用单个迁移步骤，返回是否由本进程实际应用
    #[instrument(skip(self, migration), level = "info", fields(version = migration.version))]
    async fn apply_step(&self, migration: &Migration) -> Result<bool> {
        let txn = self.db.begin().await?;

        let locked_version = match Self::lock_version(&txn).await {
            Ok(v) => v,
            Err(e) => {
                let _ = txn.rollback().await;
                return Err(e);
            }
        };

        if locked_version >= migration.version {
            debug!(
                "Migration {} already applied by another instance (persisted {})",
                migration.version, locked_version
            );
            txn.commit().await?;
            return Ok(false);
        }

        if locked_version != migration.version - 1 {
            let _ = txn.rollback().await;
            return Err(FlagError::Config(format!(
                "persisted schema version {} cannot be upgraded by step {}",
                locked_version, migration.version
            )));
        }

        let backend = txn.get_database_backend();
        for stmt in (migration.statements)(backend) {
            if let Err(source) = txn.execute(stmt).await {
                warn!(
                    "Migration {} ({}) failed, rolling back: {}",
                    migration.version, migration.description, source
                );
                let _ = txn.rollback().await;
                return Err(FlagError::Migration {
                    version: migration.version,
                    source,
                });
            }
        }

        let result = SchemaVersion::update_many()
            .col_expr(schema_version::Column::Version, Expr::value(migration.version))
            .filter(schema_version::Column::Id.eq(VERSION_ROW_ID))
            .exec(&txn)
            .await;
        if let Err(source) = result {
            let _ = txn.rollback().await;
            return Err(FlagError::Migration {
                version: migration.version,
                source,
            });
        }

        txn.commit().await.map_err(|source| FlagError::Migration {
            version: migration.version,
            source,
        })?;

        info!(
            "Applied migration {}: {}",
            migration.version, migration.description
        );
        Ok(true)
    }

    /// 在事务内锁定版本行并返回持锁后的版本号
    async fn lock_version(txn: &DatabaseTransaction) -> Result<i64> {
        SchemaVersion::update_many()
            .col_expr(
                schema_version::Column::Version,
                Expr::col(schema_version::Column::Version).into(),
            )
            .filter(schema_version::Column::Id.eq(VERSION_ROW_ID))
            .exec(txn)
            .await?;

        let row = SchemaVersion::find_by_id(VERSION_ROW_ID).one(txn).await?;
        Ok(row.map(|r| r.version).unwrap_or(0))
    }
}
