//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 模式版本管理测试：幂等、失败恢复与并发初始化

#[path = "../common/mod.rs"]
mod common;

use common::{setup_logging, sqlite_file_url};
use oxflag::config::DatabaseConfig;
use oxflag::error::FlagError;
use oxflag::schema::{builtin_migrations, current_version, Migration, SchemaManager};
use oxflag::store;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};

async fn fresh_db() -> DatabaseConnection {
    setup_logging();
    store::connect(&DatabaseConfig::default()).await.unwrap()
}

fn broken_step(backend: DbBackend) -> Vec<Statement> {
    vec![
        Statement::from_string(
            backend,
            "CREATE TABLE oxflag_audit (id INTEGER PRIMARY KEY)".to_string(),
        ),
        Statement::from_string(
            backend,
            "INSERT INTO oxflag_missing_table (id) VALUES (1)".to_string(),
        ),
    ]
}

fn fixed_step(backend: DbBackend) -> Vec<Statement> {
    vec![Statement::from_string(
        backend,
        "CREATE TABLE IF NOT EXISTS oxflag_audit (id INTEGER PRIMARY KEY)".to_string(),
    )]
}

fn with_step(statements: fn(DbBackend) -> Vec<Statement>) -> Vec<Migration> {
    let mut migrations = builtin_migrations();
    migrations.push(Migration {
        version: migrations.len() as i64 + 1,
        description: "audit table",
        statements,
    });
    migrations
}

#[tokio::test]
async fn test_fresh_database_reports_version_zero() {
    let manager = SchemaManager::new(fresh_db().await);
    assert_eq!(manager.persisted_version().await.unwrap(), 0);
    assert_eq!(manager.latest_version(), current_version());
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let manager = SchemaManager::new(fresh_db().await);

    let first = manager.ensure_schema(current_version()).await.unwrap();
    assert_eq!(first.from_version, 0);
    assert_eq!(first.to_version, current_version());
    assert_eq!(
        first.applied,
        (1..=current_version()).collect::<Vec<_>>()
    );

    let second = manager.ensure_schema(current_version()).await.unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.from_version, current_version());
    assert_eq!(second.to_version, current_version());
}

#[tokio::test]
async fn test_builtin_ddl_can_be_replayed() {
    let db = fresh_db().await;
    SchemaManager::new(db.clone())
        .ensure_schema(current_version())
        .await
        .unwrap();

    // 步骤中途失败后重放已执行过的语句不会因对象已存在而失败
    for m in builtin_migrations() {
        for stmt in (m.statements)(DbBackend::Sqlite) {
            db.execute(stmt).await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_partial_target_then_upgrade() {
    let manager = SchemaManager::new(fresh_db().await);

    let report = manager.ensure_schema(1).await.unwrap();
    assert_eq!(report.applied, vec![1]);
    assert_eq!(manager.persisted_version().await.unwrap(), 1);

    let report = manager.ensure_schema(current_version()).await.unwrap();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.applied, (2..=current_version()).collect::<Vec<_>>());

    // 版本号不会回退
    let report = manager.ensure_schema(1).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.to_version, current_version());
}

#[tokio::test]
async fn test_failed_step_keeps_last_completed_version() {
    let db = fresh_db().await;
    let broken = SchemaManager::with_migrations(db.clone(), with_step(broken_step)).unwrap();
    let target = broken.latest_version();

    let err = broken.ensure_schema(target).await.unwrap_err();
    match err {
        FlagError::Migration { version, .. } => assert_eq!(version, target),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(broken.persisted_version().await.unwrap(), target - 1);

    // 修复后的重试从上一个完整步骤继续
    let fixed = SchemaManager::with_migrations(db, with_step(fixed_step)).unwrap();
    let report = fixed.ensure_schema(target).await.unwrap();
    assert_eq!(report.from_version, target - 1);
    assert_eq!(report.applied, vec![target]);
}

#[tokio::test]
async fn test_invalid_targets_and_sequences_are_rejected() {
    let db = fresh_db().await;
    let manager = SchemaManager::new(db.clone());
    assert!(matches!(
        manager.ensure_schema(current_version() + 1).await,
        Err(FlagError::Config(_))
    ));
    assert!(matches!(
        manager.ensure_schema(-1).await,
        Err(FlagError::Config(_))
    ));

    let mut gapped = builtin_migrations();
    gapped.remove(0);
    assert!(matches!(
        SchemaManager::with_migrations(db, gapped),
        Err(FlagError::Config(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_initialization_applies_each_step_once() {
    setup_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: sqlite_file_url(&dir, "flags.db"),
        max_connections: 1,
        ..DatabaseConfig::default()
    };

    let mut handles = Vec::new();
    for _ in 0..4 {
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            let db = store::connect(&config).await.unwrap();
            SchemaManager::new(db)
                .ensure_schema(current_version())
                .await
                .unwrap()
        }));
    }

    let mut applied = Vec::new();
    for handle in handles {
        let report = handle.await.unwrap();
        assert_eq!(report.to_version, current_version());
        applied.extend(report.applied);
    }
    applied.sort();
    assert_eq!(applied, (1..=current_version()).collect::<Vec<_>>());
}
