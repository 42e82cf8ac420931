//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了迁移命令的实现。

use crate::cli::MigrateArgs;
use crate::config::Config;
use crate::schema::{current_version, SchemaManager};
use crate::store;
use anyhow::{Context, Result};

pub async fn execute(config: &Config, args: &MigrateArgs) -> Result<()> {
    config.validate().map_err(anyhow::Error::msg)?;

    let db = store::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let target = args
        .target
        .or(config.schema.target_version)
        .unwrap_or_else(current_version);

    let report = SchemaManager::new(db).ensure_schema(target).await?;

    if report.applied.is_empty() {
        println!("Schema already at version {}", report.to_version);
    } else {
        for version in &report.applied {
            println!("  - applied migration {}", version);
        }
        println!(
            "\n✅ Schema migrated from version {} to {}",
            report.from_version, report.to_version
        );
    }
    Ok(())
}
