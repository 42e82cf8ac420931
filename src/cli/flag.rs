//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了平台开关管理命令的实现。

use crate::config::Config;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
pub struct FlagArgs {
    #[command(subcommand)]
    pub command: FlagSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum FlagSubcommand {
    #[command(name = "create", about = "Create a platform flag")]
    Create(CreateArgs),

    #[command(name = "enable", about = "Enable a platform flag")]
    Enable(NameArgs),

    #[command(name = "disable", about = "Disable a platform flag")]
    Disable(NameArgs),

    #[command(name = "delete", about = "Delete a flag and all of its overrides")]
    Delete(NameArgs),

    #[command(name = "list", about = "List platform flags")]
    List,
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    pub name: String,

    #[arg(short, long, help = "Enable the flag by default")]
    pub enabled: bool,

    #[arg(short, long, help = "Flag description")]
    pub description: Option<String>,
}

#[derive(Parser, Debug)]
pub struct NameArgs {
    pub name: String,
}

pub async fn execute(config: &Config, args: &FlagArgs) -> Result<()> {
    let client = super::connect(config).await?;
    let admin = client.admin();

    match &args.command {
        FlagSubcommand::Create(create) => {
            let flag = admin
                .create_flag(&create.name, create.enabled, create.description.clone())
                .await?;
            println!("✅ Created flag '{}' (enabled={})", flag.name, flag.enabled);
        }
        FlagSubcommand::Enable(target) => {
            admin.set_flag_enabled(&target.name, true).await?;
            println!("✅ Enabled flag '{}'", target.name);
        }
        FlagSubcommand::Disable(target) => {
            admin.set_flag_enabled(&target.name, false).await?;
            println!("✅ Disabled flag '{}'", target.name);
        }
        FlagSubcommand::Delete(target) => {
            admin.delete_flag(&target.name).await?;
            println!("✅ Deleted flag '{}'", target.name);
        }
        FlagSubcommand::List => {
            let flags = client.store().list_flags().await?;
            if flags.is_empty() {
                println!("No flags defined.");
            }
            for flag in flags {
                println!(
                    "{:<32} {:<5} {}",
                    flag.name,
                    flag.enabled,
                    flag.description.unwrap_or_default()
                );
            }
        }
    }

    client.close().await?;
    Ok(())
}
