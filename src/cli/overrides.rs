//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了租户/用户覆盖管理命令的实现。

use crate::config::Config;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
pub struct OverrideArgs {
    #[command(subcommand)]
    pub command: OverrideSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum OverrideSubcommand {
    #[command(name = "set", about = "Set a tenant or user override")]
    Set(SetArgs),

    #[command(name = "clear", about = "Remove a tenant or user override")]
    Clear(ClearArgs),

    #[command(name = "list", about = "List tenant and user overrides")]
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ScopeArgs {
    #[arg(short, long, help = "Tenant id")]
    pub tenant: String,

    #[arg(short, long, help = "User id; sets a user override instead of a tenant override")]
    pub user: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    pub name: String,

    #[arg(short, long, action = clap::ArgAction::Set, help = "Override value (true/false)")]
    pub enabled: bool,
}

#[derive(Parser, Debug)]
pub struct ClearArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    pub name: String,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    #[arg(help = "Only list overrides of this flag")]
    pub name: Option<String>,
}

pub async fn execute(config: &Config, args: &OverrideArgs) -> Result<()> {
    let client = super::connect(config).await?;
    let admin = client.admin();

    match &args.command {
        OverrideSubcommand::Set(set) => {
            let tenant = &set.scope.tenant;
            match &set.scope.user {
                Some(user) => {
                    admin
                        .set_user_override(&set.name, tenant, user, set.enabled)
                        .await?;
                    println!(
                        "✅ '{}' = {} for user {} in tenant {}",
                        set.name, set.enabled, user, tenant
                    );
                }
                None => {
                    admin
                        .set_tenant_override(&set.name, tenant, set.enabled)
                        .await?;
                    println!("✅ '{}' = {} for tenant {}", set.name, set.enabled, tenant);
                }
            }
        }
        OverrideSubcommand::Clear(clear) => {
            let tenant = &clear.scope.tenant;
            let existed = match &clear.scope.user {
                Some(user) => admin.clear_user_override(&clear.name, tenant, user).await?,
                None => admin.clear_tenant_override(&clear.name, tenant).await?,
            };
            if existed {
                println!("✅ Override for '{}' removed", clear.name);
            } else {
                println!("No override for '{}' in this scope", clear.name);
            }
        }
        OverrideSubcommand::List(list) => {
            let entries = client.store().list_overrides(list.name.as_deref()).await?;
            if entries.is_empty() {
                println!("No overrides defined.");
            }
            for entry in entries {
                println!(
                    "{:<32} {:<24} {:<24} {}",
                    entry.flag,
                    entry.tenant_id,
                    entry.user_id.as_deref().unwrap_or("-"),
                    entry.enabled
                );
            }
        }
    }

    client.close().await?;
    Ok(())
}
