//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::client::FlagClient;
use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "oxflag")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Database URL, overrides the configuration file")]
    pub database_url: Option<String>,

    #[arg(long, global = true, help = "Log filter directives, e.g. oxflag=debug")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "migrate", about = "Apply schema migrations")]
    Migrate(MigrateArgs),

    #[command(name = "evaluate", about = "Evaluate flags for a tenant/user")]
    Evaluate(EvaluateArgs),

    #[command(name = "flag", about = "Manage platform flags")]
    Flag(FlagArgs),

    #[command(name = "override", about = "Manage tenant and user overrides")]
    Override(OverrideArgs),
}

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    #[arg(short, long, help = "Target schema version (defaults to latest)")]
    pub target: Option<i64>,
}

#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    #[arg(short, long, help = "Tenant id")]
    pub tenant: Option<String>,

    #[arg(short, long, help = "User id (requires --tenant)", requires = "tenant")]
    pub user: Option<String>,

    #[arg(help = "Flag names; all known flags when omitted")]
    pub names: Vec<String>,

    #[arg(short, long, help = "Output in JSON format")]
    pub json: bool,
}

mod evaluate;
mod flag;
mod migrate;
mod overrides;

pub use flag::{FlagArgs, FlagSubcommand};
pub use overrides::{OverrideArgs, OverrideSubcommand};

impl Cli {
    /// 加载配置文件并应用命令行覆盖项
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        Ok(config)
    }
}

async fn connect(config: &Config) -> Result<FlagClient> {
    FlagClient::connect(config)
        .await
        .context("Failed to initialize flag client")
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing("oxflag", cli.log.as_deref());
    let config = cli.load_config()?;

    match &cli.command {
        Commands::Migrate(args) => migrate::execute(&config, args).await,
        Commands::Evaluate(args) => evaluate::execute(&config, args).await,
        Commands::Flag(args) => flag::execute(&config, args).await,
        Commands::Override(args) => overrides::execute(&config, args).await,
    }
}
