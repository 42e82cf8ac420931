//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了求值命令的实现。

use crate::cli::EvaluateArgs;
use crate::config::Config;
use anyhow::Result;

pub async fn execute(config: &Config, args: &EvaluateArgs) -> Result<()> {
    let client = super::connect(config).await?;

    let names = (!args.names.is_empty()).then_some(args.names.as_slice());
    let flags = client
        .evaluate(names, args.tenant.as_deref(), args.user.as_deref())
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&flags)?);
    } else if flags.is_empty() {
        println!("No flags defined.");
    } else {
        for (name, enabled) in &flags {
            let mark = if *enabled { "✅" } else { "❌" };
            println!("{} {}", mark, name);
        }
    }

    client.close().await?;
    Ok(())
}
