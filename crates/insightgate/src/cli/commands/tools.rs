use anyhow::{Context, Result};
use clap::Args;

use crate::tools::{TOOLS, tool_catalog};

#[derive(Debug, Clone, Args)]
pub struct ToolsArgs {
    /// Print only tool names, one per line.
    #[arg(long)]
    pub names_only: bool,
}

pub fn run(args: &ToolsArgs) -> Result<()> {
    if args.names_only {
        for tool in TOOLS {
            println!("{}", tool.name);
        }
        return Ok(());
    }

    let rendered =
        serde_json::to_string_pretty(&tool_catalog()).context("failed to render tool catalog")?;
    println!("{rendered}");
    Ok(())
}
