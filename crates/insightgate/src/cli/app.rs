use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    call::CallArgs, init_db::InitDbArgs, serve::ServeArgs, tools::ToolsArgs,
};

#[derive(Debug, Parser)]
#[command(
    name = "insightgate",
    version,
    about = "Tenant-scoped, read-only analytics gateway for commit and pull request data"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// Tenant every statement is scoped to.
    #[arg(long, global = true, value_name = "ID", env = "INSIGHTGATE_TENANT_ID")]
    pub tenant_id: Option<i64>,

    #[arg(long, global = true, value_name = "PATH", env = "INSIGHTGATE_DATABASE")]
    pub database: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH", env = "INSIGHTGATE_AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,

    /// Skip the activity log entirely.
    #[arg(long, global = true)]
    pub no_audit: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the tool catalog with input schemas.
    Tools(ToolsArgs),
    /// Run one tool call and print its result.
    Call(CallArgs),
    /// Answer one JSON tool call per stdin line.
    Serve(ServeArgs),
    /// Create the analytics schema, optionally loading seed rows.
    InitDb(InitDbArgs),
}
