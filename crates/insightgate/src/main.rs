#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use clap::error::ErrorKind;
use insightgate::cli::app::{Cli, Command, RuntimeArgs};
use insightgate::cli::commands::{self, RuntimeSettings};
use insightgate::models::ToolResultFailure;
use tracing_subscriber::{EnvFilter, fmt};

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_TOOL_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

const LOG_FILTER_ENV: &str = "INSIGHTGATE_LOG";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing();

    let command_name = command_name(&cli.command);
    tracing::debug!(command = command_name, "starting");

    match execute(cli) {
        Ok(()) => EXIT_SUCCESS,
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            if exit_code == EXIT_TOOL_FAILURE {
                eprintln!("insightgate: `{command_name}` returned success=false (exit_code={exit_code})");
            } else {
                eprintln!("insightgate: failed `{command_name}` (exit_code={exit_code})");
                eprintln!("{error:#}");
            }
            exit_code
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Tools(args) => commands::tools::run(&args),
        Command::Call(args) => {
            let settings = resolve_settings(&cli.runtime)?;
            commands::call::run(&args, &settings)
        }
        Command::Serve(args) => {
            let settings = resolve_settings(&cli.runtime)?;
            commands::serve::run(&args, &settings)
        }
        Command::InitDb(args) => {
            let settings = resolve_settings(&cli.runtime)?;
            commands::init_db::run(&args, &settings)
        }
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ToolResultFailure>().is_some() {
        EXIT_TOOL_FAILURE
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Tools(_) => "tools",
        Command::Call(_) => "call",
        Command::Serve(_) => "serve",
        Command::InitDb(_) => "init-db",
    }
}

fn resolve_settings(args: &RuntimeArgs) -> Result<RuntimeSettings> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    let paths = insightgate::config::resolve_runtime_paths(
        &home_dir,
        &cwd,
        args.database.as_deref(),
        args.audit_log.as_deref(),
    )?;

    Ok(RuntimeSettings {
        paths,
        tenant_id: args.tenant_id,
        audit_enabled: !args.no_audit,
    })
}
