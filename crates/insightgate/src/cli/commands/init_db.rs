use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use super::RuntimeSettings;
use crate::sqlite::{
    CommitRecord, PullRequestRecord, SQLITE_SCHEMA_VERSION, ensure_analytics_schema,
    insert_commits, insert_pull_requests, open_sqlite_connection,
};

#[derive(Debug, Clone, Args)]
pub struct InitDbArgs {
    /// JSON file with `commits` and `pull_requests` arrays to load.
    #[arg(long, value_name = "PATH")]
    pub seed: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedData {
    #[serde(default)]
    pub commits: Vec<CommitRecord>,
    #[serde(default)]
    pub pull_requests: Vec<PullRequestRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InitDbSummary {
    pub database: String,
    pub schema_version: &'static str,
    pub commits_loaded: usize,
    pub pull_requests_loaded: usize,
}

pub fn run(args: &InitDbArgs, settings: &RuntimeSettings) -> Result<()> {
    let summary = initialize(&settings.paths.database_path, args.seed.as_deref())?;
    let rendered =
        serde_json::to_string_pretty(&summary).context("failed to render init-db summary")?;
    println!("{rendered}");
    Ok(())
}

pub fn initialize(database_path: &Path, seed: Option<&Path>) -> Result<InitDbSummary> {
    let seed = match seed {
        Some(path) => load_seed(path)?,
        None => SeedData::default(),
    };

    let mut connection = open_sqlite_connection(database_path)?;
    ensure_analytics_schema(&connection)?;
    let commits_loaded = insert_commits(&mut connection, &seed.commits)?;
    let pull_requests_loaded = insert_pull_requests(&mut connection, &seed.pull_requests)?;

    tracing::info!(
        database = %database_path.display(),
        commits_loaded,
        pull_requests_loaded,
        "analytics database initialized"
    );

    Ok(InitDbSummary {
        database: database_path.display().to_string(),
        schema_version: SQLITE_SCHEMA_VERSION,
        commits_loaded,
        pull_requests_loaded,
    })
}

fn load_seed(path: &Path) -> Result<SeedData> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse seed file: {}", path.display()))
}
