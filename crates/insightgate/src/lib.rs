#![forbid(unsafe_code)]

pub mod analytics;
pub mod audit;
pub mod cli;
pub mod config;
pub mod enforce;
pub mod gateway;
pub mod guard;
pub mod models;
pub mod period;
pub mod sqlite;
pub mod tools;
pub mod utils;

pub use analytics::Analytics;
pub use cli::app::{Cli, Command};
pub use tools::{ToolCall, dispatch, tool_catalog};
