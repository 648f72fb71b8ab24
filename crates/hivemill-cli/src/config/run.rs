//! Pipeline and report configuration.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

/// How the end-of-run report is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// What to run and how to report it.
#[derive(Debug, Clone, Serialize, Deserialize, Args)]
pub struct RunConfig {
    /// Path to the JSON pipeline definition.
    #[arg(long, env = "HIVEMILL_PIPELINE")]
    pub pipeline: PathBuf,

    /// Number of events the counting selector provides.
    #[arg(long, env = "HIVEMILL_EVENTS", default_value_t = 100)]
    pub events: usize,

    /// Report format.
    #[arg(long, env = "HIVEMILL_FORMAT", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Record executions and report per-algorithm peak concurrency.
    #[arg(long, env = "HIVEMILL_RECORD")]
    #[serde(default)]
    pub record: bool,
}
