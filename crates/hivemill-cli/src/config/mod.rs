//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── scheduler: SchedulerConfig    # Slots, worker threads, in-flight cap, resolution
//! ├── event_loop: EventLoopConfig   # Max events, failure threshold
//! └── run: RunConfig                # Pipeline file, event count, report format
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.

mod run;

use std::process;

use anyhow::Context;
use clap::Parser;
use hivemill_runtime::{EventLoopConfig, SchedulerConfig};
pub use run::{OutputFormat, RunConfig};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "hivemill")]
#[command(about = "Runs algorithm pipelines through the hivemill event scheduler")]
#[command(version)]
pub struct Cli {
    /// Slot scheduler configuration.
    #[clap(flatten)]
    pub scheduler: SchedulerConfig,

    /// Event loop configuration.
    #[clap(flatten)]
    pub event_loop: EventLoopConfig,

    /// Pipeline and report configuration.
    #[clap(flatten)]
    pub run: RunConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.scheduler
            .validate()
            .context("invalid scheduler configuration")?;
        if self.event_loop.max_failed_events == Some(0) {
            anyhow::bail!("invalid event loop configuration: max-failed-events must be at least 1");
        }
        Ok(())
    }

    /// Logs build information and configuration.
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            event_slots = self.scheduler.event_slots,
            worker_threads = self.scheduler.worker_threads,
            max_algorithms_in_flight = self.scheduler.max_algorithms_in_flight,
            reject_cycles = self.scheduler.reject_cycles,
            data_loader = ?self.scheduler.data_loader,
            required_outputs = ?self.scheduler.required_outputs,
            "Scheduler configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            max_events = ?self.event_loop.max_events,
            max_failed_events = ?self.event_loop.max_failed_events,
            pipeline = %self.run.pipeline.display(),
            events = self.run.events,
            "Run configuration"
        );
    }

    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
