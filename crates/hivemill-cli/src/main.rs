#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod report;

use std::process;
use std::sync::Arc;

use anyhow::Context;
use hivemill_runtime::supervisor::{EventLoop, StopHandle};
use hivemill_test::{CountingSelector, CruncherPipeline, ExecutionRecorder};

use crate::config::Cli;
use crate::report::Report;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "hivemill_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "hivemill_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "hivemill_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();
    cli.validate()?;

    let pipeline = CruncherPipeline::from_path(&cli.run.pipeline)
        .with_context(|| format!("failed to load pipeline {}", cli.run.pipeline.display()))?;
    let recorder = cli.run.record.then(|| Arc::new(ExecutionRecorder::new()));
    let specs = pipeline
        .into_specs(recorder.clone())
        .context("invalid pipeline definition")?;

    let mut event_loop = EventLoop::new(cli.scheduler.clone(), cli.event_loop.clone(), specs)
        .context("failed to configure event loop")?
        .with_selector(CountingSelector::new(cli.run.events));

    tokio::spawn(stop_on_signal(event_loop.stop_handle()));

    let summary = event_loop
        .execute_run(cli.event_loop.max_events)
        .await
        .context("event loop failed")?;

    let report = Report::new(summary, recorder.as_deref());
    println!("{}", report.render(cli.run.format)?);
    Ok(())
}

/// Stops pulling new events on Ctrl+C; in-flight events still finish.
async fn stop_on_signal(stop: StopHandle) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!(
                target: TRACING_TARGET_SHUTDOWN,
                "Received Ctrl+C signal, draining in-flight events"
            );
            stop.stop_run();
        }
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET_SHUTDOWN,
                error = %err,
                "Failed to install Ctrl+C handler"
            );
        }
    }
}
