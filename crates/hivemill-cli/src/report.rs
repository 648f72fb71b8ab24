//! End-of-run report.

use std::fmt::{self, Write};

use hivemill_runtime::supervisor::RunSummary;
use hivemill_test::ExecutionRecorder;
use serde::Serialize;

use crate::config::OutputFormat;

/// Per-algorithm line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmReport {
    pub name: String,
    pub instances: usize,
    pub acquired: u64,
    pub misses: u64,
    /// Recorded executions; `None` unless recording was enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executions: Option<usize>,
    /// Highest number of simultaneous executions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_concurrency: Option<usize>,
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub summary: RunSummary,
    pub algorithms: Vec<AlgorithmReport>,
}

impl Report {
    /// Combines the run summary with recorded executions.
    pub fn new(summary: RunSummary, recorder: Option<&ExecutionRecorder>) -> Self {
        let algorithms = summary
            .pool
            .algorithms
            .iter()
            .map(|stats| AlgorithmReport {
                name: stats.name.clone(),
                instances: stats.instances,
                acquired: stats.acquired,
                misses: stats.misses,
                executions: recorder.map(|recorder| recorder.count(&stats.name)),
                peak_concurrency: recorder.map(|recorder| recorder.peak_concurrency(&stats.name)),
            })
            .collect();

        Self {
            summary,
            algorithms,
        }
    }

    /// Renders the report in the requested format.
    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Text => {
                let mut out = String::new();
                self.write_text(&mut out)?;
                Ok(out)
            }
        }
    }

    fn write_text(&self, out: &mut String) -> fmt::Result {
        let summary = &self.summary;
        writeln!(out, "events processed: {}", summary.processed)?;
        writeln!(out, "  succeeded: {}", summary.succeeded)?;
        writeln!(out, "  failed:    {}", summary.failed)?;
        writeln!(out, "  stalled:   {}", summary.stalled)?;
        writeln!(out, "  aborted:   {}", summary.aborted)?;
        writeln!(out, "  other:     {}", summary.other)?;
        writeln!(out, "stop reason: {}", summary.stop_reason)?;
        writeln!(out, "elapsed: {:.3}s", summary.elapsed.as_secs_f64())?;
        writeln!(out)?;

        writeln!(
            out,
            "{:<24} {:>9} {:>9} {:>9} {:>10} {:>6}",
            "algorithm", "instances", "acquired", "misses", "executions", "peak"
        )?;
        for algorithm in &self.algorithms {
            writeln!(
                out,
                "{:<24} {:>9} {:>9} {:>9} {:>10} {:>6}",
                algorithm.name,
                algorithm.instances,
                algorithm.acquired,
                algorithm.misses,
                optional(algorithm.executions),
                optional(algorithm.peak_concurrency),
            )?;
        }
        Ok(())
    }
}

fn optional(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_owned(), |value| value.to_string())
}
