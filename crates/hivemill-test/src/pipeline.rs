//! JSON cruncher pipelines.
//!
//! ```json
//! {
//!   "algorithms": [
//!     { "name": "Loader", "outputs": ["raw"], "runtime_ms": 2 },
//!     { "name": "Tracks", "inputs": ["raw"], "outputs": ["tracks"],
//!       "concurrency": { "kind": "clonable", "cardinality": 4 }, "runtime_ms": 10 }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hivemill_runtime::algorithm::{AlgorithmSpec, AlgorithmSpecBuilderError, Concurrency};
use serde::{Deserialize, Serialize};

use crate::{Cruncher, ExecutionRecorder};

/// Errors raised while loading a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline file could not be read.
    #[error("failed to read pipeline: {0}")]
    Io(#[from] std::io::Error),

    /// The pipeline is not valid JSON.
    #[error("failed to parse pipeline: {0}")]
    Json(#[from] serde_json::Error),

    /// An algorithm definition is invalid.
    #[error("invalid algorithm '{name}': {source}")]
    Algorithm {
        /// Name of the algorithm.
        name: String,
        /// Builder error.
        #[source]
        source: AlgorithmSpecBuilderError,
    },
}

/// One cruncher in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CruncherDefinition {
    /// Algorithm name.
    pub name: String,
    /// Data objects read.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Data objects written.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Instance sharing policy.
    #[serde(default)]
    pub concurrency: Concurrency,
    /// Exclusive resources.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Runtime of every execution in milliseconds.
    #[serde(default)]
    pub runtime_ms: u64,
    /// Fail every n-th event.
    #[serde(default)]
    pub fail_every: Option<u64>,
}

impl CruncherDefinition {
    /// Builds the cruncher described by this definition.
    pub fn cruncher(&self) -> Cruncher {
        let cruncher = Cruncher::new(self.name.clone())
            .with_inputs(self.inputs.iter().map(String::as_str))
            .with_outputs(self.outputs.iter().map(String::as_str))
            .with_runtime(Duration::from_millis(self.runtime_ms));
        match self.fail_every {
            Some(period) => cruncher.with_fail_every(period),
            None => cruncher,
        }
    }
}

/// A list of crunchers forming a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CruncherPipeline {
    /// Crunchers in declaration order.
    pub algorithms: Vec<CruncherDefinition>,
}

impl CruncherPipeline {
    /// Parses a pipeline from JSON.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a pipeline from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Builds the algorithm registrations, optionally recording executions.
    pub fn into_specs(
        self,
        recorder: Option<Arc<ExecutionRecorder>>,
    ) -> Result<Vec<AlgorithmSpec>, PipelineError> {
        self.algorithms
            .into_iter()
            .map(|definition| {
                let mut cruncher = definition.cruncher();
                if let Some(recorder) = &recorder {
                    cruncher = cruncher.with_recorder(Arc::clone(recorder));
                }
                cruncher
                    .spec_with_resources(definition.concurrency, definition.resources.iter().cloned())
                    .map_err(|source| PipelineError::Algorithm {
                        name: definition.name.clone(),
                        source,
                    })
            })
            .collect()
    }
}
