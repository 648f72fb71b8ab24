#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod mock;
mod pipeline;

pub use mock::{
    CountingSelector, Cruncher, CruncherProduct, Execution, ExecutionRecorder, RecordingListener,
    VecSelector,
};
pub use pipeline::{CruncherDefinition, CruncherPipeline, PipelineError};
