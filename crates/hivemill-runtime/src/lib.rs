#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod algorithm;
mod config;
mod error;
pub mod event;
pub mod flow;
pub mod pool;
pub mod scheduler;
pub mod store;
pub mod supervisor;

#[doc(hidden)]
pub mod prelude;

pub use config::{
    EventLoopConfig, EventLoopConfigBuilder, EventLoopConfigBuilderError, SchedulerConfig,
    SchedulerConfigBuilder, SchedulerConfigBuilderError,
};
pub use error::{Error, Result};

/// Tracing target for runtime operations.
pub const TRACING_TARGET: &str = "hivemill_runtime";
