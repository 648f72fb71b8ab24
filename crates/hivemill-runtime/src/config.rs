//! Scheduler and event loop configuration.

use std::num::NonZeroUsize;

#[cfg(feature = "config")]
use clap::Args;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of event slots.
const DEFAULT_EVENT_SLOTS: usize = 4;

fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map_or(4, NonZeroUsize::get)
}

/// Configuration of the slot scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[cfg_attr(feature = "config", derive(Args))]
#[builder(
    pattern = "owned",
    setter(into, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of events processed in parallel.
    #[cfg_attr(
        feature = "config",
        arg(long = "event-slots", env = "HIVEMILL_EVENT_SLOTS", default_value_t = DEFAULT_EVENT_SLOTS)
    )]
    #[builder(default = "DEFAULT_EVENT_SLOTS")]
    pub event_slots: usize,

    /// Number of algorithms executing at once on worker threads.
    #[cfg_attr(
        feature = "config",
        arg(long = "worker-threads", env = "HIVEMILL_WORKER_THREADS", default_value_t = default_worker_threads())
    )]
    #[builder(default = "default_worker_threads()")]
    pub worker_threads: usize,

    /// Cap on algorithms in flight across all slots (0 = unbounded).
    #[cfg_attr(
        feature = "config",
        arg(long = "max-algorithms-in-flight", env = "HIVEMILL_MAX_ALGORITHMS_IN_FLIGHT", default_value_t = 0)
    )]
    #[builder(default)]
    pub max_algorithms_in_flight: usize,

    /// Treat dependency cycles as a configuration error.
    #[cfg_attr(
        feature = "config",
        arg(long = "reject-cycles", env = "HIVEMILL_REJECT_CYCLES")
    )]
    #[builder(default)]
    pub reject_cycles: bool,

    /// Algorithm that provides every input nothing else produces.
    #[cfg_attr(
        feature = "config",
        arg(long = "data-loader", env = "HIVEMILL_DATA_LOADER")
    )]
    #[builder(default, setter(strip_option))]
    pub data_loader: Option<String>,

    /// Outputs that must exist before an event is complete, in addition to
    /// the outputs no algorithm consumes.
    #[cfg_attr(
        feature = "config",
        arg(long = "required-output", env = "HIVEMILL_REQUIRED_OUTPUTS", value_delimiter = ',')
    )]
    #[builder(default)]
    pub required_outputs: Vec<String>,
}

impl SchedulerConfig {
    /// Returns a builder with default values.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Checks values that may bypass the builder (CLI, deserialization).
    pub fn validate(&self) -> Result<()> {
        if self.event_slots == 0 {
            return Err(Error::InvalidConfig("event_slots must be at least 1".into()));
        }
        if self.worker_threads == 0 {
            return Err(Error::InvalidConfig("worker_threads must be at least 1".into()));
        }
        Ok(())
    }
}

impl SchedulerConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.event_slots == Some(0) {
            return Err("event_slots must be at least 1".into());
        }
        if self.worker_threads == Some(0) {
            return Err("worker_threads must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            event_slots: DEFAULT_EVENT_SLOTS,
            worker_threads: default_worker_threads(),
            max_algorithms_in_flight: 0,
            reject_cycles: false,
            data_loader: None,
            required_outputs: Vec::new(),
        }
    }
}

/// Configuration of the event loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[cfg_attr(feature = "config", derive(Args))]
#[builder(
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
#[serde(default)]
pub struct EventLoopConfig {
    /// Number of events to process; unbounded if unset.
    #[cfg_attr(
        feature = "config",
        arg(long = "max-events", env = "HIVEMILL_MAX_EVENTS")
    )]
    #[builder(default)]
    pub max_events: Option<u64>,

    /// Stop pulling new events once this many events ended with `AlgFail`
    /// or `AlgStall`; never stops if unset.
    #[cfg_attr(
        feature = "config",
        arg(long = "max-failed-events", env = "HIVEMILL_MAX_FAILED_EVENTS")
    )]
    #[builder(default)]
    pub max_failed_events: Option<u64>,
}

impl EventLoopConfig {
    /// Returns a builder with default values.
    pub fn builder() -> EventLoopConfigBuilder {
        EventLoopConfigBuilder::default()
    }

    /// Returns `true` once `failed` events reach the failure threshold.
    pub fn failure_threshold_reached(&self, failed: u64) -> bool {
        self.max_failed_events.is_some_and(|max| failed >= max)
    }
}

impl EventLoopConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(Some(0)) = self.max_failed_events {
            return Err("max_failed_events must be at least 1".into());
        }
        Ok(())
    }
}
