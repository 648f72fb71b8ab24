//! Configurable CPU-cruncher algorithm.

use std::sync::Arc;
use std::time::Duration;

use hivemill_runtime::algorithm::{
    Algorithm, AlgorithmError, AlgorithmSpec, AlgorithmSpecBuilderError, Concurrency,
};
use hivemill_runtime::event::EventContext;
use hivemill_runtime::flow::DataKey;
use hivemill_runtime::store::EventStore;

use super::ExecutionRecorder;

/// Tracing target for cruncher executions.
const TRACING_TARGET: &str = "hivemill_test::cruncher";

/// Data object registered by a [`Cruncher`] for each output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CruncherProduct {
    /// Name of the producing algorithm.
    pub producer: String,
    /// Event the object belongs to.
    pub event: u64,
}

/// Algorithm that simulates work.
///
/// On every event it checks that each input exists and belongs to the same
/// event, sleeps for its runtime, and registers a [`CruncherProduct`] per
/// output. It can be told to fail periodically or to abort chosen events.
#[derive(Debug, Clone)]
pub struct Cruncher {
    name: String,
    inputs: Vec<DataKey>,
    outputs: Vec<DataKey>,
    runtime: Duration,
    fail_every: Option<u64>,
    abort_on: Vec<u64>,
    recorder: Option<Arc<ExecutionRecorder>>,
}

impl Cruncher {
    /// Creates a cruncher without inputs, outputs or runtime.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            runtime: Duration::ZERO,
            fail_every: None,
            abort_on: Vec::new(),
            recorder: None,
        }
    }

    /// Adds inputs.
    pub fn with_inputs<K: Into<DataKey>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.inputs.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Adds outputs.
    pub fn with_outputs<K: Into<DataKey>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.outputs.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Sets how long every execution takes.
    pub fn with_runtime(mut self, runtime: Duration) -> Self {
        self.runtime = runtime;
        self
    }

    /// Fails events whose number plus one is a multiple of `period`.
    pub fn with_fail_every(mut self, period: u64) -> Self {
        self.fail_every = (period > 0).then_some(period);
        self
    }

    /// Fires an abort for the given events instead of producing outputs.
    pub fn with_abort_on(mut self, events: impl IntoIterator<Item = u64>) -> Self {
        self.abort_on.extend(events);
        self
    }

    /// Records executions.
    pub fn with_recorder(mut self, recorder: Arc<ExecutionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Returns the algorithm name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the registration of this cruncher.
    pub fn spec(&self, concurrency: Concurrency) -> Result<AlgorithmSpec, AlgorithmSpecBuilderError> {
        self.spec_with_resources(concurrency, std::iter::empty::<String>())
    }

    /// Builds the registration of this cruncher with exclusive resources.
    pub fn spec_with_resources<R: Into<String>>(
        &self,
        concurrency: Concurrency,
        resources: impl IntoIterator<Item = R>,
    ) -> Result<AlgorithmSpec, AlgorithmSpecBuilderError> {
        let template = self.clone();
        AlgorithmSpec::builder(self.name.clone())
            .with_inputs(self.inputs.clone())
            .with_outputs(self.outputs.clone())
            .with_resources(resources.into_iter().map(Into::into).collect::<Vec<String>>())
            .with_concurrency(concurrency)
            .with_factory(move || template.clone())
            .build()
    }

    fn check_inputs(&self, ctx: &EventContext, store: &EventStore) -> Result<(), AlgorithmError> {
        for key in &self.inputs {
            let Some(object) = store.retrieve_object(key.as_str()) else {
                return Err(AlgorithmError::new(format!(
                    "{}: input '{key}' is missing",
                    self.name
                )));
            };
            if let Ok(product) = object.downcast::<CruncherProduct>()
                && product.event != ctx.event_number()
            {
                return Err(AlgorithmError::new(format!(
                    "{}: input '{key}' belongs to event {}, not {}",
                    self.name,
                    product.event,
                    ctx.event_number()
                )));
            }
        }
        Ok(())
    }

    fn crunch(&self, ctx: &EventContext, store: &EventStore) -> Result<(), AlgorithmError> {
        self.check_inputs(ctx, store)?;

        if !self.runtime.is_zero() {
            std::thread::sleep(self.runtime);
        }

        if self.abort_on.contains(&ctx.event_number()) {
            ctx.abort_event(self.name.clone());
            return Ok(());
        }

        if let Some(period) = self.fail_every
            && (ctx.event_number() + 1) % period == 0
        {
            return Err(AlgorithmError::new(format!(
                "{}: scheduled failure on event {}",
                self.name,
                ctx.event_number()
            )));
        }

        for key in &self.outputs {
            store.register(
                key.clone(),
                CruncherProduct {
                    producer: self.name.clone(),
                    event: ctx.event_number(),
                },
            )?;
        }
        Ok(())
    }
}

impl Algorithm for Cruncher {
    fn execute(&self, ctx: &EventContext, store: &EventStore) -> Result<(), AlgorithmError> {
        tracing::trace!(
            target: TRACING_TARGET,
            algorithm = %self.name,
            event = ctx.event_number(),
            slot = ctx.slot(),
            "Crunching"
        );

        let token = self
            .recorder
            .as_ref()
            .map(|recorder| recorder.start(&self.name, ctx.event_number(), ctx.slot()));
        let result = self.crunch(ctx, store);
        if let (Some(recorder), Some(token)) = (&self.recorder, token) {
            recorder.finish(token);
        }
        result
    }
}
