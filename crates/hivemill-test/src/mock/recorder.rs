//! Execution recorder.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// One recorded algorithm execution.
#[derive(Debug, Clone)]
pub struct Execution {
    /// Algorithm name.
    pub algorithm: String,
    /// Event number.
    pub event: u64,
    /// Slot index.
    pub slot: usize,
    /// When execution started.
    pub started: Instant,
    /// When execution finished; `None` while running.
    pub finished: Option<Instant>,
}

#[derive(Debug, Default)]
struct RecorderState {
    executions: Vec<Execution>,
    running: HashMap<String, usize>,
    peak: HashMap<String, usize>,
}

/// Records algorithm executions across all slots.
#[derive(Debug, Default)]
pub struct ExecutionRecorder {
    state: Mutex<RecorderState>,
}

impl ExecutionRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the start of an execution and returns its token.
    pub fn start(&self, algorithm: &str, event: u64, slot: usize) -> usize {
        let mut state = self.lock();
        let running = state.running.entry(algorithm.to_owned()).or_default();
        *running += 1;
        let running = *running;
        let peak = state.peak.entry(algorithm.to_owned()).or_default();
        *peak = (*peak).max(running);

        state.executions.push(Execution {
            algorithm: algorithm.to_owned(),
            event,
            slot,
            started: Instant::now(),
            finished: None,
        });
        state.executions.len() - 1
    }

    /// Records the end of an execution.
    pub fn finish(&self, token: usize) {
        let mut state = self.lock();
        let Some(execution) = state.executions.get_mut(token) else {
            return;
        };
        execution.finished = Some(Instant::now());
        let algorithm = execution.algorithm.clone();
        if let Some(running) = state.running.get_mut(&algorithm) {
            *running = running.saturating_sub(1);
        }
    }

    /// Returns every recorded execution in start order.
    pub fn executions(&self) -> Vec<Execution> {
        self.lock().executions.clone()
    }

    /// Returns the executions of one algorithm.
    pub fn executions_of(&self, algorithm: &str) -> Vec<Execution> {
        self.lock()
            .executions
            .iter()
            .filter(|execution| execution.algorithm == algorithm)
            .cloned()
            .collect()
    }

    /// Returns the execution of an algorithm for an event.
    pub fn execution(&self, algorithm: &str, event: u64) -> Option<Execution> {
        self.lock()
            .executions
            .iter()
            .find(|execution| execution.algorithm == algorithm && execution.event == event)
            .cloned()
    }

    /// Number of executions of an algorithm.
    pub fn count(&self, algorithm: &str) -> usize {
        self.lock()
            .executions
            .iter()
            .filter(|execution| execution.algorithm == algorithm)
            .count()
    }

    /// Largest number of simultaneous executions of an algorithm.
    pub fn peak_concurrency(&self, algorithm: &str) -> usize {
        self.lock().peak.get(algorithm).copied().unwrap_or(0)
    }

    /// Largest number of simultaneous executions across all algorithms.
    pub fn peak_total_concurrency(&self) -> usize {
        let state = self.lock();
        let mut points: Vec<(Instant, i32)> = Vec::with_capacity(state.executions.len() * 2);
        for execution in &state.executions {
            points.push((execution.started, 1));
            if let Some(finished) = execution.finished {
                points.push((finished, -1));
            }
        }
        points.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut running = 0i32;
        let mut peak = 0i32;
        for (_, delta) in points {
            running += delta;
            peak = peak.max(running);
        }
        peak as usize
    }

    /// Returns `true` if `producer` finished before `consumer` started for
    /// the given event.
    pub fn ran_before(&self, producer: &str, consumer: &str, event: u64) -> bool {
        match (self.execution(producer, event), self.execution(consumer, event)) {
            (Some(producer), Some(consumer)) => {
                producer.finished.is_some_and(|finished| finished <= consumer.started)
            }
            _ => false,
        }
    }
}
