//! Slot scheduling state.

use super::{EventStatus, SlotPhase};
use crate::algorithm::AlgorithmId;
use crate::flow::{DataFlow, DataMask};

/// Scheduling state of the event occupying one slot.
///
/// Pure bookkeeping without I/O: the scheduler task feeds it launches and
/// completions and asks it what to do next.
#[derive(Debug, Clone)]
pub struct SlotRun {
    slot: usize,
    phase: SlotPhase,
    status: EventStatus,
    produced: DataMask,
    completed: DataMask,
    in_flight: DataMask,
    in_flight_count: usize,
    halted: bool,
}

impl SlotRun {
    /// Creates the idle state of a slot, sized for a data flow.
    pub fn new(slot: usize, flow: &DataFlow) -> Self {
        let algorithms = flow.algorithm_count();
        Self {
            slot,
            phase: SlotPhase::Idle,
            status: EventStatus::Success,
            produced: DataMask::with_len(flow.keys().len()),
            completed: DataMask::with_len(algorithms),
            in_flight: DataMask::with_len(algorithms),
            in_flight_count: 0,
            halted: false,
        }
    }

    /// Resets all flags and counters and enters [`SlotPhase::Running`].
    pub fn start(&mut self) {
        self.produced.clear();
        self.completed.clear();
        self.in_flight.clear();
        self.in_flight_count = 0;
        self.halted = false;
        self.status = EventStatus::Success;
        self.phase = SlotPhase::Running;
    }

    /// Returns the slot index.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the current phase.
    #[inline]
    pub fn phase(&self) -> SlotPhase {
        self.phase
    }

    /// Returns the event status so far.
    #[inline]
    pub fn status(&self) -> EventStatus {
        self.status
    }

    /// Keys produced so far.
    pub fn produced(&self) -> &DataMask {
        &self.produced
    }

    /// Algorithms that finished, successfully or not.
    pub fn completed(&self) -> &DataMask {
        &self.completed
    }

    /// Number of algorithms currently executing.
    #[inline]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight_count
    }

    /// Returns `true` once no new algorithm may be launched.
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Algorithms whose inputs are all produced and that neither completed
    /// nor are in flight. Empty unless running.
    pub fn ready_algorithms(&self, flow: &DataFlow) -> Vec<AlgorithmId> {
        if self.phase != SlotPhase::Running || self.halted {
            return Vec::new();
        }
        flow.algorithms()
            .iter()
            .filter(|algorithm| {
                let bit = algorithm.id().index();
                !self.completed.contains(bit)
                    && !self.in_flight.contains(bit)
                    && algorithm.is_ready(&self.produced)
            })
            .map(|algorithm| algorithm.id())
            .collect()
    }

    /// Records that an algorithm was submitted for execution.
    pub fn mark_launched(&mut self, id: AlgorithmId) {
        self.in_flight.insert(id.index());
        self.in_flight_count += 1;
    }

    /// Records a finished algorithm. Outputs count as produced only on success.
    pub fn complete(&mut self, flow: &DataFlow, id: AlgorithmId, success: bool) {
        if !self.in_flight.contains(id.index()) {
            return;
        }
        self.in_flight.remove(id.index());
        self.in_flight_count -= 1;
        self.completed.insert(id.index());

        if success {
            if let Some(algorithm) = flow.algorithm(id) {
                self.produced.union_with(algorithm.output_mask());
            }
        } else {
            self.fail(EventStatus::AlgFail);
        }
    }

    /// Stops launching and marks the event with a non-success status.
    ///
    /// The first non-success status of an event is kept.
    pub fn fail(&mut self, status: EventStatus) {
        if self.status.is_success() {
            self.status = status;
        }
        self.halted = true;
    }

    /// Stops launching because the event was aborted.
    ///
    /// Has no effect unless the slot is running.
    pub fn abort(&mut self) {
        if self.phase == SlotPhase::Running {
            self.fail(EventStatus::Aborted);
        }
    }

    /// Marks the event as stalled.
    pub fn stall(&mut self) {
        self.fail(EventStatus::AlgStall);
    }

    /// Returns `true` if all termination keys are produced and all terminal
    /// algorithms completed.
    pub fn is_satisfied(&self, flow: &DataFlow) -> bool {
        flow.termination().is_subset(&self.produced)
            && flow.terminal_algorithms().is_subset(&self.completed)
    }

    /// Returns `true` if nothing is in flight, nothing is ready and the event
    /// is incomplete.
    pub fn is_stalled(&self, flow: &DataFlow) -> bool {
        self.phase == SlotPhase::Running
            && !self.halted
            && self.in_flight_count == 0
            && !self.is_satisfied(flow)
            && self.ready_algorithms(flow).is_empty()
    }

    /// Applies pending phase transitions and returns the resulting phase.
    pub fn advance(&mut self, flow: &DataFlow) -> SlotPhase {
        if self.phase == SlotPhase::Running && (self.halted || self.is_satisfied(flow)) {
            self.phase = SlotPhase::Draining;
        }
        if self.phase == SlotPhase::Draining && self.in_flight_count == 0 {
            self.phase = SlotPhase::Done;
        }
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{Algorithm, AlgorithmError, AlgorithmSpec};
    use crate::event::EventContext;
    use crate::flow::DependencyResolver;
    use crate::store::EventStore;

    struct Noop;

    impl Algorithm for Noop {
        fn execute(&self, _: &EventContext, _: &EventStore) -> Result<(), AlgorithmError> {
            Ok(())
        }
    }

    fn flow(algorithms: &[(&str, &[&str], &[&str])]) -> DataFlow {
        let specs = algorithms
            .iter()
            .map(|(name, inputs, outputs)| {
                let mut builder = AlgorithmSpec::builder(*name).with_factory(|| Noop);
                for key in *inputs {
                    builder = builder.with_input(*key);
                }
                for key in *outputs {
                    builder = builder.with_output(*key);
                }
                builder.build().unwrap()
            })
            .collect();
        DependencyResolver::new(specs).resolve().unwrap()
    }

    fn abc() -> DataFlow {
        flow(&[("A", &[], &["x"]), ("B", &["x"], &["y"]), ("C", &["x"], &["z"])])
    }

    fn id(flow: &DataFlow, name: &str) -> AlgorithmId {
        flow.find(name).unwrap().id()
    }

    #[test]
    fn test_producer_runs_before_consumers() {
        let flow = abc();
        let mut run = SlotRun::new(0, &flow);
        run.start();

        assert_eq!(run.ready_algorithms(&flow), vec![id(&flow, "A")]);
        run.mark_launched(id(&flow, "A"));
        assert!(run.ready_algorithms(&flow).is_empty());
        assert!(!run.is_stalled(&flow));

        run.complete(&flow, id(&flow, "A"), true);
        assert_eq!(
            run.ready_algorithms(&flow),
            vec![id(&flow, "B"), id(&flow, "C")]
        );
        run.mark_launched(id(&flow, "B"));
        run.mark_launched(id(&flow, "C"));

        run.complete(&flow, id(&flow, "C"), true);
        assert_eq!(run.advance(&flow), SlotPhase::Running);
        run.complete(&flow, id(&flow, "B"), true);
        assert_eq!(run.advance(&flow), SlotPhase::Done);
        assert_eq!(run.status(), EventStatus::Success);
    }

    #[test]
    fn test_failure_drains_in_flight_siblings() {
        let flow = abc();
        let mut run = SlotRun::new(0, &flow);
        run.start();
        run.mark_launched(id(&flow, "A"));
        run.complete(&flow, id(&flow, "A"), true);
        run.mark_launched(id(&flow, "B"));
        run.mark_launched(id(&flow, "C"));

        run.complete(&flow, id(&flow, "B"), false);
        assert_eq!(run.advance(&flow), SlotPhase::Draining);
        assert!(run.ready_algorithms(&flow).is_empty());

        run.complete(&flow, id(&flow, "C"), true);
        assert_eq!(run.advance(&flow), SlotPhase::Done);
        assert_eq!(run.status(), EventStatus::AlgFail);
    }

    #[test]
    fn test_cycle_stalls() {
        let flow = flow(&[("P", &["m"], &["n"]), ("Q", &["n"], &["m"])]);
        let mut run = SlotRun::new(0, &flow);
        run.start();

        assert!(run.is_stalled(&flow));
        run.stall();
        assert_eq!(run.advance(&flow), SlotPhase::Done);
        assert_eq!(run.status(), EventStatus::AlgStall);
    }

    #[test]
    fn test_abort_keeps_first_status() {
        let flow = abc();
        let mut run = SlotRun::new(0, &flow);
        run.abort();
        assert_eq!(run.status(), EventStatus::Success);

        run.start();
        run.mark_launched(id(&flow, "A"));
        run.abort();
        run.complete(&flow, id(&flow, "A"), false);
        assert_eq!(run.advance(&flow), SlotPhase::Done);
        assert_eq!(run.status(), EventStatus::Aborted);
    }

    #[test]
    fn test_start_clears_previous_event() {
        let flow = abc();
        let mut run = SlotRun::new(0, &flow);
        run.start();
        run.mark_launched(id(&flow, "A"));
        run.complete(&flow, id(&flow, "A"), true);
        run.stall();

        run.start();
        assert!(run.produced().none());
        assert!(run.completed().none());
        assert_eq!(run.in_flight_count(), 0);
        assert_eq!(run.status(), EventStatus::Success);
        assert_eq!(run.phase(), SlotPhase::Running);
    }

    #[test]
    fn test_terminal_algorithm_must_complete() {
        let flow = flow(&[("A", &[], &["x"]), ("Sink", &["x"], &[])]);
        let mut run = SlotRun::new(0, &flow);
        run.start();
        run.mark_launched(id(&flow, "A"));
        run.complete(&flow, id(&flow, "A"), true);

        assert!(!run.is_satisfied(&flow));
        assert_eq!(run.advance(&flow), SlotPhase::Running);

        run.mark_launched(id(&flow, "Sink"));
        run.complete(&flow, id(&flow, "Sink"), true);
        assert_eq!(run.advance(&flow), SlotPhase::Done);
    }
}
