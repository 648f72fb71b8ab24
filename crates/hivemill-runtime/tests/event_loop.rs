//! End-to-end runs of the event loop with mock algorithms.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hivemill_runtime::algorithm::{Algorithm, AlgorithmError, AlgorithmSpec, Concurrency};
use hivemill_runtime::event::{
    EventContext, EventSelector, Incident, IncidentBus, IncidentListener, Selection,
    SelectorContext, SelectorError,
};
use hivemill_runtime::scheduler::EventStatus;
use hivemill_runtime::store::{EventAddress, EventStore, ROOT_KEY};
use hivemill_runtime::supervisor::{EventLoop, LoopState, SlotState, StopHandle, StopReason};
use hivemill_runtime::{Error, EventLoopConfig, SchedulerConfig};
use hivemill_test::{CountingSelector, Cruncher, ExecutionRecorder, RecordingListener, VecSelector};

fn scheduler_config(slots: usize, workers: usize) -> SchedulerConfig {
    SchedulerConfig::builder()
        .with_event_slots(slots)
        .with_worker_threads(workers)
        .build()
        .expect("Valid config")
}

fn abc(recorder: &Arc<ExecutionRecorder>) -> Vec<AlgorithmSpec> {
    let ms = Duration::from_millis;
    vec![
        Cruncher::new("A")
            .with_outputs(["x"])
            .with_runtime(ms(2))
            .with_recorder(recorder.clone())
            .spec(Concurrency::Clonable { cardinality: 4 })
            .unwrap(),
        Cruncher::new("B")
            .with_inputs(["x"])
            .with_outputs(["y"])
            .with_runtime(ms(3))
            .with_recorder(recorder.clone())
            .spec(Concurrency::Clonable { cardinality: 4 })
            .unwrap(),
        Cruncher::new("C")
            .with_inputs(["x"])
            .with_outputs(["z"])
            .with_runtime(ms(1))
            .with_recorder(recorder.clone())
            .spec(Concurrency::Clonable { cardinality: 4 })
            .unwrap(),
    ]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn producers_finish_before_consumers_start() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let mut event_loop = EventLoop::new(
        scheduler_config(3, 4),
        EventLoopConfig::default(),
        abc(&recorder),
    )
    .unwrap()
    .with_selector(CountingSelector::new(8));

    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 8);
    assert_eq!(summary.succeeded, 8);
    assert_eq!(summary.stop_reason, StopReason::SelectorExhausted);
    for event in 0..8 {
        assert!(recorder.ran_before("A", "B", event), "event {event}");
        assert!(recorder.ran_before("A", "C", event), "event {event}");
    }
    assert_eq!(event_loop.state(), LoopState::Finalized);
}

#[tokio::test]
async fn dangling_input_fails_before_any_event() {
    let spec = Cruncher::new("X")
        .with_inputs(["w"])
        .spec(Concurrency::Singleton)
        .unwrap();

    let err = EventLoop::new(SchedulerConfig::default(), EventLoopConfig::default(), vec![spec])
        .unwrap_err();

    match err {
        Error::DanglingDependency { key, algorithm } => {
            assert_eq!(key.as_str(), "w");
            assert_eq!(algorithm, "X");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cyclic_dependency_stalls_every_event() {
    let specs = vec![
        Cruncher::new("P")
            .with_inputs(["m"])
            .with_outputs(["n"])
            .spec(Concurrency::Singleton)
            .unwrap(),
        Cruncher::new("Q")
            .with_inputs(["n"])
            .with_outputs(["m"])
            .spec(Concurrency::Singleton)
            .unwrap(),
    ];

    let mut event_loop =
        EventLoop::new(scheduler_config(2, 2), EventLoopConfig::default(), specs).unwrap();
    let summary = event_loop.execute_run(Some(3)).await.unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.stalled, 3);
    assert_eq!(summary.count(EventStatus::AlgStall), 3);
}

#[tokio::test]
async fn cycles_can_be_rejected_at_configuration() {
    let specs = vec![
        Cruncher::new("P")
            .with_inputs(["m"])
            .with_outputs(["n"])
            .spec(Concurrency::Singleton)
            .unwrap(),
        Cruncher::new("Q")
            .with_inputs(["n"])
            .with_outputs(["m"])
            .spec(Concurrency::Singleton)
            .unwrap(),
    ];
    let config = SchedulerConfig::builder()
        .with_reject_cycles(true)
        .build()
        .unwrap();

    let err = EventLoop::new(config, EventLoopConfig::default(), specs).unwrap_err();
    assert!(matches!(err, Error::CyclicDependency(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn algorithm_failure_marks_only_its_event() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let mut specs = abc(&recorder);
    specs[1] = Cruncher::new("B")
        .with_inputs(["x"])
        .with_outputs(["y"])
        .with_fail_every(2)
        .with_recorder(recorder.clone())
        .spec(Concurrency::Reentrant)
        .unwrap();

    let mut event_loop = EventLoop::new(scheduler_config(2, 4), EventLoopConfig::default(), specs)
        .unwrap()
        .with_selector(CountingSelector::new(6));
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 6);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.succeeded, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn aborted_event_stops_dispatch_but_run_continues() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let mut specs = abc(&recorder);
    specs[0] = Cruncher::new("A")
        .with_outputs(["x"])
        .with_abort_on([1])
        .with_recorder(recorder.clone())
        .spec(Concurrency::Reentrant)
        .unwrap();
    let listener = Arc::new(RecordingListener::new());

    let mut event_loop = EventLoop::new(scheduler_config(2, 4), EventLoopConfig::default(), specs)
        .unwrap()
        .with_selector(CountingSelector::new(4))
        .with_listener(listener.clone());
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.aborted, 1);
    assert_eq!(summary.succeeded, 3);
    assert!(recorder.execution("B", 1).is_none());
    assert!(recorder.execution("C", 1).is_none());
    assert!(listener.incidents().iter().any(|incident| matches!(
        incident,
        Incident::EndEvent { event: 1, status: EventStatus::Aborted, .. }
    )));
}

/// Copies the event payload into the store.
struct CopyRoot;

impl Algorithm for CopyRoot {
    fn execute(&self, ctx: &EventContext, store: &EventStore) -> Result<(), AlgorithmError> {
        let value = store.retrieve::<u64>(ROOT_KEY)?;
        std::thread::sleep(Duration::from_millis(ctx.event_number() % 3));
        store.register("copy", *value)?;
        Ok(())
    }
}

/// Checks the copied value against the event payload.
struct CheckCopy;

impl Algorithm for CheckCopy {
    fn execute(&self, _: &EventContext, store: &EventStore) -> Result<(), AlgorithmError> {
        let root = store.retrieve::<u64>(ROOT_KEY)?;
        let copy = store.retrieve::<u64>("copy")?;
        if root != copy {
            return Err(AlgorithmError::new(format!("slot leak: {root} != {copy}")));
        }
        store.register("checked", true)?;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slots_never_share_data() {
    let specs = vec![
        AlgorithmSpec::builder("CopyRoot")
            .with_output("copy")
            .with_concurrency(Concurrency::Reentrant)
            .with_factory(|| CopyRoot)
            .build()
            .unwrap(),
        AlgorithmSpec::builder("CheckCopy")
            .with_input("copy")
            .with_output("checked")
            .with_concurrency(Concurrency::Reentrant)
            .with_factory(|| CheckCopy)
            .build()
            .unwrap(),
    ];

    let mut event_loop = EventLoop::new(scheduler_config(4, 4), EventLoopConfig::default(), specs)
        .unwrap()
        .with_selector(VecSelector::from_payloads((0..40u64).map(|i| i * 1000)));
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 40);
    assert_eq!(summary.succeeded, 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_slot_is_reused_without_residue() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let mut event_loop =
        EventLoop::new(scheduler_config(1, 2), EventLoopConfig::default(), abc(&recorder))
            .unwrap()
            .with_selector(CountingSelector::new(5));
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.succeeded, 5);
    assert_eq!(recorder.count("A"), 5);
    assert!(recorder.executions().iter().all(|execution| execution.slot == 0));
    assert_eq!(event_loop.whiteboard().free_slots(), 1);
    assert_eq!(event_loop.slot_states(), &[SlotState::Free]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn instance_limits_hold_across_slots() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let ms = Duration::from_millis;
    let specs = vec![
        Cruncher::new("Single")
            .with_outputs(["s"])
            .with_runtime(ms(4))
            .with_recorder(recorder.clone())
            .spec(Concurrency::Singleton)
            .unwrap(),
        Cruncher::new("Pair")
            .with_outputs(["p"])
            .with_runtime(ms(4))
            .with_recorder(recorder.clone())
            .spec(Concurrency::Clonable { cardinality: 2 })
            .unwrap(),
    ];

    let mut event_loop = EventLoop::new(scheduler_config(4, 8), EventLoopConfig::default(), specs)
        .unwrap()
        .with_selector(CountingSelector::new(12));
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.succeeded, 12);
    assert_eq!(recorder.peak_concurrency("Single"), 1);
    assert!(recorder.peak_concurrency("Pair") <= 2);
    assert!(summary.pool.get("Pair").unwrap().instances <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exclusive_resource_serializes_algorithms() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let ms = Duration::from_millis;
    let specs = ["Left", "Right"]
        .into_iter()
        .map(|name| {
            Cruncher::new(name)
                .with_outputs([name.to_lowercase()])
                .with_runtime(ms(3))
                .with_recorder(recorder.clone())
                .spec_with_resources(Concurrency::Reentrant, ["legacy"])
                .unwrap()
        })
        .collect();

    let mut event_loop = EventLoop::new(scheduler_config(4, 4), EventLoopConfig::default(), specs)
        .unwrap()
        .with_selector(CountingSelector::new(6));
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.succeeded, 6);
    assert_eq!(recorder.peak_total_concurrency(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn global_in_flight_cap_is_respected() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let specs = ["A", "B", "C"]
        .into_iter()
        .map(|name| {
            Cruncher::new(name)
                .with_outputs([name.to_lowercase()])
                .with_runtime(Duration::from_millis(2))
                .with_recorder(recorder.clone())
                .spec(Concurrency::Reentrant)
                .unwrap()
        })
        .collect();
    let config = SchedulerConfig::builder()
        .with_event_slots(3usize)
        .with_worker_threads(4usize)
        .with_max_algorithms_in_flight(1usize)
        .build()
        .unwrap();

    let mut event_loop = EventLoop::new(config, EventLoopConfig::default(), specs)
        .unwrap()
        .with_selector(CountingSelector::new(4));
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.succeeded, 4);
    assert_eq!(recorder.peak_total_concurrency(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn max_events_bounds_the_run() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let mut event_loop =
        EventLoop::new(scheduler_config(2, 2), EventLoopConfig::default(), abc(&recorder))
            .unwrap()
            .with_selector(CountingSelector::new(100));
    let summary = event_loop.execute_run(Some(7)).await.unwrap();

    assert_eq!(summary.processed, 7);
    assert_eq!(summary.stop_reason, StopReason::MaxEvents);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn configured_max_events_and_restart() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let config = EventLoopConfig::builder().with_max_events(2u64).build().unwrap();
    let mut event_loop = EventLoop::new(scheduler_config(2, 2), config, abc(&recorder))
        .unwrap()
        .with_selector(CountingSelector::new(3));

    event_loop.initialize().unwrap();
    event_loop.start().unwrap();
    assert_eq!(event_loop.run().await.unwrap().processed, 2);
    event_loop.stop().unwrap();

    // A new selector context starts from the first event again.
    event_loop.start().unwrap();
    let summary = event_loop.next_event(None).await.unwrap();
    assert_eq!(summary.processed, 3);
    event_loop.stop().unwrap();
    event_loop.finalize().unwrap();

    assert_eq!(recorder.execution("A", 4).map(|e| e.event), Some(4));
}

#[tokio::test]
async fn lifecycle_order_is_enforced() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let mut event_loop =
        EventLoop::new(scheduler_config(1, 1), EventLoopConfig::default(), abc(&recorder))
            .unwrap();

    let err = event_loop.next_event(Some(1)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            expected: LoopState::Started,
            actual: LoopState::Configured
        }
    ));

    event_loop.initialize().unwrap();
    assert!(event_loop.initialize().is_err());
    event_loop.start().unwrap();
    assert!(matches!(
        event_loop.next_event(None).await,
        Err(Error::InvalidConfig(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_threshold_stops_pulling() {
    let spec = Cruncher::new("Flaky")
        .with_outputs(["f"])
        .with_fail_every(1)
        .spec(Concurrency::Singleton)
        .unwrap();
    let config = EventLoopConfig::builder()
        .with_max_failed_events(2u64)
        .build()
        .unwrap();

    let mut event_loop = EventLoop::new(scheduler_config(1, 1), config, vec![spec])
        .unwrap()
        .with_selector(CountingSelector::new(50));
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.stop_reason, StopReason::FailureThreshold);
}

/// Requests a stop when a given event begins.
struct StopAt {
    event: u64,
    handle: Mutex<Option<StopHandle>>,
}

impl IncidentListener for StopAt {
    fn handle(&self, incident: &Incident) {
        if let Incident::BeginEvent { event, .. } = incident
            && *event == self.event
            && let Some(handle) = self.handle.lock().unwrap().as_ref()
        {
            handle.stop_run();
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_request_drains_in_flight_events() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let stop_at = Arc::new(StopAt {
        event: 3,
        handle: Mutex::new(None),
    });

    let mut event_loop =
        EventLoop::new(scheduler_config(1, 2), EventLoopConfig::default(), abc(&recorder))
            .unwrap()
            .with_selector(CountingSelector::new(100))
            .with_listener(stop_at.clone());
    *stop_at.handle.lock().unwrap() = Some(event_loop.stop_handle());

    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.stop_reason, StopReason::StopRequested);
    assert!(!event_loop.stop_handle().is_stop_requested());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_request_is_consumed_and_loop_restarts() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let mut event_loop =
        EventLoop::new(scheduler_config(2, 2), EventLoopConfig::default(), abc(&recorder)).unwrap();
    event_loop.initialize().unwrap();
    event_loop.start().unwrap();

    event_loop.stop_handle().stop_run();
    let first = event_loop.next_event(Some(5)).await.unwrap();
    assert_eq!(first.processed, 0);
    assert_eq!(first.stop_reason, StopReason::StopRequested);
    assert!(!event_loop.stop_handle().is_stop_requested());

    event_loop.stop().unwrap();
    event_loop.start().unwrap();
    let second = event_loop.next_event(Some(5)).await.unwrap();
    assert_eq!(second.processed, 5);
    assert_eq!(second.succeeded, 5);
    assert_eq!(second.stop_reason, StopReason::MaxEvents);

    event_loop.stop().unwrap();
    event_loop.finalize().unwrap();
}

/// Aborts an event from its `BeginEvent` incident.
struct AbortOnBegin {
    event: u64,
    incidents: Mutex<Option<Arc<IncidentBus>>>,
}

impl IncidentListener for AbortOnBegin {
    fn handle(&self, incident: &Incident) {
        if let Incident::BeginEvent { slot, event } = incident
            && *event == self.event
            && let Some(bus) = self.incidents.lock().unwrap().as_ref()
        {
            bus.fire(&Incident::AbortEvent {
                slot: *slot,
                event: Some(*event),
                source: "AbortOnBegin".into(),
            });
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn abort_from_begin_event_listener_is_honored() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let abort_on_begin = Arc::new(AbortOnBegin {
        event: 2,
        incidents: Mutex::new(None),
    });
    let listener = Arc::new(RecordingListener::new());

    let mut event_loop =
        EventLoop::new(scheduler_config(2, 4), EventLoopConfig::default(), abc(&recorder))
            .unwrap()
            .with_selector(CountingSelector::new(4))
            .with_listener(abort_on_begin.clone())
            .with_listener(listener.clone());
    *abort_on_begin.incidents.lock().unwrap() = Some(event_loop.incidents().clone());

    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.aborted, 1);
    assert_eq!(summary.succeeded, 3);
    assert!(recorder.execution("A", 2).is_none());
    assert!(listener.incidents().iter().any(|incident| matches!(
        incident,
        Incident::EndEvent { event: 2, status: EventStatus::Aborted, .. }
    )));
}

/// Yields `good` events, then fails.
struct FailingSelector {
    good: usize,
}

impl EventSelector for FailingSelector {
    fn create_context(&mut self) -> Result<SelectorContext, SelectorError> {
        Ok(Box::new(0usize))
    }

    fn next(&mut self, context: &mut SelectorContext) -> Result<Selection, SelectorError> {
        let read = context
            .downcast_mut::<usize>()
            .ok_or_else(SelectorError::invalid_context)?;
        if *read >= self.good {
            return Err(SelectorError::new("input file truncated"));
        }
        *read += 1;
        Ok(Selection::Available)
    }

    fn create_address(
        &mut self,
        _: &SelectorContext,
    ) -> Result<Option<EventAddress>, SelectorError> {
        Ok(Some(EventAddress::new("good")))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn selector_error_is_returned_after_draining() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let listener = Arc::new(RecordingListener::new());
    let mut event_loop =
        EventLoop::new(scheduler_config(2, 4), EventLoopConfig::default(), abc(&recorder))
            .unwrap()
            .with_selector(FailingSelector { good: 2 })
            .with_listener(listener.clone());
    event_loop.initialize().unwrap();
    event_loop.start().unwrap();

    let err = event_loop.next_event(None).await.unwrap_err();

    assert!(matches!(err, Error::Selector(_)));
    for event in 0..2 {
        assert_eq!(listener.end_count(event), 1, "event {event}");
        assert!(recorder.execution("B", event).is_some(), "event {event}");
    }
    assert!(event_loop.slot_states().iter().all(|state| *state == SlotState::Free));
    assert_eq!(event_loop.whiteboard().free_slots(), 2);

    event_loop.stop().unwrap();
    event_loop.finalize().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn begin_and_end_fire_once_per_event() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let mut specs = abc(&recorder);
    specs[0] = Cruncher::new("A")
        .with_outputs(["x"])
        .with_abort_on([2])
        .spec(Concurrency::Reentrant)
        .unwrap();
    specs[2] = Cruncher::new("C")
        .with_inputs(["x"])
        .with_outputs(["z"])
        .with_fail_every(3)
        .spec(Concurrency::Reentrant)
        .unwrap();
    let listener = Arc::new(RecordingListener::new());

    let mut event_loop = EventLoop::new(scheduler_config(3, 4), EventLoopConfig::default(), specs)
        .unwrap()
        .with_selector(CountingSelector::new(9))
        .with_listener(listener.clone());
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 9);
    for event in 0..9 {
        assert_eq!(listener.begin_count(event), 1, "event {event}");
        assert_eq!(listener.end_count(event), 1, "event {event}");
    }
}

/// Provides every input nothing else produces.
struct Loader;

impl Algorithm for Loader {
    fn execute(&self, ctx: &EventContext, store: &EventStore) -> Result<(), AlgorithmError> {
        store.register("raw", ctx.event_number())?;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn data_loader_provides_unmet_inputs() {
    let specs = vec![
        AlgorithmSpec::builder("Loader")
            .with_factory(|| Loader)
            .build()
            .unwrap(),
        Cruncher::new("Reco")
            .with_inputs(["raw"])
            .with_outputs(["tracks"])
            .spec(Concurrency::Singleton)
            .unwrap(),
    ];
    let config = SchedulerConfig::builder()
        .with_event_slots(2usize)
        .with_worker_threads(2usize)
        .with_data_loader("Loader")
        .build()
        .unwrap();

    let mut event_loop = EventLoop::new(config, EventLoopConfig::default(), specs).unwrap();
    let summary = event_loop.execute_run(Some(3)).await.unwrap();

    assert_eq!(summary.succeeded, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn selector_retries_once_on_missing_address() {
    let recorder = Arc::new(ExecutionRecorder::new());
    let selector = VecSelector::new([
        Some(EventAddress::new("first")),
        None,
        Some(EventAddress::new("third")),
    ]);

    let mut event_loop =
        EventLoop::new(scheduler_config(1, 2), EventLoopConfig::default(), abc(&recorder))
            .unwrap()
            .with_selector(selector);
    let summary = event_loop.execute_run(None).await.unwrap();

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.stop_reason, StopReason::SelectorExhausted);
}
