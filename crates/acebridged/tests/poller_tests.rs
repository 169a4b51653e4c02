//! Polling loop tests with a scripted printer and a recording transport.

use acebridge_common::observation::{AVAIL, EXEC, EXT_TEMP, FIL_STATUS, PRINT_PROGRESS, PROG};
use acebridge_common::{ObservationSet, ObservationValue, RawStatus, StatusError};
use acebridged::adapter::Transport;
use acebridged::poller::{CycleOutcome, CycleStats, Poller};
use acebridged::printer_client::{FetchError, StatusSource};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

// ============================================================================
// Test doubles
// ============================================================================

/// Printer that replays scripted responses, then keeps failing
struct ScriptedPrinter {
    responses: Mutex<VecDeque<Result<RawStatus, FetchError>>>,
}

impl ScriptedPrinter {
    fn new(responses: Vec<Result<RawStatus, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl StatusSource for ScriptedPrinter {
    async fn fetch(&self) -> Result<RawStatus, FetchError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Network("connection refused".to_string())))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Begin,
    Set(String, ObservationValue),
    End,
}

#[derive(Default)]
struct RecordingTransport {
    calls: Vec<Call>,
}

impl Transport for RecordingTransport {
    fn begin_batch(&mut self) {
        self.calls.push(Call::Begin);
    }

    fn set_value(&mut self, name: &str, value: ObservationValue) {
        self.calls.push(Call::Set(name.to_string(), value));
    }

    fn end_batch(&mut self) {
        self.calls.push(Call::End);
    }
}

fn ok(status: Value) -> Result<RawStatus, FetchError> {
    Ok(RawStatus::from_envelope(json!({ "result": { "status": status } })).unwrap())
}

fn printing() -> Value {
    json!({
        "extruder": {"temperature": 205.3},
        "heater_bed": {"temperature": 60.1},
        "toolhead": {"position": [120.5, 80.2, 15.0, 3.1]},
        "print_stats": {"state": "printing", "filename": "part.gcode"},
        "display_status": {"message": "Printing layer 12"},
        "virtual_sdcard": {"progress": 0.333},
        "filament_switch_sensor filament_sensor": {"filament_detected": true}
    })
}

fn poller(
    responses: Vec<Result<RawStatus, FetchError>>,
) -> Poller<ScriptedPrinter, RecordingTransport> {
    Poller::new(
        ScriptedPrinter::new(responses),
        RecordingTransport::default(),
        ObservationSet::standard(),
        Duration::from_millis(10),
    )
}

fn value(poller: &Poller<ScriptedPrinter, RecordingTransport>, name: &str) -> ObservationValue {
    poller.observations().get(name).unwrap().value.clone()
}

// ============================================================================
// Cycle behaviour
// ============================================================================

#[tokio::test]
async fn test_successful_cycle_publishes_one_batch() {
    let mut poller = poller(vec![ok(printing())]);

    assert_eq!(poller.run_cycle().await, CycleOutcome::Published);

    let calls = &poller.transport().calls;
    assert_eq!(calls.len(), 13);
    assert_eq!(calls.first(), Some(&Call::Begin));
    assert_eq!(calls.last(), Some(&Call::End));
    assert_eq!(
        calls[1],
        Call::Set(AVAIL.to_string(), ObservationValue::text("AVAILABLE"))
    );
    assert_eq!(
        calls.iter().filter(|c| matches!(c, Call::Begin)).count(),
        1
    );

    assert_eq!(value(&poller, AVAIL), ObservationValue::text("AVAILABLE"));
    assert_eq!(value(&poller, EXT_TEMP), ObservationValue::Number(205.3));
    assert_eq!(value(&poller, EXEC), ObservationValue::text("PRINTING"));
    assert_eq!(value(&poller, PROG), ObservationValue::text("part.gcode"));
    assert_eq!(value(&poller, PRINT_PROGRESS), ObservationValue::Number(33.3));
    assert_eq!(value(&poller, FIL_STATUS), ObservationValue::text("LOADED"));
    assert_eq!(
        poller.stats(),
        CycleStats {
            published: 1,
            skipped: 0
        }
    );
}

#[tokio::test]
async fn test_every_observation_written_each_cycle() {
    let mut poller = poller(vec![ok(printing())]);
    poller.run_cycle().await;

    let written: Vec<&str> = poller
        .transport()
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::Set(name, _) => Some(name.as_str()),
            _ => None,
        })
        .collect();

    for observation in poller.observations().iter() {
        assert!(written.contains(&observation.name), "{} not written", observation.name);
    }
    assert!(poller.observations().iter().all(|o| !o.value.is_unavailable()));
}

#[tokio::test]
async fn test_empty_status_publishes_defaults() {
    let mut poller = poller(vec![ok(json!({}))]);

    assert_eq!(poller.run_cycle().await, CycleOutcome::Published);
    assert_eq!(value(&poller, AVAIL), ObservationValue::text("AVAILABLE"));
    assert_eq!(value(&poller, EXT_TEMP), ObservationValue::Number(0.0));
    assert_eq!(value(&poller, EXEC), ObservationValue::text("STANDBY"));
    assert_eq!(value(&poller, PROG), ObservationValue::text("NONE"));
    assert_eq!(value(&poller, PRINT_PROGRESS), ObservationValue::Number(0.0));
    assert_eq!(value(&poller, FIL_STATUS), ObservationValue::text("OUT"));
}

#[tokio::test]
async fn test_network_failure_skips_cycle() {
    let mut poller = poller(vec![Err(FetchError::Network("timed out".to_string()))]);

    assert_eq!(poller.run_cycle().await, CycleOutcome::Skipped);
    assert!(poller.transport().calls.is_empty());
    assert!(poller.observations().iter().all(|o| o.value.is_unavailable()));
    assert_eq!(poller.stats().skipped, 1);
}

#[tokio::test]
async fn test_malformed_response_leaves_values_unchanged() {
    let mut poller = poller(vec![
        ok(printing()),
        Err(FetchError::Envelope(StatusError::MissingStatus)),
        Err(FetchError::Decode("expected value at line 1".to_string())),
    ]);

    poller.run_cycle().await;
    let before: Vec<ObservationValue> =
        poller.observations().iter().map(|o| o.value.clone()).collect();
    let calls_before = poller.transport().calls.len();

    assert_eq!(poller.run_cycle().await, CycleOutcome::Skipped);
    assert_eq!(poller.run_cycle().await, CycleOutcome::Skipped);

    let after: Vec<ObservationValue> =
        poller.observations().iter().map(|o| o.value.clone()).collect();
    assert_eq!(before, after);
    assert_eq!(poller.transport().calls.len(), calls_before);
    assert_eq!(
        poller.stats(),
        CycleStats {
            published: 1,
            skipped: 2
        }
    );
}

#[tokio::test]
async fn test_same_status_twice_is_idempotent() {
    let mut poller = poller(vec![ok(printing()), ok(printing())]);

    poller.run_cycle().await;
    let first: Vec<ObservationValue> =
        poller.observations().iter().map(|o| o.value.clone()).collect();
    let first_batch = poller.transport().calls.clone();

    poller.run_cycle().await;
    let second: Vec<ObservationValue> =
        poller.observations().iter().map(|o| o.value.clone()).collect();
    let second_batch = poller.transport().calls[first_batch.len()..].to_vec();

    assert_eq!(first, second);
    assert_eq!(first_batch, second_batch);
}

#[tokio::test]
async fn test_recovers_after_printer_returns() {
    let mut poller = poller(vec![
        Err(FetchError::Network("connection refused".to_string())),
        ok(json!({"print_stats": {"state": "ready"}})),
    ]);

    assert_eq!(poller.run_cycle().await, CycleOutcome::Skipped);
    assert_eq!(poller.run_cycle().await, CycleOutcome::Published);
    assert_eq!(value(&poller, EXEC), ObservationValue::text("READY"));
}

// ============================================================================
// Loop lifecycle
// ============================================================================

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let (tx, rx) = watch::channel(false);
    let mut poller = poller(vec![ok(printing())]);

    let task = tokio::spawn(async move {
        poller.run(rx).await;
        poller
    });

    tokio::time::sleep(Duration::from_millis(60)).await;
    tx.send(true).unwrap();

    let poller = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("poller did not stop")
        .unwrap();

    let stats = poller.stats();
    assert_eq!(stats.published, 1);
    assert!(stats.skipped >= 1, "printer gone after first cycle");
}

#[tokio::test]
async fn test_run_stops_when_sender_dropped() {
    let (tx, rx) = watch::channel(false);
    let mut poller = poller(vec![]);

    let task = tokio::spawn(async move {
        poller.run(rx).await;
    });
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("poller did not stop")
        .unwrap();
}
