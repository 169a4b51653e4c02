//! Polling Loop Controller
//!
//! Runs fetch -> translate -> publish cycles at a fixed period. A failed
//! fetch skips the cycle: no observation changes and no batch is opened.
//! The loop never gives up on the printer and only stops on shutdown.

use crate::adapter::Transport;
use crate::printer_client::StatusSource;
use acebridge_common::observation::{AVAIL, AVAILABLE, BED_TEMP, EXT_TEMP};
use acebridge_common::{translate, ObservationSet, ObservationValue, Reading};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Result of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published,
    Skipped,
}

/// Cycle counters since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub published: u64,
    pub skipped: u64,
}

pub struct Poller<S, T> {
    source: S,
    transport: T,
    observations: ObservationSet,
    interval: Duration,
    stats: CycleStats,
}

impl<S: StatusSource, T: Transport> Poller<S, T> {
    pub fn new(source: S, transport: T, observations: ObservationSet, interval: Duration) -> Self {
        Self {
            source,
            transport,
            observations,
            interval,
            stats: CycleStats::default(),
        }
    }

    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one fetch-translate-publish cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let status = match self.source.fetch().await {
            Ok(status) => status,
            Err(e) => {
                warn!("No valid data from printer: {}", e);
                self.stats.skipped += 1;
                return CycleOutcome::Skipped;
            }
        };

        let readings = translate(&status);
        self.publish(readings);
        self.stats.published += 1;

        info!(
            "Status synced | Ext: {}C | Bed: {}C",
            self.value(EXT_TEMP),
            self.value(BED_TEMP)
        );
        CycleOutcome::Published
    }

    /// Publish one cycle's readings as a single batch
    fn publish(&mut self, readings: Vec<Reading>) {
        self.transport.begin_batch();
        self.record(AVAIL, ObservationValue::text(AVAILABLE));
        for reading in readings {
            self.record(reading.name, reading.value);
        }
        self.transport.end_batch();
    }

    fn record(&mut self, name: &str, value: ObservationValue) {
        if let Err(e) = self.observations.set(name, value.clone()) {
            error!("{}", e);
            return;
        }
        self.transport.set_value(name, value);
    }

    fn value(&self, name: &str) -> ObservationValue {
        self.observations
            .get(name)
            .map(|o| o.value.clone())
            .unwrap_or(ObservationValue::Unavailable)
    }

    /// Run cycles until `shutdown` becomes true or its sender is dropped
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting data loop, polling every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(
            "Data loop stopped: {} cycles published, {} skipped",
            self.stats.published, self.stats.skipped
        );
    }
}
