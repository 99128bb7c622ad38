//! Periodic flow driver.
//!
//! On every tick the driver asks its generator for an event, appends it to
//! the event store, and pushes it through the broadcast hub only when the
//! conviction score reaches the significance threshold. The store keeps
//! everything; subscribers only hear about the significant events.
//!
//! Cancellation is observed only while waiting for the next tick, so a
//! shutdown never interrupts an append or a broadcast pass half-way.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use flowcast_types::flow::{DEFAULT_BROADCAST_THRESHOLD, FlowEvent};

use crate::generator::FlowGenerator;
use crate::hub::{BroadcastHub, BroadcastReport};
use crate::store::EventStore;

/// Errors surfaced when stopping the driver task.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The driver task panicked or was aborted instead of stopping cleanly.
    #[error("flow driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result of a single driver step.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// The event as stored.
    pub event: Arc<FlowEvent>,
    /// Present only when the event was significant enough to broadcast.
    pub broadcast: Option<BroadcastReport>,
}

/// Produces events on the generator's cadence and feeds store and hub.
pub struct FlowDriver<G> {
    store: Arc<EventStore>,
    hub: Arc<BroadcastHub>,
    generator: G,
    threshold: u8,
}

impl<G: FlowGenerator> FlowDriver<G> {
    pub fn new(store: Arc<EventStore>, hub: Arc<BroadcastHub>, generator: G) -> Self {
        Self {
            store,
            hub,
            generator,
            threshold: DEFAULT_BROADCAST_THRESHOLD,
        }
    }

    /// Override the conviction score required for push delivery.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Generate, store, and (if significant) broadcast one event.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let event = self.store.append(self.generator.next_event(now));

        if !event.is_significant(self.threshold) {
            tracing::debug!(
                ticker = %event.ticker,
                conviction = event.conviction_score,
                "Stored flow event below broadcast threshold"
            );
            return TickOutcome {
                event,
                broadcast: None,
            };
        }

        let report = self.hub.broadcast_json(&*event).await;
        tracing::info!(
            ticker = %event.ticker,
            option_type = %event.option_type,
            strike = event.strike,
            conviction = event.conviction_score,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcasted flow event"
        );

        TickOutcome {
            event,
            broadcast: Some(report),
        }
    }

    /// Tick on the generator's cadence until `cancel` fires.
    ///
    /// Returns the number of completed ticks.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        let mut ticks = 0u64;
        tracing::info!(threshold = self.threshold, "Flow driver started");

        loop {
            let delay = self.generator.next_delay();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            self.tick(Utc::now()).await;
            ticks += 1;
        }

        tracing::info!(ticks, "Flow driver stopped");
        ticks
    }
}

impl<G: FlowGenerator + 'static> FlowDriver<G> {
    /// Run the driver on a background task.
    pub fn spawn(self, cancel: CancellationToken) -> DriverHandle {
        let task = tokio::spawn(self.run(cancel.clone()));
        DriverHandle { cancel, task }
    }
}

/// Handle to a spawned driver task.
pub struct DriverHandle {
    cancel: CancellationToken,
    task: JoinHandle<u64>,
}

impl DriverHandle {
    /// Cancel the driver and wait for it to finish its current tick.
    pub async fn shutdown(self) -> Result<u64, DriverError> {
        self.cancel.cancel();
        Ok(self.task.await?)
    }
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
