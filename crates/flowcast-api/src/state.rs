//! Application state shared by the HTTP handlers and the flow driver.
//!
//! There is no process-wide hub: `AppState` owns the store and hub behind
//! `Arc`s and is handed to the router and the driver explicitly.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use flowcast_core::driver::{DriverHandle, FlowDriver};
use flowcast_core::hub::BroadcastHub;
use flowcast_core::store::EventStore;
use flowcast_infra::simulator::SimulatedFlowGenerator;
use flowcast_types::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EventStore>,
    pub hub: Arc<BroadcastHub>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            store: Arc::new(EventStore::new(config.history_capacity)),
            hub: Arc::new(BroadcastHub::new(config.send_timeout())),
            config,
        }
    }

    /// Spawn the simulated flow driver against this state's store and hub.
    ///
    /// A configured seed makes the generated sequence reproducible.
    pub fn start_driver(&self, cancel: CancellationToken) -> DriverHandle {
        let (min, max) = (self.config.min_interval(), self.config.max_interval());
        let threshold = self.config.broadcast_threshold;

        match self.config.seed {
            Some(seed) => {
                tracing::info!(seed, "Starting seeded flow simulator");
                FlowDriver::new(
                    Arc::clone(&self.store),
                    Arc::clone(&self.hub),
                    SimulatedFlowGenerator::seeded(seed, min, max),
                )
                .with_threshold(threshold)
                .spawn(cancel)
            }
            None => FlowDriver::new(
                Arc::clone(&self.store),
                Arc::clone(&self.hub),
                SimulatedFlowGenerator::from_entropy(min, max),
            )
            .with_threshold(threshold)
            .spawn(cancel),
        }
    }
}
