//! FlowGenerator trait definition.
//!
//! The driver asks a generator for the next event and for how long to wait
//! before producing it. Implementations live in flowcast-infra
//! (e.g., `SimulatedFlowGenerator`); tests inject scripted fixtures.

use std::time::Duration;

use chrono::{DateTime, Utc};

use flowcast_types::flow::FlowEvent;

/// Source of flow events and of the cadence at which they appear.
pub trait FlowGenerator: Send {
    /// Build the next event, stamped with `now`.
    fn next_event(&mut self, now: DateTime<Utc>) -> FlowEvent;

    /// Delay before the next event should be produced.
    fn next_delay(&mut self) -> Duration;
}
