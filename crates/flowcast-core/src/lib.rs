//! Event store, broadcast hub, and flow driver for Flowcast.
//!
//! This crate defines the "ports" (`Subscriber`, `FlowGenerator`) that the
//! transport and simulation layers implement. It depends only on
//! `flowcast-types` -- never on `flowcast-infra`, axum, or any I/O crate.

pub mod driver;
pub mod generator;
pub mod hub;
pub mod store;
pub mod subscriber;

pub use driver::{DriverError, DriverHandle, FlowDriver, TickOutcome};
pub use generator::FlowGenerator;
pub use hub::{BroadcastHub, BroadcastReport};
pub use store::{EventStore, SnapshotOrder};
pub use subscriber::{BoxSubscriber, Subscriber};
