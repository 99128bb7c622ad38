//! Shared domain types for Flowcast.
//!
//! This crate contains the domain types used across the Flowcast service:
//! the `FlowEvent` record, connection identifiers and states, the server
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod connection;
pub mod error;
pub mod flow;
