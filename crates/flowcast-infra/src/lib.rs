//! Infrastructure adapters for Flowcast.
//!
//! Implements the ports defined in `flowcast-core` against concrete crates:
//! TOML configuration on disk and a `rand`-backed flow simulator.

pub mod config;
pub mod simulator;
