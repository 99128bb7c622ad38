//! HTTP and WebSocket surface for Flowcast.
//!
//! Axum router with a health check, the unusual-flow query endpoint and the
//! live `/ws/flow` feed. CORS is wide open.

pub mod error;
pub mod handlers;
pub mod router;
pub mod ws_subscriber;
