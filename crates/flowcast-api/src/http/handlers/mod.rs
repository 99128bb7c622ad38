//! HTTP request handlers.

pub mod flow;
pub mod ws;
