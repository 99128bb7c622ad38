use thiserror::Error;

use crate::connection::ConnectionId;

/// Errors related to flow event parsing and validation.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("malformed flow event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl FlowError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        FlowError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// True when the input was not JSON at all (as opposed to JSON with the
    /// wrong shape or out-of-range values).
    pub fn is_syntax(&self) -> bool {
        match self {
            FlowError::Malformed(err) => err.is_syntax() || err.is_eof(),
            FlowError::Invalid { .. } => false,
        }
    }
}

/// Errors from delivering a payload to one subscriber connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,

    #[error("send timed out after {0} ms")]
    TimedOut(u64),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from broadcast hub operations addressed at a single connection.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("connection {0} is not subscribed")]
    UnknownConnection(ConnectionId),

    #[error("delivery to {id} failed: {source}")]
    Delivery {
        id: ConnectionId,
        #[source]
        source: DeliveryError,
    },
}

/// Errors from loading or validating the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
