//! WebSocket adapter for the hub's `Subscriber` port.
//!
//! Each connection gets a bounded outbound queue drained by a single writer
//! task, so frames reach the socket in the order they were queued. `send`
//! never waits: a full queue means the client stopped reading, and the
//! connection is reported dead so the hub drops it without holding up the
//! broadcast pass.

use std::sync::{Arc, OnceLock};

use axum::extract::ws::Message;
use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use flowcast_core::subscriber::Subscriber;
use flowcast_types::connection::ConnectionId;
use flowcast_types::error::DeliveryError;

/// Frames buffered per connection before the client counts as too slow.
pub const OUTBOUND_BUFFER: usize = 64;

/// Reason the writer task gave up on the socket, set at most once.
pub type WriteFailure = Arc<OnceLock<String>>;

/// Hub-facing half of a WebSocket connection.
pub struct WsSubscriber {
    id: ConnectionId,
    outbound: mpsc::Sender<Message>,
    cancel: CancellationToken,
    failure: WriteFailure,
}

impl WsSubscriber {
    pub fn new(outbound: mpsc::Sender<Message>, cancel: CancellationToken) -> Self {
        Self {
            id: ConnectionId::new(),
            outbound,
            cancel,
            failure: WriteFailure::default(),
        }
    }

    /// Slot the writer task fills when a socket write fails.
    pub fn write_failure(&self) -> WriteFailure {
        Arc::clone(&self.failure)
    }
}

impl Subscriber for WsSubscriber {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: Arc<str>) -> Result<(), DeliveryError> {
        if let Some(reason) = self.failure.get() {
            return Err(DeliveryError::Transport(reason.clone()));
        }
        if self.cancel.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        match self.outbound.try_send(Message::Text(payload.to_string().into())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeliveryError::Transport(format!(
                "outbound queue full ({OUTBOUND_BUFFER} frames)"
            ))),
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

/// Drain the outbound queue into the socket until it closes or is cancelled.
///
/// A failed write is recorded in `failure`. Cancels `cancel` on exit so the
/// read loop and any further sends stop too.
pub async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Message>,
    cancel: CancellationToken,
    failure: WriteFailure,
) where
    S: SinkExt<Message, Error = axum::Error> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(err) = sink.send(frame).await {
                        tracing::debug!("WebSocket write failed: {err}");
                        let _ = failure.set(err.to_string());
                        break;
                    }
                }
                None => break,
            },
        }
    }
    cancel.cancel();
}
