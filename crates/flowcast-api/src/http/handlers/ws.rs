//! WebSocket handler for live flow events.
//!
//! The `/ws/flow` endpoint upgrades an HTTP connection to a WebSocket.
//! Once connected, the handler:
//!
//! - **Subscribes:** Registers a [`WsSubscriber`] with the [`BroadcastHub`]
//!   on [`AppState`], so significant flow events are pushed to the client.
//! - **Receives events:** Parses incoming text frames as [`FlowEvent`]
//!   records and re-broadcasts valid ones to every subscriber. Invalid input
//!   is answered with an error message to the sender only; the connection
//!   stays subscribed.
//!
//! The connection is unsubscribed when the client closes, the socket errors,
//! the writer task fails, or the hub shuts down. Whichever path gets there
//! first wins; the others are no-ops.
//!
//! [`BroadcastHub`]: flowcast_core::hub::BroadcastHub

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use flowcast_core::subscriber::{BoxSubscriber, Subscriber};
use flowcast_types::connection::ConnectionId;
use flowcast_types::error::FlowError;
use flowcast_types::flow::FlowEvent;

use crate::http::ws_subscriber::{OUTBOUND_BUFFER, WsSubscriber, write_loop};
use crate::state::AppState;

/// Upgrade an HTTP request to a WebSocket subscription.
///
/// This is mounted at `/ws/flow` in the router.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, ws_receiver) = socket.split();
    run_connection(ws_sender, ws_receiver, state).await;
}

/// Drive one subscribed connection until the client, the writer or the hub
/// ends it.
pub(crate) async fn run_connection<S, R>(ws_sender: S, mut ws_receiver: R, state: AppState)
where
    S: SinkExt<Message, Error = axum::Error> + Send + Unpin + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let cancel = CancellationToken::new();

    let subscriber = WsSubscriber::new(outbound_tx, cancel.clone());
    let id = subscriber.id();
    let writer = tokio::spawn(write_loop(
        ws_sender,
        outbound_rx,
        cancel.clone(),
        subscriber.write_failure(),
    ));

    if !state.hub.subscribe(BoxSubscriber::new(subscriber)) {
        cancel.cancel();
        let _ = writer.await;
        return;
    }

    loop {
        tokio::select! {
            // Hub closed us (shutdown or failed send) or the writer died.
            _ = cancel.cancelled() => break,

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        process_inbound(&state, id, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(connection_id = %id, "WebSocket receive error: {err}");
                        break;
                    }
                    // Ignore binary, ping, pong protocol frames (handled by axum/tungstenite)
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.hub.unsubscribe(id);
    cancel.cancel();
    if let Err(err) = writer.await {
        tracing::warn!(connection_id = %id, "WebSocket writer task failed: {err}");
    }
    tracing::debug!(connection_id = %id, "WebSocket connection closed");
}

/// Handle one inbound text frame from connection `id`.
pub(crate) async fn process_inbound(state: &AppState, id: ConnectionId, text: &str) {
    match FlowEvent::from_json(text) {
        Ok(event) => {
            let report = state.hub.broadcast_json(&event).await;
            tracing::debug!(
                connection_id = %id,
                ticker = %event.ticker,
                delivered = report.delivered,
                "Re-broadcast client flow event"
            );
        }
        Err(err) => {
            tracing::warn!(connection_id = %id, error = %err, "Rejected client flow event");
            if let Err(send_err) = state.hub.send_to(id, error_reply(&err)).await {
                tracing::debug!(connection_id = %id, "Failed to send error reply: {send_err}");
            }
        }
    }
}

/// Text sent back to a client whose message was rejected.
pub(crate) fn error_reply(err: &FlowError) -> String {
    if err.is_syntax() {
        "Error: Invalid JSON".to_string()
    } else {
        format!("Error: {err}")
    }
}
