//! Broadcast hub: the registry of live subscriber connections.
//!
//! The hub owns the membership set and fans payloads out to every `Active`
//! connection. Delivery is best-effort: each send is bounded by a timeout,
//! and a connection whose send fails or times out is removed after the pass
//! without affecting delivery to anyone else. Nothing in here ever surfaces
//! a per-connection failure to the broadcast caller.
//!
//! Membership lives in a `DashMap` guarded independently of the event store.
//! Broadcast takes an immutable snapshot of the members first and releases
//! the map before awaiting any send, so removals never race the iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use serde::Serialize;

use flowcast_types::connection::{ConnectionId, ConnectionState};
use flowcast_types::error::{DeliveryError, HubError};

use crate::subscriber::BoxSubscriber;

/// Default per-connection delivery deadline.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Connections that accepted the payload.
    pub delivered: usize,
    /// Connections that failed or timed out and were removed.
    pub failed: usize,
}

/// A registered connection and its lifecycle state.
struct Connection {
    subscriber: BoxSubscriber,
    state: AtomicU8,
}

impl Connection {
    fn new(subscriber: BoxSubscriber) -> Self {
        Self {
            subscriber,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
        }
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn activate(&self) {
        let _ = self.state.compare_exchange(
            ConnectionState::Connecting as u8,
            ConnectionState::Active as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Drive the connection to `Closed`, closing the transport on the way.
    ///
    /// Returns false if another caller already started or finished the close.
    fn close(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if matches!(
                ConnectionState::from_u8(current),
                ConnectionState::Closing | ConnectionState::Closed
            ) {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        self.subscriber.close();
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
        true
    }
}

/// Registry of live subscriber connections with isolated fan-out delivery.
///
/// Constructed explicitly and shared by `Arc`; there is no process-wide
/// instance.
pub struct BroadcastHub {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    send_timeout: Duration,
    shut_down: AtomicBool,
}

impl BroadcastHub {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            send_timeout,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Register a newly accepted connection.
    ///
    /// Idempotent per connection id: returns false and leaves the existing
    /// registration untouched if the id is already present. Also returns
    /// false once the hub has been shut down.
    pub fn subscribe(&self, subscriber: BoxSubscriber) -> bool {
        if self.is_shut_down() {
            tracing::warn!(connection_id = %subscriber.id(), "Hub is shut down, refusing subscriber");
            return false;
        }

        let id = subscriber.id();
        match self.connections.entry(id) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                let connection = Arc::new(Connection::new(subscriber));
                connection.activate();
                slot.insert(connection);
            }
        }

        // Lost a race with shutdown: undo the registration.
        if self.is_shut_down() {
            self.remove(id);
            return false;
        }

        tracing::info!(connection_id = %id, subscribers = self.len(), "Subscriber connected");
        true
    }

    /// Remove a connection if present.
    ///
    /// Returns false when it was already gone; concurrent callers racing on
    /// the same id see exactly one `true`.
    pub fn unsubscribe(&self, id: ConnectionId) -> bool {
        let removed = self.remove(id);
        if removed {
            tracing::info!(connection_id = %id, subscribers = self.len(), "Subscriber disconnected");
        }
        removed
    }

    /// Deliver a payload to exactly one connection.
    ///
    /// A failed delivery removes the connection before the error is returned.
    pub async fn send_to(
        &self,
        id: ConnectionId,
        payload: impl Into<Arc<str>>,
    ) -> Result<(), HubError> {
        let connection = self
            .connections
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|connection| connection.state().is_deliverable())
            .ok_or(HubError::UnknownConnection(id))?;

        if let Err(source) = self.deliver(&connection, payload.into()).await {
            tracing::debug!(connection_id = %id, error = %source, "Direct send failed");
            self.remove(id);
            return Err(HubError::Delivery { id, source });
        }
        Ok(())
    }

    /// Deliver a payload to every `Active` connection.
    ///
    /// Sends run concurrently, each bounded by the hub's send timeout.
    /// Connections that fail are removed once the pass completes.
    pub async fn broadcast(&self, payload: impl Into<Arc<str>>) -> BroadcastReport {
        let payload: Arc<str> = payload.into();

        let targets: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .filter(|entry| entry.value().state().is_deliverable())
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        if targets.is_empty() {
            return BroadcastReport::default();
        }

        let results = join_all(targets.iter().map(|connection| {
            let payload = Arc::clone(&payload);
            async move {
                let id = connection.subscriber.id();
                (id, self.deliver(connection, payload).await)
            }
        }))
        .await;

        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    tracing::debug!(connection_id = %id, error = %err, "Broadcast delivery failed");
                    dead.push(id);
                }
            }
        }

        // Connections unsubscribed elsewhere mid-pass are not ours to count.
        report.failed = dead.into_iter().filter(|id| self.remove(*id)).count();

        if report.failed > 0 {
            tracing::warn!(
                delivered = report.delivered,
                failed = report.failed,
                "Removed unreachable subscribers after broadcast"
            );
        }
        report
    }

    /// Serialize once, then broadcast the JSON text.
    pub async fn broadcast_json<T: Serialize>(&self, value: &T) -> BroadcastReport {
        match serde_json::to_string(value) {
            Ok(json) => self.broadcast(json).await,
            Err(err) => {
                tracing::warn!("Failed to serialize broadcast payload: {err}");
                BroadcastReport::default()
            }
        }
    }

    /// Close and remove every connection, and refuse new ones from now on.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);

        let ids: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        let closed = ids.into_iter().filter(|id| self.remove(*id)).count();

        tracing::info!(closed, "Broadcast hub shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Current state of a registered connection, `None` once removed.
    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections.get(&id).map(|entry| entry.value().state())
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    async fn deliver(
        &self,
        connection: &Connection,
        payload: Arc<str>,
    ) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.send_timeout, connection.subscriber.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::TimedOut(
                self.send_timeout.as_millis() as u64,
            )),
        }
    }

    /// Only the caller that wins the map removal drives the close.
    fn remove(&self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some((_, connection)) => {
                connection.close();
                true
            }
            None => false,
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_TIMEOUT)
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscribers", &self.connections.len())
            .field("send_timeout", &self.send_timeout)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::testing::{BrokenSubscriber, RecordingSubscriber, StalledSubscriber};

    #[test]
    fn subscribe_then_unsubscribe_leaves_set_empty() {
        let hub = BroadcastHub::default();
        let recorder = RecordingSubscriber::new();

        assert!(hub.subscribe(BoxSubscriber::new(recorder.clone())));
        assert_eq!(hub.state(recorder.id), Some(ConnectionState::Active));

        assert!(hub.unsubscribe(recorder.id));
        assert!(hub.is_empty());
        assert_eq!(hub.state(recorder.id), None);
        assert!(recorder.is_closed());

        // Second removal is a no-op.
        assert!(!hub.unsubscribe(recorder.id));
    }

    #[test]
    fn subscribe_is_idempotent_per_connection() {
        let hub = BroadcastHub::default();
        let recorder = RecordingSubscriber::new();

        assert!(hub.subscribe(BoxSubscriber::new(recorder.clone())));
        assert!(!hub.subscribe(BoxSubscriber::new(recorder.clone())));
        assert_eq!(hub.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_isolates_broken_connections() {
        let hub = BroadcastHub::default();
        let healthy: Vec<RecordingSubscriber> = (0..3).map(|_| RecordingSubscriber::new()).collect();
        let broken: Vec<BrokenSubscriber> = (0..2).map(|_| BrokenSubscriber::default()).collect();

        for sub in &healthy {
            hub.subscribe(BoxSubscriber::new(sub.clone()));
        }
        for sub in &broken {
            hub.subscribe(BoxSubscriber::new(sub.clone()));
        }
        assert_eq!(hub.len(), 5);

        let report = hub.broadcast("tick").await;

        assert_eq!(report, BroadcastReport { delivered: 3, failed: 2 });
        for sub in &healthy {
            assert_eq!(sub.payloads(), ["tick"]);
            assert!(hub.contains(sub.id));
        }
        for sub in &broken {
            assert!(!hub.contains(sub.id));
        }
        assert_eq!(hub.len(), 3);
    }

    #[tokio::test]
    async fn broadcast_with_no_subscribers_is_a_noop() {
        let hub = BroadcastHub::default();
        assert_eq!(hub.broadcast("nobody").await, BroadcastReport::default());
    }

    #[tokio::test]
    async fn single_subscriber_sees_broadcast_order() {
        let hub = BroadcastHub::default();
        let recorder = RecordingSubscriber::new();
        hub.subscribe(BoxSubscriber::new(recorder.clone()));

        for i in 0..10 {
            hub.broadcast(i.to_string()).await;
        }

        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(recorder.payloads(), expected);
    }

    #[tokio::test]
    async fn send_to_reaches_only_the_target() {
        let hub = BroadcastHub::default();
        let x = RecordingSubscriber::new();
        let y = RecordingSubscriber::new();
        hub.subscribe(BoxSubscriber::new(x.clone()));
        hub.subscribe(BoxSubscriber::new(y.clone()));

        hub.send_to(x.id, "just for x").await.unwrap();

        assert_eq!(x.payloads(), ["just for x"]);
        assert!(y.payloads().is_empty());
        assert!(hub.contains(x.id));
        assert_eq!(hub.len(), 2);
    }

    #[tokio::test]
    async fn send_to_unknown_connection_errors() {
        let hub = BroadcastHub::default();
        let id = ConnectionId::new();
        let err = hub.send_to(id, "hello").await.unwrap_err();
        assert!(matches!(err, HubError::UnknownConnection(missing) if missing == id));
    }

    #[tokio::test]
    async fn send_to_broken_connection_removes_it() {
        let hub = BroadcastHub::default();
        let broken = BrokenSubscriber::default();
        hub.subscribe(BoxSubscriber::new(broken.clone()));

        let err = hub.send_to(broken.id, "hello").await.unwrap_err();

        assert!(matches!(
            err,
            HubError::Delivery { source: DeliveryError::Closed, .. }
        ));
        assert!(!hub.contains(broken.id));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_subscriber_times_out_without_blocking_others() {
        let hub = BroadcastHub::new(Duration::from_millis(50));
        let stalled = StalledSubscriber::default();
        let healthy = RecordingSubscriber::new();
        hub.subscribe(BoxSubscriber::new(stalled.clone()));
        hub.subscribe(BoxSubscriber::new(healthy.clone()));

        let report = hub.broadcast("tick").await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 1 });
        assert_eq!(healthy.payloads(), ["tick"]);
        assert!(!hub.contains(stalled.id));
    }

    #[tokio::test]
    async fn concurrent_double_removal_is_safe() {
        let hub = Arc::new(BroadcastHub::default());
        let recorder = RecordingSubscriber::new();
        hub.subscribe(BoxSubscriber::new(recorder.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let hub = Arc::clone(&hub);
                let id = recorder.id;
                tokio::spawn(async move { hub.unsubscribe(id) })
            })
            .collect();

        let mut removed = 0;
        for task in tasks {
            if task.await.unwrap() {
                removed += 1;
            }
        }

        assert_eq!(removed, 1);
        assert!(hub.is_empty());
    }

    #[tokio::test]
    async fn shutdown_closes_everything_and_refuses_new_subscribers() {
        let hub = BroadcastHub::default();
        let a = RecordingSubscriber::new();
        let b = RecordingSubscriber::new();
        hub.subscribe(BoxSubscriber::new(a.clone()));
        hub.subscribe(BoxSubscriber::new(b.clone()));

        hub.shutdown();

        assert!(hub.is_empty());
        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(hub.is_shut_down());
        assert!(!hub.subscribe(BoxSubscriber::new(RecordingSubscriber::new())));
        assert_eq!(hub.broadcast("late").await, BroadcastReport::default());
    }

    #[tokio::test]
    async fn broadcast_json_serializes_once() {
        let hub = BroadcastHub::default();
        let recorder = RecordingSubscriber::new();
        hub.subscribe(BoxSubscriber::new(recorder.clone()));

        let report = hub
            .broadcast_json(&serde_json::json!({"ticker": "AMD"}))
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(recorder.payloads(), [r#"{"ticker":"AMD"}"#]);
    }

    #[test]
    fn connection_close_is_idempotent() {
        let recorder = RecordingSubscriber::new();
        let connection = Connection::new(BoxSubscriber::new(recorder.clone()));
        connection.activate();

        assert!(connection.close());
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(!connection.close());
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[test]
    fn close_does_not_reopen_a_closing_connection() {
        let recorder = RecordingSubscriber::new();
        let connection = Connection::new(BoxSubscriber::new(recorder.clone()));
        connection
            .state
            .store(ConnectionState::Closing as u8, Ordering::Release);

        assert!(!connection.close());
        assert_eq!(connection.state(), ConnectionState::Closing);
        assert!(!recorder.is_closed());
    }

    /// Unsubscribes itself from the hub, then fails the send.
    struct SelfRemovingSubscriber {
        id: ConnectionId,
        hub: std::sync::Weak<BroadcastHub>,
    }

    impl crate::subscriber::Subscriber for SelfRemovingSubscriber {
        fn id(&self) -> ConnectionId {
            self.id
        }

        async fn send(&self, _payload: Arc<str>) -> Result<(), DeliveryError> {
            if let Some(hub) = self.hub.upgrade() {
                hub.unsubscribe(self.id);
            }
            Err(DeliveryError::Closed)
        }

        fn close(&self) {}
    }

    #[tokio::test]
    async fn connections_removed_elsewhere_are_not_counted_as_failed() {
        let hub = Arc::new(BroadcastHub::default());
        let healthy = RecordingSubscriber::new();
        let leaving = SelfRemovingSubscriber {
            id: ConnectionId::new(),
            hub: Arc::downgrade(&hub),
        };
        let leaving_id = leaving.id;
        hub.subscribe(BoxSubscriber::new(healthy.clone()));
        hub.subscribe(BoxSubscriber::new(leaving));

        let report = hub.broadcast("tick").await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
        assert!(!hub.contains(leaving_id));
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn debug_impl() {
        let hub = BroadcastHub::default();
        let debug = format!("{hub:?}");
        assert!(debug.contains("BroadcastHub"));
        assert!(debug.contains("subscribers"));
    }
}
