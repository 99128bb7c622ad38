//! Subscriber port and its object-safe wrapper.
//!
//! `Subscriber` is what the hub delivers to. Transport adapters (the axum
//! WebSocket adapter in flowcast-api, test fixtures here) implement it.
//!
//! `Subscriber` uses RPITIT for `send`, so it cannot be a trait object
//! directly. `BoxSubscriber` follows the usual blanket-impl pattern:
//! 1. Define an object-safe `SubscriberDyn` trait with boxed futures
//! 2. Blanket-impl `SubscriberDyn` for all `T: Subscriber`
//! 3. `BoxSubscriber` wraps `Arc<dyn SubscriberDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use flowcast_types::connection::ConnectionId;
use flowcast_types::error::DeliveryError;

/// One live connection that can receive text payloads.
pub trait Subscriber: Send + Sync {
    /// Stable identity of this connection.
    fn id(&self) -> ConnectionId;

    /// Deliver one payload. An error means the connection is dead.
    fn send(
        &self,
        payload: Arc<str>,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Ask the transport to shut the connection down. Must not fail.
    fn close(&self);
}

/// Object-safe version of [`Subscriber`] with boxed futures.
pub trait SubscriberDyn: Send + Sync {
    fn id(&self) -> ConnectionId;

    fn send_boxed(
        &self,
        payload: Arc<str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + '_>>;

    fn close(&self);
}

impl<T: Subscriber> SubscriberDyn for T {
    fn id(&self) -> ConnectionId {
        Subscriber::id(self)
    }

    fn send_boxed(
        &self,
        payload: Arc<str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeliveryError>> + Send + '_>> {
        Box::pin(self.send(payload))
    }

    fn close(&self) {
        Subscriber::close(self)
    }
}

/// Type-erased, cheaply cloneable subscriber handle.
#[derive(Clone)]
pub struct BoxSubscriber {
    inner: Arc<dyn SubscriberDyn>,
}

impl BoxSubscriber {
    pub fn new<T: Subscriber + 'static>(subscriber: T) -> Self {
        Self {
            inner: Arc::new(subscriber),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    pub async fn send(&self, payload: Arc<str>) -> Result<(), DeliveryError> {
        self.inner.send_boxed(payload).await
    }

    pub fn close(&self) {
        self.inner.close()
    }
}

impl std::fmt::Debug for BoxSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxSubscriber")
            .field("id", &self.id())
            .finish()
    }
}
