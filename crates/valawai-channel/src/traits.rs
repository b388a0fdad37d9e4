//! Channel trait definitions
//!
//! These traits define the only capabilities a VALAWAI component needs from
//! the broker:
//! - `MessageChannel`: subscribe a handler to a topic, publish JSON to a topic
//! - `DeliveryHandler`: consume the raw bytes delivered on a topic
//!
//! Connection management, acknowledgement and channel multiplexing stay
//! behind the trait. An in-memory broker is provided for testing via the
//! `fakes` module.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ChannelResult;

/// Consumer of the messages delivered on one topic.
///
/// Handlers never fail towards the channel: every error must be handled
/// (logged, forwarded) inside `handle` so the consumer loop keeps running.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Process one delivery.
    async fn handle(&self, topic: &str, body: &[u8]);
}

/// Publish/subscribe capability over named topics.
///
/// Guarantees:
/// - A topic has at most one consumer per process; a second `listen_for`
///   on the same topic fails with `ChannelError::DuplicateSubscription`.
/// - Deliveries are handed to handlers one at a time by a single loop.
/// - After `close()` publishing fails with `ChannelError::Closed`.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Bind `handler` as the exclusive consumer of `topic`.
    async fn listen_for(&self, topic: &str, handler: Arc<dyn DeliveryHandler>)
        -> ChannelResult<()>;

    /// Publish a JSON payload to `topic`. Does not wait for any consumer.
    async fn publish_to(&self, topic: &str, payload: &Value) -> ChannelResult<()>;

    /// Run the consumer loop until `close()` is called.
    async fn start_consuming(&self) -> ChannelResult<()>;

    /// Stop the consumer loop and release the broker connection. No-op if
    /// already closed.
    async fn close(&self) -> ChannelResult<()>;

    /// Whether `close()` has been called.
    fn is_closed(&self) -> bool;
}

/// Adapter turning a closure into a [`DeliveryHandler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> DeliveryHandler for FnHandler<F>
where
    F: Fn(&str, &[u8]) + Send + Sync,
{
    async fn handle(&self, topic: &str, body: &[u8]) {
        (self.f)(topic, body)
    }
}

/// Wrap a synchronous closure as a shareable delivery handler.
///
/// ```rust,ignore
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// channel
///     .listen_for("valawai/c1/echo/data/publish_message", handler_fn(move |_, body| {
///         sink.lock().unwrap().push(body.to_vec());
///     }))
///     .await?;
/// ```
pub fn handler_fn<F>(f: F) -> Arc<dyn DeliveryHandler>
where
    F: Fn(&str, &[u8]) + Send + Sync + 'static,
{
    Arc::new(FnHandler { f })
}
