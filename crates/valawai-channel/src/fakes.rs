//! In-memory broker (testing only)
//!
//! Provides `MemoryChannel`, a `MessageChannel` that satisfies the trait
//! contract without a running broker. Every published payload is recorded so
//! tests can assert on what a component sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;

use crate::consumer::{ConsumerLoop, Delivery};
use crate::error::{ChannelError, ChannelResult};
use crate::traits::{DeliveryHandler, MessageChannel};

/// A payload recorded by [`MemoryChannel::publish_to`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Value,
}

/// In-process broker backed by the shared [`ConsumerLoop`].
///
/// A published payload is delivered only if a consumer is bound to its topic
/// at publish time; it is recorded either way.
#[derive(Default)]
pub struct MemoryChannel {
    consumer: ConsumerLoop,
    published: RwLock<Vec<PublishedMessage>>,
    notify: Notify,
    closed: AtomicBool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for tests that need an `Arc<dyn MessageChannel>` and the
    /// concrete type at the same time.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Every payload published so far, in publish order.
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.read().await.clone()
    }

    /// Payloads published on `topic`, in publish order.
    pub async fn published_on(&self, topic: &str) -> Vec<Value> {
        self.published
            .read()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Wait until at least `count` payloads were published on `topic` or
    /// `timeout` elapses, then return what was published on it.
    pub async fn wait_for_published(
        &self,
        topic: &str,
        count: usize,
        timeout: Duration,
    ) -> Vec<Value> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let messages = self.published_on(topic).await;
            if messages.len() >= count {
                return messages;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.published_on(topic).await;
            }
        }
    }

    /// Simulate a message arriving from another fleet member.
    pub async fn inject(&self, topic: &str, body: impl Into<Vec<u8>>) -> ChannelResult<()> {
        self.consumer.enqueue(Delivery::new(topic, body))
    }

    /// Simulate losing the broker: the running consumer loop stops with
    /// `ChannelError::Connection`. Publishing to topics without a consumer
    /// keeps working.
    pub fn disconnect(&self, reason: &str) {
        self.consumer.fail(reason);
    }

    /// Forget every recorded payload.
    pub async fn clear_published(&self) {
        self.published.write().await.clear();
    }

    pub async fn subscribed_topics(&self) -> Vec<String> {
        self.consumer.topics().await
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn listen_for(
        &self,
        topic: &str,
        handler: Arc<dyn DeliveryHandler>,
    ) -> ChannelResult<()> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.consumer.subscribe(topic, handler).await
    }

    async fn publish_to(&self, topic: &str, payload: &Value) -> ChannelResult<()> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let body = serde_json::to_vec(payload)?;
        self.published.write().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.clone(),
        });
        self.notify.notify_waiters();

        if self.consumer.is_subscribed(topic).await {
            self.consumer.enqueue(Delivery::new(topic, body))?;
        }
        Ok(())
    }

    async fn start_consuming(&self) -> ChannelResult<()> {
        self.consumer.run().await
    }

    async fn close(&self) -> ChannelResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.consumer.shutdown();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
