//! Single consumer loop shared by every channel implementation.
//!
//! Transports push [`Delivery`] values into the loop's queue; the loop hands
//! them, one at a time and in arrival order, to the handler bound to the
//! delivery's topic. Deliveries for topics without a handler are dropped.
//!
//! A transport that loses a subscription reports it through
//! [`ConsumerLoop::failure_sender`]; the loop then stops with
//! `ChannelError::Connection`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, error, info};

use crate::error::{ChannelError, ChannelResult};
use crate::traits::DeliveryHandler;

/// A message received on a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub body: Vec<u8>,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            body: body.into(),
        }
    }
}

/// Subscription table + delivery queue + failure queue + shutdown signal.
pub struct ConsumerLoop {
    handlers: RwLock<HashMap<String, Arc<dyn DeliveryHandler>>>,
    sender: mpsc::UnboundedSender<Delivery>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Delivery>>>,
    failures: mpsc::UnboundedSender<String>,
    failure_receiver: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    shutdown: watch::Sender<bool>,
}

impl Default for ConsumerLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsumerLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (failures, failure_receiver) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            handlers: RwLock::new(HashMap::new()),
            sender,
            receiver: Mutex::new(Some(receiver)),
            failures,
            failure_receiver: Mutex::new(Some(failure_receiver)),
            shutdown,
        }
    }

    /// Register the exclusive handler of `topic`.
    pub async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn DeliveryHandler>,
    ) -> ChannelResult<()> {
        if self.is_shut_down() {
            return Err(ChannelError::Closed);
        }
        let mut handlers = self.handlers.write().await;
        if handlers.contains_key(topic) {
            return Err(ChannelError::DuplicateSubscription {
                topic: topic.to_string(),
            });
        }
        handlers.insert(topic.to_string(), handler);
        debug!(topic = %topic, "consumer bound");
        Ok(())
    }

    /// Remove the handler of `topic`. Used to roll back a failed transport
    /// subscription.
    pub async fn unsubscribe(&self, topic: &str) -> bool {
        self.handlers.write().await.remove(topic).is_some()
    }

    pub async fn is_subscribed(&self, topic: &str) -> bool {
        self.handlers.read().await.contains_key(topic)
    }

    /// Topics with a bound handler, sorted.
    pub async fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.handlers.read().await.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Queue a delivery for the loop.
    pub fn enqueue(&self, delivery: Delivery) -> ChannelResult<()> {
        if self.is_shut_down() {
            return Err(ChannelError::Closed);
        }
        self.sender.send(delivery).map_err(|_| ChannelError::Closed)
    }

    /// Sender side of the delivery queue, for transport forwarding tasks.
    pub fn sender(&self) -> mpsc::UnboundedSender<Delivery> {
        self.sender.clone()
    }

    /// Sender for fatal transport failures. The first reason received stops
    /// the loop.
    pub fn failure_sender(&self) -> mpsc::UnboundedSender<String> {
        self.failures.clone()
    }

    /// Report a fatal transport failure.
    pub fn fail(&self, reason: impl Into<String>) {
        // Only fails once the loop is gone, when nobody is left to stop.
        let _ = self.failures.send(reason.into());
    }

    /// Receiver that flips to `true` once the loop is shut down.
    pub fn shutdown_watch(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Signal the loop to stop after the delivery in progress.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run until [`ConsumerLoop::shutdown`] is called.
    ///
    /// Can only be started once; a second call fails with
    /// `ChannelError::AlreadyConsuming`.
    ///
    /// # Errors
    ///
    /// `ChannelError::Connection` when a transport failure was reported. The
    /// loop is shut down before returning.
    pub async fn run(&self) -> ChannelResult<()> {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or(ChannelError::AlreadyConsuming)?;
        let mut failures = self
            .failure_receiver
            .lock()
            .await
            .take()
            .ok_or(ChannelError::AlreadyConsuming)?;
        let mut shutdown = self.shutdown.subscribe();

        info!("consumer loop started");
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(reason) = failures.recv() => {
                    error!(reason = %reason, "consumer loop failed");
                    self.shutdown();
                    return Err(ChannelError::Connection(reason));
                }
                delivery = receiver.recv() => match delivery {
                    Some(delivery) => self.dispatch(delivery).await,
                    None => break,
                }
            }
        }
        info!("consumer loop stopped");
        Ok(())
    }

    async fn dispatch(&self, delivery: Delivery) {
        let handler = self.handlers.read().await.get(&delivery.topic).cloned();
        match handler {
            Some(handler) => handler.handle(&delivery.topic, &delivery.body).await,
            None => debug!(topic = %delivery.topic, "no consumer bound, delivery dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::handler_fn;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[tokio::test]
    async fn duplicate_subscribe_is_rejected() {
        let consumer = ConsumerLoop::new();
        consumer
            .subscribe("valawai/c1/a/data/x", handler_fn(|_, _| {}))
            .await
            .unwrap();
        let err = consumer
            .subscribe("valawai/c1/a/data/x", handler_fn(|_, _| {}))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::DuplicateSubscription { .. }));
    }

    #[tokio::test]
    async fn deliveries_reach_handler_in_order() {
        let consumer = Arc::new(ConsumerLoop::new());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        consumer
            .subscribe(
                "t",
                handler_fn(move |_, body| sink.lock().unwrap().push(body.to_vec())),
            )
            .await
            .unwrap();

        consumer.enqueue(Delivery::new("t", b"1".to_vec())).unwrap();
        consumer.enqueue(Delivery::new("t", b"2".to_vec())).unwrap();
        consumer.enqueue(Delivery::new("other", b"3".to_vec())).unwrap();

        let runner = consumer.clone();
        let task = tokio::spawn(async move { runner.run().await });

        tokio::time::timeout(Duration::from_secs(5), async {
            while seen.lock().unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        consumer.shutdown();
        task.await.unwrap().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[tokio::test]
    async fn run_twice_fails() {
        let consumer = Arc::new(ConsumerLoop::new());
        consumer.shutdown();
        consumer.run().await.unwrap();
        assert!(matches!(
            consumer.run().await,
            Err(ChannelError::AlreadyConsuming)
        ));
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_is_closed() {
        let consumer = ConsumerLoop::new();
        consumer.shutdown();
        assert!(matches!(
            consumer.enqueue(Delivery::new("t", Vec::new())),
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn reported_failure_stops_the_loop() {
        let consumer = Arc::new(ConsumerLoop::new());
        let runner = consumer.clone();
        let task = tokio::spawn(async move { runner.run().await });

        consumer
            .failure_sender()
            .send("consumer cancelled by broker".to_string())
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(ChannelError::Connection(reason)) if reason == "consumer cancelled by broker"
        ));
        assert!(consumer.is_shut_down());
    }
}
