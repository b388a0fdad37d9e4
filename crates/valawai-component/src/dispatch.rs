//! Handler registry and the validate-then-execute dispatch contract.
//!
//! Every inbound delivery goes through the same steps:
//!
//! 1. parse the body as JSON (failures are logged locally and dropped);
//! 2. validate it against the handler's payload schema (failures are
//!    forwarded to the MOV as an ERROR entry carrying the raw payload);
//! 3. forward an INFO entry announcing the message;
//! 4. run the handler;
//! 5. publish its result on the bound output topic, if any.
//!
//! Nothing is raised back to the consumer loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use valawai_channel::{DeliveryHandler, MessageChannel};

use crate::error::{DispatchError, HandlerError, Result};
use crate::lifecycle::LifecycleCoordinator;
use crate::obs;
use crate::schema::Payload;
use crate::topic::Topic;

/// Domain logic bound to an input topic.
#[async_trait]
pub trait PayloadHandler: Send + Sync + 'static {
    type Payload: Payload;

    /// Short name used in forwarded log messages (e.g. "echo").
    fn name(&self) -> &str;

    /// Process a validated payload. `Ok(Some(value))` is published on the
    /// output topic when one is bound.
    async fn handle(&self, payload: Self::Payload) -> std::result::Result<Option<Value>, HandlerError>;
}

/// Delivery handler applying the dispatch contract around a [`PayloadHandler`].
pub struct Dispatcher<H> {
    handler: H,
    output: Option<Topic>,
    channel: Arc<dyn MessageChannel>,
    coordinator: Arc<LifecycleCoordinator>,
}

impl<H: PayloadHandler> Dispatcher<H> {
    pub fn new(
        handler: H,
        output: Option<Topic>,
        channel: Arc<dyn MessageChannel>,
        coordinator: Arc<LifecycleCoordinator>,
    ) -> Self {
        Self {
            handler,
            output,
            channel,
            coordinator,
        }
    }

    /// Run one delivery through the contract.
    ///
    /// Returns the handler's result. Forwarding to the MOV has already
    /// happened when this returns an error.
    pub async fn dispatch(&self, body: &[u8]) -> std::result::Result<Option<Value>, DispatchError> {
        let raw: Value = serde_json::from_slice(body).map_err(DispatchError::MalformedMessage)?;
        let name = self.handler.name();

        let payload = match H::Payload::from_value(raw.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                self.coordinator
                    .error(&format!("Cannot process {name}, because {err}"), Some(&raw))
                    .await;
                return Err(err.into());
            }
        };

        self.coordinator
            .info(&format!("Received a message to {name}"), Some(&raw))
            .await;

        let result = match self.handler.handle(payload).await {
            Ok(result) => result,
            Err(err) => {
                self.coordinator
                    .error(&format!("Cannot process {name}, because {err}"), Some(&raw))
                    .await;
                return Err(err.into());
            }
        };

        if let (Some(result), Some(output)) = (&result, &self.output) {
            match self.channel.publish_to(output.as_str(), result).await {
                Ok(()) => {
                    self.coordinator
                        .info(&format!("Sent {name} result"), Some(result))
                        .await
                }
                Err(err) => warn!(topic = %output, error = %err, "could not publish {name} result"),
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl<H: PayloadHandler> DeliveryHandler for Dispatcher<H> {
    async fn handle(&self, topic: &str, body: &[u8]) {
        match self.dispatch(body).await {
            Ok(_) => {}
            Err(err @ DispatchError::MalformedMessage(_)) => {
                error!(
                    topic = %topic,
                    body = %String::from_utf8_lossy(body),
                    "Unexpected message: {err}"
                );
                obs::emit_delivery_dropped(topic, &err);
            }
            Err(err) => {
                debug!(topic = %topic, error = %err, "message rejected");
            }
        }
    }
}

/// One input topic bound to a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub input: Topic,
    pub output: Option<Topic>,
    pub handler: String,
}

/// Binds inbound topics to payload handlers.
pub struct HandlerRegistry {
    channel: Arc<dyn MessageChannel>,
    coordinator: Arc<LifecycleCoordinator>,
    bindings: RwLock<Vec<Binding>>,
}

impl HandlerRegistry {
    pub fn new(channel: Arc<dyn MessageChannel>, coordinator: Arc<LifecycleCoordinator>) -> Self {
        Self {
            channel,
            coordinator,
            bindings: RwLock::new(Vec::new()),
        }
    }

    /// Make `handler` the exclusive consumer of `input`.
    ///
    /// Results are published on `output` when given.
    ///
    /// # Errors
    ///
    /// `MovError::Channel(ChannelError::DuplicateSubscription)` when `input`
    /// is already bound in this process.
    pub async fn bind<H: PayloadHandler>(
        &self,
        input: Topic,
        output: Option<Topic>,
        handler: H,
    ) -> Result<()> {
        let binding = Binding {
            input: input.clone(),
            output: output.clone(),
            handler: handler.name().to_string(),
        };
        let dispatcher = Dispatcher::new(
            handler,
            output,
            self.channel.clone(),
            self.coordinator.clone(),
        );
        self.channel
            .listen_for(input.as_str(), Arc::new(dispatcher))
            .await?;

        debug!(input = %binding.input, handler = %binding.handler, "bound payload handler");
        self.bindings.write().await.push(binding);
        Ok(())
    }

    pub async fn bindings(&self) -> Vec<Binding> {
        self.bindings.read().await.clone()
    }

    pub async fn bound_topics(&self) -> Vec<Topic> {
        self.bindings
            .read()
            .await
            .iter()
            .map(|b| b.input.clone())
            .collect()
    }
}
