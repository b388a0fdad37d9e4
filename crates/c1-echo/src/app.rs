//! Wiring of the echo component.
//!
//! Startup order matters: the acknowledgement listener and the echo handler
//! are bound before the registration request is published, so neither the
//! MOV acknowledgement nor the first messages can be missed.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn, Instrument, Span};
use valawai_channel::MessageChannel;
use valawai_component::{
    component_span, ComponentConfig, ComponentDescriptor, HandlerRegistry, IdentityStore,
    LifecycleCoordinator,
};

use crate::echo::{publish_message_topic, received_message_topic, EchoHandler};

/// A running echo component.
pub struct App {
    channel: Arc<dyn MessageChannel>,
    coordinator: Arc<LifecycleCoordinator>,
    registry: HandlerRegistry,
    descriptor: ComponentDescriptor,
    span: Span,
}

impl App {
    /// Bind the component's topics on `channel` and register into the MOV.
    pub async fn start(
        channel: Arc<dyn MessageChannel>,
        config: &ComponentConfig,
        version: &str,
        asyncapi_yaml: String,
    ) -> Result<Self> {
        let descriptor = ComponentDescriptor::from_build_metadata(version, asyncapi_yaml)
            .context("Invalid component description")?;
        let span = component_span(descriptor.name().as_str());
        Self::wire(channel, config, descriptor, span.clone())
            .instrument(span)
            .await
    }

    async fn wire(
        channel: Arc<dyn MessageChannel>,
        config: &ComponentConfig,
        descriptor: ComponentDescriptor,
        span: Span,
    ) -> Result<Self> {
        let name = descriptor.name().clone();
        let coordinator =
            LifecycleCoordinator::new(channel.clone(), IdentityStore::from_config(config));
        match coordinator.identity().load() {
            Ok(Some(previous)) => info!(
                component_id = %previous.id,
                "Found the identifier of a previous run, registering again"
            ),
            Ok(None) => debug!("no previous component id record"),
            Err(e) => warn!(error = %e, "could not read the previous component id record"),
        }

        coordinator
            .listen_for_registration_ack(&name)
            .await
            .context("Failed to listen for the registration acknowledgement")?;

        let registry = HandlerRegistry::new(channel.clone(), coordinator.clone());
        registry
            .bind(
                received_message_topic(&name),
                Some(publish_message_topic(&name)),
                EchoHandler,
            )
            .await
            .context("Failed to bind the echo handler")?;
        for binding in registry.bindings().await {
            info!(
                input = %binding.input,
                output = ?binding.output.as_ref().map(|topic| topic.as_str()),
                handler = %binding.handler,
                "handler bound"
            );
        }

        coordinator
            .register_component(&descriptor)
            .await
            .context("Failed to register the component")?;

        Ok(Self {
            channel,
            coordinator,
            registry,
            descriptor,
            span,
        })
    }

    pub fn coordinator(&self) -> &Arc<LifecycleCoordinator> {
        &self.coordinator
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    /// Process deliveries until the channel is closed.
    pub async fn run(&self) -> Result<()> {
        info!(parent: &self.span, name = %self.descriptor.name(), "Started C1 Echo");
        self.channel
            .start_consuming()
            .instrument(self.span.clone())
            .await
            .context("Consumer loop failed")
    }

    /// Unregister from the MOV, then close the channel.
    pub async fn stop(&self) -> Result<()> {
        self.coordinator
            .shutdown()
            .instrument(self.span.clone())
            .await
            .context("Could not stop the component")?;
        info!(parent: &self.span, name = %self.descriptor.name(), "Finished C1 Echo");
        Ok(())
    }

    /// Run until `shutdown` resolves or the consumer loop ends, then stop.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let consumer = self.run();
        tokio::pin!(consumer);

        tokio::select! {
            result = &mut consumer => {
                if let Err(e) = &result {
                    error!(error = %e, "consumer loop stopped unexpectedly");
                }
                if let Err(e) = self.stop().await {
                    warn!(error = %e, "could not stop the component cleanly");
                }
                result
            }
            () = shutdown => {
                self.stop().await?;
                consumer.await
            }
        }
    }
}
