//! Registration handshake with the MOV and log forwarding.
//!
//! A component moves through three states:
//!
//! ```text
//! Unregistered --register_component--> AwaitingAck --ack--> Registered
//!      ^                                    |                    |
//!      +--------- unregister_component -----+--------------------+
//! ```
//!
//! The state lives in a `watch` cell owned by the [`LifecycleCoordinator`].
//! Only the acknowledgement handler and `unregister_component` write it; log
//! forwarding, accessors and waiters read it.
//!
//! Persistence of the identity record is best effort: I/O failures are logged
//! and never change the broker-visible outcome.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use valawai_channel::{DeliveryHandler, MessageChannel};

use crate::descriptor::{ComponentDescriptor, ComponentName};
use crate::error::{MovError, Result};
use crate::identity::{IdentityStore, RegistrationRecord};
use crate::log_entry::{LogEntry, LogLevel};
use crate::obs;
use crate::topic::{Topic, LOG_ADD_TOPIC, REGISTER_TOPIC, UNREGISTER_TOPIC};

/// Where the component stands with the MOV.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegistrationState {
    #[default]
    Unregistered,
    AwaitingAck,
    Registered {
        component_id: String,
    },
}

impl RegistrationState {
    pub fn component_id(&self) -> Option<&str> {
        match self {
            RegistrationState::Registered { component_id } => Some(component_id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Unregistered => "unregistered",
            RegistrationState::AwaitingAck => "awaiting_ack",
            RegistrationState::Registered { .. } => "registered",
        }
    }
}

/// Drives registration, unregistration and log forwarding over a
/// [`MessageChannel`].
///
/// Built behind an `Arc` because the acknowledgement subscription holds a weak
/// reference back to the coordinator.
pub struct LifecycleCoordinator {
    channel: Arc<dyn MessageChannel>,
    identity: IdentityStore,
    state: watch::Sender<RegistrationState>,
    name: OnceLock<ComponentName>,
}

impl LifecycleCoordinator {
    pub fn new(channel: Arc<dyn MessageChannel>, identity: IdentityStore) -> Arc<Self> {
        let (state, _) = watch::channel(RegistrationState::Unregistered);
        Arc::new(Self {
            channel,
            identity,
            state,
            name: OnceLock::new(),
        })
    }

    pub fn channel(&self) -> &Arc<dyn MessageChannel> {
        &self.channel
    }

    pub fn identity(&self) -> &IdentityStore {
        &self.identity
    }

    /// Name given to `listen_for_registration_ack`, if it was called.
    pub fn component_name(&self) -> Option<&ComponentName> {
        self.name.get()
    }

    pub fn state(&self) -> RegistrationState {
        self.state.borrow().clone()
    }

    pub fn component_id(&self) -> Option<String> {
        self.state.borrow().component_id().map(str::to_string)
    }

    pub fn is_registered(&self) -> bool {
        matches!(*self.state.borrow(), RegistrationState::Registered { .. })
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state.subscribe()
    }

    /// Subscribe the acknowledgement handler to
    /// `valawai/<level>/<name>/control/registered`.
    ///
    /// Must happen before `register_component`, otherwise an immediate
    /// acknowledgement could be missed.
    pub async fn listen_for_registration_ack(self: &Arc<Self>, name: &ComponentName) -> Result<()> {
        let topic = Topic::registered(name);
        let handler = Arc::new(RegistrationAckHandler {
            coordinator: Arc::downgrade(self),
        });
        self.channel.listen_for(topic.as_str(), handler).await?;

        if self.name.set(name.clone()).is_err() {
            warn!(name = %name, "registration acknowledgement listener bound twice");
        }
        debug!(topic = %topic, "listening for registration acknowledgement");
        Ok(())
    }

    /// Publish the registration request and move to `AwaitingAck`.
    ///
    /// Does not wait for the acknowledgement; see `wait_until_registered`.
    ///
    /// # Errors
    ///
    /// Returns the channel error if the request could not be published. The
    /// previous state is restored in that case.
    pub async fn register_component(&self, descriptor: &ComponentDescriptor) -> Result<()> {
        if self.name.get().is_none() {
            warn!(
                name = %descriptor.name(),
                "registering before listening for the acknowledgement, an immediate ack could be missed"
            );
        }

        // The ack may be handled before publish_to returns.
        let previous = self.state.send_replace(RegistrationState::AwaitingAck);
        if let Err(err) = self
            .channel
            .publish_to(REGISTER_TOPIC, &descriptor.register_payload())
            .await
        {
            self.state.send_if_modified(|state| {
                if *state == RegistrationState::AwaitingAck {
                    *state = previous;
                    true
                } else {
                    false
                }
            });
            return Err(err.into());
        }

        obs::emit_registration_requested(descriptor.name().as_str(), descriptor.version());
        Ok(())
    }

    /// Handle a body received on the `control/registered` topic.
    ///
    /// Returns the accepted component id. Every failure is also logged here,
    /// so the delivery handler can ignore the result.
    ///
    /// # Errors
    ///
    /// `MovError::ProtocolViolation` when the body is not an object with a
    /// string `id`, or when no registration was requested. The state is left
    /// unchanged.
    pub async fn on_registration_ack(&self, body: &[u8]) -> Result<String> {
        debug!(body = %String::from_utf8_lossy(body), "received registration acknowledgement");

        if *self.state.borrow() == RegistrationState::Unregistered {
            let err = MovError::ProtocolViolation(
                "registration acknowledged but no registration is pending".to_string(),
            );
            warn!(error = %err, "ignoring registration acknowledgement");
            return Err(err);
        }

        let record = match RegistrationRecord::from_ack(body) {
            Ok(record) => record,
            Err(err) => {
                error!(error = %err, "ignoring malformed registration acknowledgement");
                return Err(err);
            }
        };

        let component_id = record.id.clone();
        let previous = self.state.send_replace(RegistrationState::Registered {
            component_id: component_id.clone(),
        });
        if let Some(old) = previous.component_id() {
            if old != component_id {
                warn!(old = %old, new = %component_id, "MOV assigned a new component identifier");
            }
        }

        if let Err(err) = self.identity.save(&record) {
            error!(
                error = %err,
                path = %self.identity.path().display(),
                "could not store the component id"
            );
        }

        let name = self.name.get().map(ComponentName::as_str).unwrap_or("component");
        obs::emit_registered(name, &component_id);
        info!("Registered {name} with the identifier '{component_id}'");
        Ok(component_id)
    }

    /// Forward a log entry to the MOV and emit it locally.
    ///
    /// Never fails: publish errors are only visible in the local log.
    pub async fn log(&self, level: LogLevel, message: &str, payload: Option<&Value>) {
        // Only the MOV copy is sanitized.
        match level {
            LogLevel::Debug => debug!("{message}"),
            LogLevel::Info => info!("{message}"),
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }

        let entry = LogEntry::new(level, message, payload).with_component_id(self.component_id());
        let body = match serde_json::to_value(&entry) {
            Ok(body) => body,
            Err(err) => {
                obs::emit_log_forward_failed(level.as_str(), &err);
                return;
            }
        };
        if let Err(err) = self.channel.publish_to(LOG_ADD_TOPIC, &body).await {
            obs::emit_log_forward_failed(level.as_str(), &err);
        }
    }

    pub async fn debug(&self, message: &str, payload: Option<&Value>) {
        self.log(LogLevel::Debug, message, payload).await
    }

    pub async fn info(&self, message: &str, payload: Option<&Value>) {
        self.log(LogLevel::Info, message, payload).await
    }

    pub async fn warn(&self, message: &str, payload: Option<&Value>) {
        self.log(LogLevel::Warn, message, payload).await
    }

    pub async fn error(&self, message: &str, payload: Option<&Value>) {
        self.log(LogLevel::Error, message, payload).await
    }

    /// Leave the MOV.
    ///
    /// Removes the identity record, publishes `{component_id}` when
    /// registered, then returns to `Unregistered`. Idempotent: when not
    /// registered nothing is published.
    pub async fn unregister_component(&self) {
        match self.identity.remove() {
            Ok(true) => debug!(path = %self.identity.path().display(), "removed component id file"),
            Ok(false) => {}
            Err(err) => error!(
                error = %err,
                path = %self.identity.path().display(),
                "could not remove the component id file"
            ),
        }

        let current = self.state();
        match &current {
            RegistrationState::Registered { component_id } => {
                let body = json!({ "component_id": component_id });
                if let Err(err) = self.channel.publish_to(UNREGISTER_TOPIC, &body).await {
                    warn!(error = %err, component_id = %component_id, "could not publish unregistration");
                }
                let name = self.name.get().map(ComponentName::as_str).unwrap_or("component");
                obs::emit_unregistered(name, component_id);
                info!("Unregistered {name} with the identifier '{component_id}'");
            }
            RegistrationState::AwaitingAck => {
                debug!("registration abandoned before acknowledgement");
            }
            RegistrationState::Unregistered => return,
        }

        self.state.send_replace(RegistrationState::Unregistered);
    }

    /// Unregister, then close the channel.
    pub async fn shutdown(&self) -> Result<()> {
        self.unregister_component().await;
        self.channel.close().await?;
        Ok(())
    }

    /// Wait for the MOV acknowledgement for at most `timeout`.
    ///
    /// # Errors
    ///
    /// `MovError::RegistrationTimeout` when no acknowledgement arrived in time.
    pub async fn wait_until_registered(&self, timeout: Duration) -> Result<String> {
        let mut rx = self.state.subscribe();
        let wait = async {
            rx.wait_for(|state| matches!(state, RegistrationState::Registered { .. }))
                .await
                .ok()
                .and_then(|state| state.component_id().map(str::to_string))
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(Some(component_id)) => Ok(component_id),
            _ => Err(MovError::RegistrationTimeout(timeout)),
        }
    }
}

/// Subscription on `control/registered`.
struct RegistrationAckHandler {
    coordinator: Weak<LifecycleCoordinator>,
}

#[async_trait]
impl DeliveryHandler for RegistrationAckHandler {
    async fn handle(&self, topic: &str, body: &[u8]) {
        let Some(coordinator) = self.coordinator.upgrade() else {
            obs::emit_delivery_dropped(topic, &"lifecycle coordinator dropped");
            return;
        };
        // Failures are logged by on_registration_ack.
        let _ = coordinator.on_registration_ack(body).await;
    }
}
