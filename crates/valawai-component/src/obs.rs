//! Structured observability hooks for the component lifecycle.
//!
//! This module provides:
//! - The component-scoped span attached to every lifecycle future
//! - Emission functions for lifecycle events: registration requested,
//!   registered, unregistered, log forwarding failure, dropped delivery
//!
//! These events go to the local tracing subscriber only. Entries meant for the
//! MOV are published by `LifecycleCoordinator::log`.

use tracing::{info, warn};

/// Span tagged with the component name.
///
/// Attach it to futures with `tracing::Instrument` so every event they emit
/// carries `component = <name>`.
pub fn component_span(component: &str) -> tracing::Span {
    tracing::info_span!("valawai.component", component = %component)
}

/// Emit event: registration published, waiting for the MOV.
pub fn emit_registration_requested(name: &str, version: &str) {
    info!(event = "component.registration_requested", name = %name, version = %version);
}

/// Emit event: the MOV acknowledged the registration.
pub fn emit_registered(name: &str, component_id: &str) {
    info!(event = "component.registered", name = %name, component_id = %component_id);
}

/// Emit event: the component left the MOV.
pub fn emit_unregistered(name: &str, component_id: &str) {
    info!(event = "component.unregistered", name = %name, component_id = %component_id);
}

/// Emit event: a log entry could not be published to the MOV (warning level).
pub fn emit_log_forward_failed(level: &str, error: &dyn std::fmt::Display) {
    warn!(event = "log.forward_failed", level = %level, error = %error);
}

/// Emit event: a delivery was dropped without reaching a handler (warning level).
pub fn emit_delivery_dropped(topic: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "delivery.dropped", topic = %topic, reason = %reason);
}
