//! valawai-component: Lifecycle and messaging protocol for VALAWAI components
//!
//! Every component of the fleet honours the same contract with the Master Of
//! VALAWAI (MOV): it announces itself, listens on its own well-known topics,
//! validates the payloads it receives, forwards its logs and leaves cleanly on
//! shutdown. This crate implements that contract over any
//! [`valawai_channel::MessageChannel`].
//!
//! ## Layer 1 - Protocol
//!
//! Focus: registration handshake, topic naming, payload validation and the
//! dispatch contract shared by every handler.
//!
//! ## Key Components
//!
//! - `LifecycleCoordinator`: register / acknowledge / log / unregister
//! - `HandlerRegistry`: binds input topics to `PayloadHandler`s
//! - `PayloadSchema`: field-level validation of inbound JSON
//! - `IdentityStore`: local record of the MOV-assigned identifier
//! - `telemetry::init_tracing`: console + rolling file subscriber

pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod log_entry;
pub mod obs;
pub mod schema;
pub mod telemetry;
pub mod topic;

pub use config::{ComponentConfig, LogConfig, LogRotation};
pub use descriptor::{derive_component_name, ComponentDescriptor, ComponentName, ComponentType};
pub use dispatch::{Binding, Dispatcher, HandlerRegistry, PayloadHandler};
pub use error::{DispatchError, HandlerError, MovError, Result};
pub use identity::{IdentityStore, RegistrationRecord};
pub use lifecycle::{LifecycleCoordinator, RegistrationState};
pub use log_entry::{sanitize_message, LogEntry, LogLevel};
pub use obs::component_span;
pub use schema::{FieldKind, FieldSpec, Payload, PayloadSchema, ValidationError};
pub use topic::{Topic, TopicCategory, LOG_ADD_TOPIC, REGISTER_TOPIC, UNREGISTER_TOPIC};
