//! valawai-channel: Message Channel for VALAWAI components
//!
//! This crate provides the publish/subscribe capability every VALAWAI
//! component is built on. It hides the broker behind two small traits so the
//! component protocol never touches connection, acknowledgement or queue
//! mechanics.
//!
//! ## Layer 0 - Transport
//!
//! Focus: delivering JSON payloads to named topics and handing received
//! bytes to exactly one handler per topic, on a single consumer loop.
//!
//! ## Key Components
//!
//! - `MessageChannel`: `listen_for` / `publish_to` / `start_consuming` / `close`
//! - `ConsumerLoop`: subscription table and sequential delivery loop
//! - `AmqpChannel`: RabbitMQ implementation (`lapin`)
//! - `fakes::MemoryChannel`: in-process broker for tests

pub mod amqp;
mod consumer;
mod error;
pub mod fakes;
pub mod traits;

pub use amqp::{AmqpChannel, AmqpConfig};
pub use consumer::{ConsumerLoop, Delivery};
pub use error::{ChannelError, ChannelResult};
pub use traits::{handler_fn, DeliveryHandler, FnHandler, MessageChannel};
