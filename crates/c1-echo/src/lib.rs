//! C1 Echo: a VALAWAI component that echoes the messages it receives.
//!
//! Messages published on `valawai/c1/echo_example_with_rust/data/received_message`
//! are validated and republished unchanged on
//! `valawai/c1/echo_example_with_rust/data/publish_message`.

pub mod app;
pub mod cli;
pub mod echo;

pub use app::App;
pub use cli::{Cli, DEFAULT_ASYNCAPI_YAML};
pub use echo::{EchoHandler, EchoPayload};
