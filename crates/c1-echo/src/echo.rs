//! The echo example handler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use valawai_component::schema::{FieldKind, FieldSpec, Payload, PayloadSchema};
use valawai_component::{ComponentName, HandlerError, PayloadHandler, Topic};

/// Topic the echo handler listens on.
pub const RECEIVED_MESSAGE_ACTION: &str = "received_message";
/// Topic the echoed messages are published on.
pub const PUBLISH_MESSAGE_ACTION: &str = "publish_message";

static ECHO_SCHEMA: PayloadSchema = PayloadSchema::new(
    "echo",
    &[FieldSpec::required("content", FieldKind::String).non_empty()],
);

/// A message to echo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoPayload {
    pub content: String,
}

impl Payload for EchoPayload {
    fn schema() -> &'static PayloadSchema {
        &ECHO_SCHEMA
    }
}

/// Returns the received content unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl PayloadHandler for EchoHandler {
    type Payload = EchoPayload;

    fn name(&self) -> &str {
        ECHO_SCHEMA.name
    }

    async fn handle(&self, payload: EchoPayload) -> Result<Option<Value>, HandlerError> {
        Ok(Some(json!({ "content": payload.content })))
    }
}

pub fn received_message_topic(name: &ComponentName) -> Topic {
    Topic::data(name, RECEIVED_MESSAGE_ACTION)
}

pub fn publish_message_topic(name: &ComponentName) -> Topic {
    Topic::data(name, PUBLISH_MESSAGE_ACTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use valawai_component::ValidationError;

    #[test]
    fn test_payload_accepts_content_and_ignores_extra_fields() {
        let payload = EchoPayload::from_value(json!({"content": "hi", "lang": "en"})).unwrap();
        assert_eq!(payload.content, "hi");
    }

    #[test]
    fn test_payload_requires_content() {
        assert!(matches!(
            EchoPayload::from_value(json!({})),
            Err(ValidationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_payload_rejects_empty_content() {
        assert!(matches!(
            EchoPayload::from_value(json!({"content": ""})),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn test_payload_rejects_non_string_content() {
        assert!(matches!(
            EchoPayload::from_value(json!({"content": 12})),
            Err(ValidationError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn test_handler_echoes_content() {
        let result = EchoHandler
            .handle(EchoPayload {
                content: "abc-123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(result, Some(json!({"content": "abc-123"})));
    }

    #[test]
    fn test_topics() {
        let name = ComponentName::new("c1_echo_example_with_rust").unwrap();
        assert_eq!(
            received_message_topic(&name).as_str(),
            "valawai/c1/echo_example_with_rust/data/received_message"
        );
        assert_eq!(
            publish_message_topic(&name).as_str(),
            "valawai/c1/echo_example_with_rust/data/publish_message"
        );
    }
}
