//! Payload schema validation.
//!
//! Every payload exchanged on a data topic is described by a static
//! [`PayloadSchema`]: a list of named fields, each with a kind, a required
//! flag and an optional non-empty constraint. A received JSON value is checked
//! against the schema before it is deserialized into its Rust type.
//!
//! Unknown fields are accepted and ignored so that newer peers can add fields
//! without breaking older components.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Errors produced by payload validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("field '{field}' is required")]
    MissingField { field: String },

    #[error("field '{field}' must be {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("field '{field}' must not be empty")]
    EmptyField { field: String },

    #[error("payload does not match its type: {0}")]
    Deserialize(String),
}

/// JSON type a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Bool,
    Object,
    Array,
    /// Any JSON value, including `null`
    Any,
}

impl FieldKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::Any => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "a string",
            FieldKind::Number => "a number",
            FieldKind::Integer => "an integer",
            FieldKind::Bool => "a boolean",
            FieldKind::Object => "an object",
            FieldKind::Array => "an array",
            FieldKind::Any => "any value",
        }
    }
}

/// One field of a payload schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub non_empty: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            non_empty: false,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            non_empty: false,
        }
    }

    /// Reject empty strings, arrays and objects for this field.
    pub const fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    fn check(&self, payload: &serde_json::Map<String, Value>) -> Result<(), ValidationError> {
        let value = match payload.get(self.name) {
            None => None,
            Some(Value::Null) if self.kind != FieldKind::Any => None,
            Some(value) => Some(value),
        };

        let Some(value) = value else {
            if self.required {
                return Err(ValidationError::MissingField {
                    field: self.name.to_string(),
                });
            }
            return Ok(());
        };

        if !self.kind.matches(value) {
            return Err(ValidationError::WrongType {
                field: self.name.to_string(),
                expected: self.kind.as_str(),
            });
        }

        if self.non_empty && is_empty(value) {
            return Err(ValidationError::EmptyField {
                field: self.name.to_string(),
            });
        }

        Ok(())
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Static description of a payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSchema {
    /// Short name used in log messages (e.g. "echo")
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl PayloadSchema {
    pub const fn new(name: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { name, fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate `value` against the schema.
    ///
    /// Fields are checked in declaration order; the first failure is returned.
    ///
    /// # Errors
    ///
    /// - `ValidationError::NotAnObject`: `value` is not a JSON object.
    /// - `ValidationError::MissingField`: a required field is absent or `null`.
    /// - `ValidationError::WrongType`: a present field has the wrong JSON type.
    /// - `ValidationError::EmptyField`: a `non_empty` field is empty.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let payload = value.as_object().ok_or(ValidationError::NotAnObject)?;
        for field in self.fields {
            field.check(payload)?;
        }
        Ok(())
    }
}

/// A typed payload bound to its schema.
pub trait Payload: DeserializeOwned + Serialize + Send + 'static {
    fn schema() -> &'static PayloadSchema;

    /// Validate `value` against [`Payload::schema`] and deserialize it.
    fn from_value(value: Value) -> Result<Self, ValidationError> {
        Self::schema().validate(&value)?;
        serde_json::from_value(value).map_err(|e| ValidationError::Deserialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    static NOTE_SCHEMA: PayloadSchema = PayloadSchema::new(
        "note",
        &[
            FieldSpec::required("title", FieldKind::String).non_empty(),
            FieldSpec::optional("tags", FieldKind::Array),
            FieldSpec::optional("priority", FieldKind::Integer),
        ],
    );

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        title: String,
        #[serde(default)]
        tags: Vec<String>,
        priority: Option<i64>,
    }

    impl Payload for Note {
        fn schema() -> &'static PayloadSchema {
            &NOTE_SCHEMA
        }
    }

    #[test]
    fn test_valid_payload_passes() {
        assert!(NOTE_SCHEMA.validate(&json!({"title": "a"})).is_ok());
    }

    #[test]
    fn test_missing_required_field_fails() {
        assert_eq!(
            NOTE_SCHEMA.validate(&json!({})),
            Err(ValidationError::MissingField {
                field: "title".to_string()
            })
        );
    }

    #[test]
    fn test_null_required_field_is_missing() {
        assert!(matches!(
            NOTE_SCHEMA.validate(&json!({"title": null})),
            Err(ValidationError::MissingField { .. })
        ));
    }

    #[test]
    fn test_empty_string_fails_non_empty() {
        assert_eq!(
            NOTE_SCHEMA.validate(&json!({"title": ""})),
            Err(ValidationError::EmptyField {
                field: "title".to_string()
            })
        );
    }

    #[test]
    fn test_wrong_type_fails() {
        assert!(matches!(
            NOTE_SCHEMA.validate(&json!({"title": 7})),
            Err(ValidationError::WrongType { expected: "a string", .. })
        ));
        assert!(matches!(
            NOTE_SCHEMA.validate(&json!({"title": "a", "priority": 1.5})),
            Err(ValidationError::WrongType { .. })
        ));
    }

    #[test]
    fn test_optional_null_is_accepted() {
        assert!(NOTE_SCHEMA
            .validate(&json!({"title": "a", "priority": null}))
            .is_ok());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let note = Note::from_value(json!({"title": "a", "from_the_future": true})).unwrap();
        assert_eq!(note.title, "a");
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(
            NOTE_SCHEMA.validate(&json!(["title"])),
            Err(ValidationError::NotAnObject)
        );
    }

    #[test]
    fn test_deserialize_mismatch_reported() {
        // The schema only says "array"; the Rust type wants strings inside.
        let err = Note::from_value(json!({"title": "a", "tags": [1]})).unwrap_err();
        assert!(matches!(err, ValidationError::Deserialize(_)));
    }
}
