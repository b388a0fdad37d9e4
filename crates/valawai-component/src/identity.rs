//! Persisted registration record.
//!
//! The last acknowledgement received from the MOV is kept in
//! `<log_dir>/<component_id_file_name>` so operators can see which identifier
//! the running component holds. The file is informative only: it is written on
//! every acknowledgement, removed on unregistration, and never used to skip
//! registration.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::config::ComponentConfig;
use crate::error::{MovError, Result};

/// A registration acknowledgement: at least an `id`, plus whatever else the
/// MOV chose to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub id: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RegistrationRecord {
    /// Parse an acknowledgement body.
    ///
    /// # Errors
    ///
    /// `MovError::ProtocolViolation` unless the body is a JSON object with a
    /// non-empty string `id`.
    pub fn from_ack(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| MovError::ProtocolViolation(format!("ack is not JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(MovError::ProtocolViolation(
                "ack must be a JSON object".to_string(),
            ));
        };
        match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => {}
            Some(_) => {
                return Err(MovError::ProtocolViolation(
                    "ack field 'id' must be a non-empty string".to_string(),
                ))
            }
            None => {
                return Err(MovError::ProtocolViolation(
                    "ack has no 'id' field".to_string(),
                ))
            }
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| MovError::ProtocolViolation(format!("ack is not a record: {e}")))
    }

    /// The record as a JSON object with keys in sorted order.
    pub fn to_value(&self) -> Value {
        let mut fields: BTreeMap<&str, &Value> = self
            .extra
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        let id = Value::String(self.id.clone());
        fields.insert("id", &id);
        Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), sorted(v)))
                .collect::<Map<String, Value>>(),
        )
    }
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let ordered: BTreeMap<&String, &Value> = fields.iter().collect();
            Value::Object(
                ordered
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// File-backed store for the [`RegistrationRecord`].
#[derive(Debug, Clone)]
pub struct IdentityStore {
    dir: PathBuf,
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(dir: impl AsRef<Path>, file_name: &str) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(file_name);
        Self { dir, path }
    }

    pub fn from_config(config: &ComponentConfig) -> Self {
        Self::new(&config.log_dir, &config.component_id_file_name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the record, replacing any previous one.
    ///
    /// Creates the directory if needed and writes through a temporary file in
    /// the same directory so readers never see a partial record.
    pub fn save(&self, record: &RegistrationRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(&record.to_value())?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Read the record, if one exists.
    pub fn load(&self) -> Result<Option<RegistrationRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Delete the record. Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
