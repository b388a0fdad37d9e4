//! Component identity as announced to the MOV.
//!
//! The component name is never configured by hand: it is derived from the
//! `control/registered` topic the AsyncAPI document declares, so the name the
//! MOV acknowledges on always matches the topic the component listens to.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MovError, Result};

fn registered_topic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"valawai/(c[0-2]/\w+)/control/registered:").expect("static regex is valid")
    })
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^c[0-2]_[a-z0-9_]+$").expect("static regex is valid")
    })
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d+\.\d+\.\d+$").expect("static regex is valid")
    })
}

/// Cognitive level of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    C0,
    C1,
    C2,
}

impl ComponentType {
    /// Lower-case form used as the topic level (`c1`).
    pub fn level(self) -> &'static str {
        match self {
            ComponentType::C0 => "c0",
            ComponentType::C1 => "c1",
            ComponentType::C2 => "c2",
        }
    }

    /// Upper-case form sent to the MOV (`C1`).
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::C0 => "C0",
            ComponentType::C1 => "C1",
            ComponentType::C2 => "C2",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = MovError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "c0" => Ok(ComponentType::C0),
            "c1" => Ok(ComponentType::C1),
            "c2" => Ok(ComponentType::C2),
            _ => Err(MovError::InvalidName(s.to_string())),
        }
    }
}

/// Validated component name such as `c1_echo_example_with_rust`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentName(String);

impl ComponentName {
    /// Validate `name` against `^c[0-2]_[a-z0-9_]+$`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if !name_regex().is_match(&name) {
            return Err(MovError::InvalidName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Topic level prefix (`c1`).
    pub fn level(&self) -> &str {
        &self.0[..2]
    }

    /// Name without the level prefix (`echo_example_with_rust`).
    pub fn short_name(&self) -> &str {
        &self.0[3..]
    }

    pub fn component_type(&self) -> ComponentType {
        match &self.0[..2] {
            "c0" => ComponentType::C0,
            "c2" => ComponentType::C2,
            _ => ComponentType::C1,
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ComponentName {
    type Error = MovError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ComponentName> for String {
    fn from(name: ComponentName) -> Self {
        name.0
    }
}

/// Derive the component name from the AsyncAPI document.
///
/// Uses the first `valawai/<level>/<name>/control/registered:` declaration;
/// the `/` between level and name becomes `_`.
///
/// # Errors
///
/// `MovError::MalformedSpec` when no such declaration exists or the derived
/// name is not a valid component name.
pub fn derive_component_name(asyncapi_yaml: &str) -> Result<ComponentName> {
    let captures = registered_topic_regex()
        .captures(asyncapi_yaml)
        .ok_or_else(|| {
            MovError::MalformedSpec(
                "no valawai/<level>/<name>/control/registered topic declared".to_string(),
            )
        })?;

    let derived = captures[1].replacen('/', "_", 1);
    ComponentName::new(derived)
        .map_err(|e| MovError::MalformedSpec(format!("derived component name is invalid: {e}")))
}

/// Everything the MOV needs to register a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    component_type: ComponentType,
    name: ComponentName,
    version: String,
    asyncapi_yaml: String,
}

impl ComponentDescriptor {
    /// Build the descriptor from the crate version and the AsyncAPI document.
    pub fn from_build_metadata(version: &str, asyncapi_yaml: impl Into<String>) -> Result<Self> {
        if !version_regex().is_match(version) {
            return Err(MovError::InvalidVersion(version.to_string()));
        }
        let asyncapi_yaml = asyncapi_yaml.into();
        let name = derive_component_name(&asyncapi_yaml)?;
        Ok(Self {
            component_type: name.component_type(),
            name,
            version: version.to_string(),
            asyncapi_yaml,
        })
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn name(&self) -> &ComponentName {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn asyncapi_yaml(&self) -> &str {
        &self.asyncapi_yaml
    }

    /// Body published on `valawai/component/register`.
    pub fn register_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.component_type,
            "name": self.name,
            "version": self.version,
            "asyncapi_yaml": self.asyncapi_yaml,
        })
    }
}
