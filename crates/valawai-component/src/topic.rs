//! Topic naming for the VALAWAI fleet.

use std::fmt;

use crate::descriptor::ComponentName;

/// Topic a component publishes its registration to.
pub const REGISTER_TOPIC: &str = "valawai/component/register";
/// Topic a component publishes its unregistration to.
pub const UNREGISTER_TOPIC: &str = "valawai/component/unregister";
/// Topic collecting log entries for the MOV.
pub const LOG_ADD_TOPIC: &str = "valawai/log/add";

/// Whether a component topic carries protocol control or domain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicCategory {
    Control,
    Data,
}

impl TopicCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            TopicCategory::Control => "control",
            TopicCategory::Data => "data",
        }
    }
}

/// A broker topic name.
///
/// Component topics follow `valawai/<level>/<name>/<category>/<action>` and
/// are only built from the component's own [`ComponentName`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    pub fn register() -> Self {
        Self(REGISTER_TOPIC.to_string())
    }

    pub fn unregister() -> Self {
        Self(UNREGISTER_TOPIC.to_string())
    }

    pub fn log_add() -> Self {
        Self(LOG_ADD_TOPIC.to_string())
    }

    pub fn component(name: &ComponentName, category: TopicCategory, action: &str) -> Self {
        Self(format!(
            "valawai/{}/{}/{}/{}",
            name.level(),
            name.short_name(),
            category.as_str(),
            action
        ))
    }

    pub fn control(name: &ComponentName, action: &str) -> Self {
        Self::component(name, TopicCategory::Control, action)
    }

    pub fn data(name: &ComponentName, action: &str) -> Self {
        Self::component(name, TopicCategory::Data, action)
    }

    /// `valawai/<level>/<name>/control/registered`, where the MOV acknowledges
    /// a registration.
    pub fn registered(name: &ComponentName) -> Self {
        Self::control(name, "registered")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
