//! Runtime configuration shared by component binaries.
//!
//! These values only decide where things are written and how verbose the
//! process is; none of them change protocol behaviour. Binaries fill them from
//! flags and environment variables (see the `c1-echo` CLI).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_COMPONENT_ID_FILE_NAME: &str = "component_id.json";

/// Where the component keeps its local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Directory holding the log files and the registration record.
    pub log_dir: PathBuf,
    /// File name of the registration record inside `log_dir`.
    pub component_id_file_name: String,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            component_id_file_name: DEFAULT_COMPONENT_ID_FILE_NAME.to_string(),
        }
    }
}

/// How often the log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl LogRotation {
    pub fn as_str(self) -> &'static str {
        match self {
            LogRotation::Minutely => "minutely",
            LogRotation::Hourly => "hourly",
            LogRotation::Daily => "daily",
            LogRotation::Never => "never",
        }
    }
}

impl fmt::Display for LogRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minutely" => Ok(LogRotation::Minutely),
            "hourly" => Ok(LogRotation::Hourly),
            "daily" => Ok(LogRotation::Daily),
            "never" => Ok(LogRotation::Never),
            other => Err(format!(
                "unknown log rotation '{other}', expected minutely, hourly, daily or never"
            )),
        }
    }
}

/// Tracing output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub file_name: String,
    /// Filter directive for the console layer, overridden by `RUST_LOG`.
    pub console_level: String,
    /// Filter directive for the file layer.
    pub file_level: String,
    pub rotation: LogRotation,
    /// Number of rotated files kept on disk.
    pub max_files: usize,
    /// Emit newline-delimited JSON on the console.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            file_name: "component.txt".to_string(),
            console_level: "info".to_string(),
            file_level: "debug".to_string(),
            rotation: LogRotation::Daily,
            max_files: 5,
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_config_defaults() {
        let config = ComponentConfig::default();
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.component_id_file_name, "component_id.json");
    }

    #[test]
    fn test_component_config_partial_json_uses_defaults() {
        let config: ComponentConfig = serde_json::from_str(r#"{"log_dir": "/var/log/c1"}"#).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/var/log/c1"));
        assert_eq!(config.component_id_file_name, "component_id.json");
    }

    #[test]
    fn test_log_rotation_parse() {
        assert_eq!("Hourly".parse::<LogRotation>().unwrap(), LogRotation::Hourly);
        assert_eq!(" never ".parse::<LogRotation>().unwrap(), LogRotation::Never);
        assert!("weekly".parse::<LogRotation>().is_err());
    }
}
