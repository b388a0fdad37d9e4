//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable
//! the VALAWAI deployment files already use.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use valawai_channel::AmqpConfig;
use valawai_component::{ComponentConfig, LogConfig, LogRotation};

/// AsyncAPI document shipped with the component.
pub const DEFAULT_ASYNCAPI_YAML: &str = include_str!("../asyncapi.yaml");

#[derive(Debug, Clone, Parser)]
#[command(name = "c1-echo")]
#[command(author = "VALAWAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "VALAWAI C1 component that echoes the messages it receives", long_about = None)]
pub struct Cli {
    /// RabbitMQ host
    #[arg(long, env = "RABBITMQ_HOST", default_value = "mov-mq")]
    pub rabbitmq_host: String,

    /// RabbitMQ port
    #[arg(long, env = "RABBITMQ_PORT", default_value_t = 5672)]
    pub rabbitmq_port: u16,

    /// RabbitMQ user
    #[arg(long, env = "RABBITMQ_USERNAME", default_value = "mov")]
    pub rabbitmq_username: String,

    /// RabbitMQ password
    #[arg(long, env = "RABBITMQ_PASSWORD", default_value = "password", hide_env_values = true)]
    pub rabbitmq_password: String,

    /// RabbitMQ virtual host
    #[arg(long, env = "RABBITMQ_VIRTUAL_HOST", default_value = "/")]
    pub rabbitmq_virtual_host: String,

    /// Connection attempts before giving up
    #[arg(long, env = "RABBITMQ_MAX_RETRIES", default_value_t = 100)]
    pub rabbitmq_max_retries: u32,

    /// Seconds between connection attempts
    #[arg(long, env = "RABBITMQ_RETRY_SLEEP", default_value_t = 3)]
    pub rabbitmq_retry_sleep: u64,

    /// Directory for log files and the component id record
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Log file name inside the log directory
    #[arg(long, env = "LOG_FILE_NAME", default_value = "c1_echo_example_with_rust.txt")]
    pub log_file_name: String,

    /// Console filter (RUST_LOG takes precedence)
    #[arg(long, env = "LOG_CONSOLE_LEVEL", default_value = "info")]
    pub log_console_level: String,

    /// Log file filter
    #[arg(long, env = "LOG_FILE_LEVEL", default_value = "debug")]
    pub log_file_level: String,

    /// Log file rotation: minutely, hourly, daily or never
    #[arg(long, env = "LOG_FILE_ROTATION", default_value = "daily")]
    pub log_file_rotation: LogRotation,

    /// Rotated log files kept on disk
    #[arg(long, env = "LOG_FILE_BACKUP_COUNT", default_value_t = 5)]
    pub log_file_backup_count: usize,

    /// Emit JSON-formatted log lines on the console
    #[arg(long, env = "LOG_JSON")]
    pub json: bool,

    /// File name of the component id record inside the log directory
    #[arg(long, env = "COMPONENT_ID_FILE_NAME", default_value = "component_id.json")]
    pub component_id_file_name: String,

    /// Use this AsyncAPI document instead of the embedded one
    #[arg(long, env = "COMPONENT_ASYNCAPI_PATH")]
    pub asyncapi_path: Option<PathBuf>,
}

impl Cli {
    pub fn amqp_config(&self) -> AmqpConfig {
        AmqpConfig {
            host: self.rabbitmq_host.clone(),
            port: self.rabbitmq_port,
            username: self.rabbitmq_username.clone(),
            password: self.rabbitmq_password.clone(),
            virtual_host: self.rabbitmq_virtual_host.clone(),
            max_retries: self.rabbitmq_max_retries,
            retry_sleep_secs: self.rabbitmq_retry_sleep,
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.log_dir.clone(),
            file_name: self.log_file_name.clone(),
            console_level: self.log_console_level.clone(),
            file_level: self.log_file_level.clone(),
            rotation: self.log_file_rotation,
            max_files: self.log_file_backup_count,
            json: self.json,
        }
    }

    pub fn component_config(&self) -> ComponentConfig {
        ComponentConfig {
            log_dir: self.log_dir.clone(),
            component_id_file_name: self.component_id_file_name.clone(),
        }
    }

    /// The AsyncAPI document to register with.
    pub fn asyncapi_yaml(&self) -> Result<String> {
        match &self.asyncapi_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read AsyncAPI document {}", path.display())),
            None => Ok(DEFAULT_ASYNCAPI_YAML.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("c1-echo").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--rabbitmq-host",
            "localhost",
            "--rabbitmq-port",
            "5673",
            "--log-file-rotation",
            "hourly",
            "--component-id-file-name",
            "id.json",
        ]);

        let amqp = cli.amqp_config();
        assert_eq!(amqp.host, "localhost");
        assert_eq!(amqp.port, 5673);
        assert_eq!(cli.log_config().rotation, LogRotation::Hourly);
        assert_eq!(cli.component_config().component_id_file_name, "id.json");
    }

    #[test]
    fn test_invalid_rotation_is_rejected() {
        let err = Cli::try_parse_from(["c1-echo", "--log-file-rotation", "weekly"]).unwrap_err();
        assert!(err.to_string().contains("weekly"));
    }

    #[test]
    fn test_embedded_asyncapi_declares_registered_topic() {
        assert!(DEFAULT_ASYNCAPI_YAML
            .contains("valawai/c1/echo_example_with_rust/control/registered:"));
    }

    #[test]
    fn test_asyncapi_override_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asyncapi.yaml");
        std::fs::write(&path, "valawai/c1/other/control/registered:\n").unwrap();

        let cli = parse(&["--asyncapi-path", path.to_str().unwrap()]);

        assert_eq!(
            cli.asyncapi_yaml().unwrap(),
            "valawai/c1/other/control/registered:\n"
        );
    }

    #[test]
    fn test_missing_asyncapi_override_fails() {
        let cli = parse(&["--asyncapi-path", "/definitely/not/here.yaml"]);
        assert!(cli.asyncapi_yaml().is_err());
    }
}
