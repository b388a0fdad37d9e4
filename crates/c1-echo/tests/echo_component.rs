//! Behaviour of the echo component over the in-memory broker.

use std::sync::Arc;
use std::time::Duration;

use c1_echo::{App, DEFAULT_ASYNCAPI_YAML};
use serde_json::{json, Value};
use valawai_channel::fakes::MemoryChannel;
use valawai_channel::MessageChannel;
use valawai_component::{ComponentConfig, RegistrationState, LOG_ADD_TOPIC, UNREGISTER_TOPIC};

const RECEIVED: &str = "valawai/c1/echo_example_with_rust/data/received_message";
const PUBLISHED: &str = "valawai/c1/echo_example_with_rust/data/publish_message";
const REGISTERED: &str = "valawai/c1/echo_example_with_rust/control/registered";

struct Running {
    dir: tempfile::TempDir,
    channel: Arc<MemoryChannel>,
    app: Arc<App>,
    consumer: tokio::task::JoinHandle<anyhow::Result<()>>,
}

async fn start() -> Running {
    let dir = tempfile::tempdir().unwrap();
    let config = ComponentConfig {
        log_dir: dir.path().join("logs"),
        ..ComponentConfig::default()
    };
    let channel = MemoryChannel::shared();
    let app = Arc::new(
        App::start(
            channel.clone(),
            &config,
            "1.0.0",
            DEFAULT_ASYNCAPI_YAML.to_string(),
        )
        .await
        .unwrap(),
    );
    let consumer = {
        let app = app.clone();
        tokio::spawn(async move { app.run().await })
    };
    Running {
        dir,
        channel,
        app,
        consumer,
    }
}

impl Running {
    /// Stop the component, handing back the state directory for inspection.
    async fn stop(self) -> tempfile::TempDir {
        self.app.stop().await.unwrap();
        self.consumer.await.unwrap().unwrap();
        self.dir
    }

    async fn error_logs(&self) -> Vec<Value> {
        self.channel
            .published_on(LOG_ADD_TOPIC)
            .await
            .into_iter()
            .filter(|entry| entry["level"] == "ERROR")
            .collect()
    }
}

#[tokio::test]
async fn startup_binds_topics_and_registers() {
    let running = start().await;

    let topics = running.channel.subscribed_topics().await;
    assert_eq!(topics, vec![REGISTERED.to_string(), RECEIVED.to_string()]);

    let register = running
        .channel
        .published_on("valawai/component/register")
        .await;
    assert_eq!(register.len(), 1);
    assert_eq!(register[0]["type"], "C1");
    assert_eq!(register[0]["name"], "c1_echo_example_with_rust");
    assert_eq!(register[0]["version"], "1.0.0");
    assert_eq!(
        running.app.coordinator().state(),
        RegistrationState::AwaitingAck
    );

    running.stop().await;
}

#[tokio::test]
async fn valid_message_is_echoed_once() {
    let running = start().await;

    running
        .channel
        .publish_to(RECEIVED, &json!({"content": "abc-123"}))
        .await
        .unwrap();

    let echoed = running
        .channel
        .wait_for_published(PUBLISHED, 1, Duration::from_secs(30))
        .await;
    assert_eq!(echoed, vec![json!({"content": "abc-123"})]);
    assert!(running.error_logs().await.is_empty());

    running.stop().await;
}

#[tokio::test]
async fn empty_object_is_rejected_with_one_error_log() {
    let running = start().await;

    running
        .channel
        .publish_to(RECEIVED, &json!({}))
        .await
        .unwrap();
    // A valid message afterwards proves the rejected one has been processed.
    running
        .channel
        .publish_to(RECEIVED, &json!({"content": "after"}))
        .await
        .unwrap();
    let echoed = running
        .channel
        .wait_for_published(PUBLISHED, 1, Duration::from_secs(30))
        .await;

    assert_eq!(echoed, vec![json!({"content": "after"})]);
    let errors = running.error_logs().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["payload"], "{}");
    assert!(errors[0]["message"]
        .as_str()
        .unwrap()
        .starts_with("Cannot process echo, because"));

    running.stop().await;
}

#[tokio::test]
async fn empty_content_is_rejected() {
    let running = start().await;

    running
        .channel
        .publish_to(RECEIVED, &json!({"content": ""}))
        .await
        .unwrap();
    running
        .channel
        .publish_to(RECEIVED, &json!({"content": "sentinel"}))
        .await
        .unwrap();
    let echoed = running
        .channel
        .wait_for_published(PUBLISHED, 1, Duration::from_secs(30))
        .await;

    assert_eq!(echoed, vec![json!({"content": "sentinel"})]);
    let errors = running.error_logs().await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["payload"], json!({"content": ""}).to_string());

    running.stop().await;
}

#[tokio::test]
async fn malformed_json_is_dropped_without_forwarding() {
    let running = start().await;

    running.channel.inject(RECEIVED, b"{not json".to_vec()).await.unwrap();
    running
        .channel
        .publish_to(RECEIVED, &json!({"content": "sentinel"}))
        .await
        .unwrap();
    running
        .channel
        .wait_for_published(PUBLISHED, 1, Duration::from_secs(30))
        .await;

    assert!(running.error_logs().await.is_empty());

    running.stop().await;
}

#[tokio::test]
async fn registration_cycle_writes_and_removes_record() {
    let running = start().await;
    let record_path = running.dir.path().join("logs").join("component_id.json");

    running
        .channel
        .publish_to(REGISTERED, &json!({"id": "mov-assigned-id", "name": "c1_echo_example_with_rust"}))
        .await
        .unwrap();
    let id = running
        .app
        .coordinator()
        .wait_until_registered(Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(id, "mov-assigned-id");
    let record: Value =
        serde_json::from_str(&std::fs::read_to_string(&record_path).unwrap()).unwrap();
    assert_eq!(record["id"], "mov-assigned-id");

    running
        .channel
        .publish_to(RECEIVED, &json!({"content": "registered"}))
        .await
        .unwrap();
    running
        .channel
        .wait_for_published(PUBLISHED, 1, Duration::from_secs(30))
        .await;
    let logs = running.channel.published_on(LOG_ADD_TOPIC).await;
    assert!(logs
        .iter()
        .all(|entry| entry["component_id"] == "mov-assigned-id"));

    let channel = running.channel.clone();
    let _dir = running.stop().await;

    assert!(!record_path.exists());
    assert_eq!(
        channel.published_on(UNREGISTER_TOPIC).await,
        vec![json!({"component_id": "mov-assigned-id"})]
    );
}

#[tokio::test]
async fn shutdown_future_stops_the_component() {
    let dir = tempfile::tempdir().unwrap();
    let config = ComponentConfig {
        log_dir: dir.path().to_path_buf(),
        ..ComponentConfig::default()
    };
    let channel = MemoryChannel::shared();
    let app = App::start(
        channel.clone(),
        &config,
        "1.0.0",
        DEFAULT_ASYNCAPI_YAML.to_string(),
    )
    .await
    .unwrap();

    app.run_until(tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap();

    assert!(channel.is_closed());
    assert_eq!(
        app.coordinator().state(),
        RegistrationState::Unregistered
    );
}

#[tokio::test]
async fn invalid_version_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = ComponentConfig {
        log_dir: dir.path().to_path_buf(),
        ..ComponentConfig::default()
    };
    let channel = MemoryChannel::shared();

    let result = App::start(
        channel.clone(),
        &config,
        "one",
        DEFAULT_ASYNCAPI_YAML.to_string(),
    )
    .await;

    assert!(result.is_err());
    assert!(channel.published().await.is_empty());
}

#[tokio::test]
async fn asyncapi_without_registered_topic_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = ComponentConfig {
        log_dir: dir.path().to_path_buf(),
        ..ComponentConfig::default()
    };

    let result = App::start(
        MemoryChannel::shared(),
        &config,
        "1.0.0",
        "asyncapi: 2.6.0\nchannels: {}\n".to_string(),
    )
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn lost_broker_connection_stops_and_unregisters() {
    let dir = tempfile::tempdir().unwrap();
    let config = ComponentConfig {
        log_dir: dir.path().to_path_buf(),
        ..ComponentConfig::default()
    };
    let channel = MemoryChannel::shared();
    let app = App::start(
        channel.clone(),
        &config,
        "1.0.0",
        DEFAULT_ASYNCAPI_YAML.to_string(),
    )
    .await
    .unwrap();
    channel
        .publish_to(REGISTERED, &json!({"id": "before-disconnect"}))
        .await
        .unwrap();

    let broker = {
        let channel = channel.clone();
        let coordinator = app.coordinator().clone();
        tokio::spawn(async move {
            coordinator
                .wait_until_registered(Duration::from_secs(30))
                .await
                .unwrap();
            channel.disconnect("connection reset by peer");
        })
    };

    let result = tokio::time::timeout(
        Duration::from_secs(30),
        app.run_until(std::future::pending()),
    )
    .await
    .unwrap();
    broker.await.unwrap();

    assert!(result.is_err());
    assert!(channel.is_closed());
    assert_eq!(
        app.coordinator().state(),
        RegistrationState::Unregistered
    );
    assert_eq!(
        channel.published_on(UNREGISTER_TOPIC).await,
        vec![json!({"component_id": "before-disconnect"})]
    );
}
