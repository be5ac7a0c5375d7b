//! Scheduler scenarios driven by an in-process transport

use async_trait::async_trait;
use chainload_core::{ApiStepConfig, ConfigError, ErrorKind, FeedMode, RunConfig, TestDataRecord};
use chainload_engine::{
    EngineError, PreparedRequest, RawResponse, Runner, Transport, TransportError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Answers every request with `{}` after a fixed delay, failing any URL that
/// contains one of the configured fragments.
#[derive(Default)]
struct ScriptedTransport {
    delay: Duration,
    fail_on: Vec<String>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on.push(fragment.to_string());
        self
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        self.seen.lock().push(request.url.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_on.iter().any(|f| request.url.contains(f.as_str())) {
            return Err(TransportError::new(ErrorKind::Connect, "connection refused"));
        }
        Ok(RawResponse::new(200, r#"{"code":0}"#))
    }
}

fn records(n: usize) -> Vec<TestDataRecord> {
    (0..n)
        .map(|i| HashMap::from([("iter".to_string(), i.to_string())]))
        .collect()
}

fn config(workflow: &[&str], total_requests: u64, concurrency: usize) -> RunConfig {
    let apis = workflow
        .iter()
        .map(|name| {
            (
                name.to_string(),
                ApiStepConfig::new("GET", format!("/{name}/{{{{iter}}}}")),
            )
        })
        .collect();

    RunConfig {
        total_requests,
        concurrency,
        workflow: workflow.iter().map(|s| s.to_string()).collect(),
        apis,
        ..RunConfig::default()
    }
}

#[tokio::test]
async fn test_count_run_records_every_request() {
    let transport = Arc::new(ScriptedTransport::with_delay(Duration::from_millis(10)));
    let runner = Runner::with_transport(config(&["ping"], 5, 2), transport.clone()).unwrap();

    let stats = runner.run().await;

    assert_eq!(stats.total_requests, 5);
    assert_eq!(stats.success_count, 5);
    assert_eq!(stats.failure_count, 0);
    assert!(stats.min_duration >= Duration::from_millis(10));
    assert!(stats.min_duration <= stats.avg_duration);
    assert!(stats.avg_duration <= stats.max_duration);
    assert!(stats.max_duration < Duration::from_secs(1));
    assert_eq!(transport.seen().len(), 5);
}

#[tokio::test]
async fn test_failed_step_ends_only_its_iteration() {
    let transport =
        Arc::new(ScriptedTransport::with_delay(Duration::ZERO).failing_on("/login/3"));
    let config = config(&["login", "profile"], 4, 2).with_test_data(records(4));
    let runner = Runner::with_transport(config, transport.clone()).unwrap();

    let stats = runner.run().await;

    // iterations 0..4 each yield two results, except iteration 3 which stops at login
    assert_eq!(stats.total_requests, 7);
    assert_eq!(stats.failure_count, 1);
    assert_eq!(stats.error_kinds[&ErrorKind::Connect], 1);

    let seen = transport.seen();
    assert!(seen.iter().any(|url| url.ends_with("/login/3")));
    assert!(!seen.iter().any(|url| url.ends_with("/profile/3")));
}

#[tokio::test]
async fn test_exhausted_test_data_stops_run_early() {
    let transport = Arc::new(ScriptedTransport::default());
    let config = config(&["ping"], 10, 2).with_test_data(records(3));
    let runner = Runner::with_transport(config, transport).unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(5), runner.run())
        .await
        .expect("run should finish once test data is exhausted");

    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.failure_count, 0);
}

#[tokio::test]
async fn test_cyclic_test_data_is_reused() {
    let transport = Arc::new(ScriptedTransport::default());
    let mut config = config(&["ping"], 6, 3).with_test_data(records(2));
    config.test_data_mode = FeedMode::Cyclic;
    let runner = Runner::with_transport(config, transport.clone()).unwrap();

    let stats = runner.run().await;

    assert_eq!(stats.total_requests, 6);
    let seen = transport.seen();
    assert_eq!(seen.iter().filter(|url| url.ends_with("/ping/0")).count(), 3);
    assert_eq!(seen.iter().filter(|url| url.ends_with("/ping/1")).count(), 3);
}

#[tokio::test]
async fn test_zero_duration_run_finishes() {
    let transport = Arc::new(ScriptedTransport::default());
    let runner = Runner::with_transport(config(&["ping"], 0, 4), transport).unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(5), runner.run())
        .await
        .expect("zero-duration run should not hang");

    assert_eq!(stats.total_requests, 0);
    assert!(stats.percentiles.is_empty());
}

#[tokio::test]
async fn test_duration_run_generates_load_until_deadline() {
    let transport = Arc::new(ScriptedTransport::with_delay(Duration::from_millis(5)));
    let mut config = config(&["ping"], 0, 2);
    config.duration_secs = 1;
    let runner = Runner::with_transport(config, transport).unwrap();

    let stats = runner.run().await;

    assert!(stats.total_requests > 0);
    assert_eq!(stats.failure_count, 0);
    assert!(stats.run_duration >= Duration::from_secs(1));
    assert!(stats.requests_per_sec > 0.0);
}

#[test]
fn test_missing_step_is_rejected() {
    let mut config = config(&["login"], 1, 1);
    config.workflow.push("logout".to_string());

    let err = Runner::with_transport(config, Arc::new(ScriptedTransport::default())).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Config(ConfigError::MissingStep(ref name)) if name == "logout"
    ));
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let config = config(&["ping"], 1, 0);

    let err = Runner::with_transport(config, Arc::new(ScriptedTransport::default())).unwrap_err();
    assert!(matches!(err, EngineError::Config(ConfigError::ZeroConcurrency)));
}
