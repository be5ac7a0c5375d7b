//! Workflow execution against a real HTTP server

use chainload_core::{ApiStepConfig, ErrorKind, ExtractionRule, RunConfig, SessionState};
use chainload_engine::{HttpTransport, Runner, WorkflowExecutor};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(timeout: Duration) -> Arc<HttpTransport> {
    Arc::new(HttpTransport::new(timeout, 4).unwrap())
}

fn login_and_profile() -> (HashMap<String, ApiStepConfig>, Vec<String>) {
    let mut apis = HashMap::new();
    apis.insert(
        "login".to_string(),
        ApiStepConfig::new("POST", "/login")
            .with_body_field("wallet_addr", "{{walletAddr}}")
            .with_extraction("token", ExtractionRule::ByName("token".to_string())),
    );
    apis.insert(
        "getUserInfo".to_string(),
        ApiStepConfig::new("GET", "/user/info")
            .with_header("Authorization", "{{token}}")
            .with_query("wallet", "{{walletAddr}}"),
    );
    (apis, vec!["login".to_string(), "getUserInfo".to_string()])
}

async fn mount_login_flow(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"wallet_addr": "0xabc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"token": "abc123"}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/user/info"))
        .and(header("Authorization", "abc123"))
        .and(query_param("wallet", "0xabc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"points": 10}
        })))
        .mount(server)
        .await;
}

fn wallet_session() -> SessionState {
    SessionState::from_record(HashMap::from([(
        "walletAddr".to_string(),
        "0xabc".to_string(),
    )]))
}

#[tokio::test]
async fn test_extracted_token_is_sent_as_header() {
    let server = MockServer::start().await;
    mount_login_flow(&server).await;

    let (apis, names) = login_and_profile();
    let executor = WorkflowExecutor::from_steps(
        &server.uri(),
        &apis,
        &names,
        transport(Duration::from_secs(5)),
    )
    .unwrap();

    let results = executor.execute(wallet_session()).await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(results[1].status, Some(200));
    assert_eq!(results[1].payload.as_ref().unwrap()["data"]["points"], 10);
}

#[tokio::test]
async fn test_connection_refused_is_connect_failure() {
    let (apis, names) = login_and_profile();
    let executor = WorkflowExecutor::from_steps(
        "http://127.0.0.1:1",
        &apis,
        &names,
        transport(Duration::from_secs(5)),
    )
    .unwrap();

    let results = executor.execute(wallet_session()).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].error_kind(), Some(ErrorKind::Connect));
    assert_eq!(results[0].status, None);
}

#[tokio::test]
async fn test_slow_response_is_timeout_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let (apis, names) = login_and_profile();
    let executor = WorkflowExecutor::from_steps(
        &server.uri(),
        &apis,
        &names,
        transport(Duration::from_millis(200)),
    )
    .unwrap();

    let results = executor.execute(wallet_session()).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].error_kind(), Some(ErrorKind::Timeout));
}

#[tokio::test]
async fn test_non_json_body_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let (apis, names) = login_and_profile();
    let executor = WorkflowExecutor::from_steps(
        &server.uri(),
        &apis,
        &names,
        transport(Duration::from_secs(5)),
    )
    .unwrap();

    let results = executor.execute(wallet_session()).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].error_kind(), Some(ErrorKind::Parse));
    assert_eq!(results[0].status, Some(503));
}

#[tokio::test]
async fn test_business_error_code_counts_as_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 10001,
            "message": "invalid signature"
        })))
        .mount(&server)
        .await;

    let (apis, _) = login_and_profile();
    let executor = WorkflowExecutor::from_steps(
        &server.uri(),
        &apis,
        &["login".to_string()],
        transport(Duration::from_secs(5)),
    )
    .unwrap();

    let results = executor.execute(wallet_session()).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_success());
}

#[tokio::test]
async fn test_full_run_against_server() {
    let server = MockServer::start().await;
    mount_login_flow(&server).await;

    let (apis, workflow) = login_and_profile();
    let records = (0..4)
        .map(|_| HashMap::from([("walletAddr".to_string(), "0xabc".to_string())]))
        .collect();
    let config = RunConfig {
        total_requests: 4,
        concurrency: 2,
        workflow,
        base_url: server.uri(),
        apis,
        ..RunConfig::default()
    }
    .with_test_data(records);

    let stats = Runner::new(config).unwrap().run().await;

    assert_eq!(stats.total_requests, 8);
    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.status_codes[&200], 8);
    assert_eq!(server.received_requests().await.unwrap().len(), 8);
}
