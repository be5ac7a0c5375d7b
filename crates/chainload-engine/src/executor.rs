//! Workflow executor
//!
//! Runs the configured steps of one iteration in order, threading a
//! [`SessionState`] through them. Each step yields exactly one [`StepResult`];
//! the first failed step ends the iteration.

use crate::transport::{PreparedRequest, Transport};
use chainload_core::template::{interpolate, resolve_string, resolve_value};
use chainload_core::config::resolve_steps;
use chainload_core::{ApiStepConfig, ConfigError, ErrorKind, RunConfig, SessionState};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

// ============================================================================
// STEP RESULTS
// ============================================================================

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure { kind: ErrorKind, message: String },
}

/// Result of one executed workflow step
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Step name from the workflow
    pub step: String,

    /// HTTP status, when a response was received
    pub status: Option<u16>,

    /// Time from sending the request to reading the full body
    pub elapsed: Duration,

    pub outcome: Outcome,

    /// Parsed response document, used for extraction only
    pub payload: Option<Value>,
}

impl StepResult {
    fn success(step: &str, status: u16, elapsed: Duration, payload: Value) -> Self {
        Self {
            step: step.to_string(),
            status: Some(status),
            elapsed,
            outcome: Outcome::Success,
            payload: Some(payload),
        }
    }

    fn failure(
        step: &str,
        status: Option<u16>,
        elapsed: Duration,
        kind: ErrorKind,
        message: String,
    ) -> Self {
        Self {
            step: step.to_string(),
            status,
            elapsed,
            outcome: Outcome::Failure { kind, message },
            payload: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// One resolved workflow step
#[derive(Debug, Clone)]
struct WorkflowStep {
    name: String,
    config: ApiStepConfig,
}

/// Executes the workflow for one iteration at a time.
///
/// Immutable after construction and shared by all workers.
pub struct WorkflowExecutor {
    base_url: String,
    steps: Vec<WorkflowStep>,
    transport: Arc<dyn Transport>,
}

impl WorkflowExecutor {
    /// Build an executor for the workflow of a run configuration
    pub fn new(config: &RunConfig, transport: Arc<dyn Transport>) -> Result<Self, ConfigError> {
        Self::from_steps(&config.base_url, &config.apis, &config.workflow, transport)
    }

    /// Build an executor from a step map and an ordered list of step names.
    ///
    /// Fails if a name has no definition.
    pub fn from_steps(
        base_url: &str,
        step_configs: &HashMap<String, ApiStepConfig>,
        step_names: &[String],
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let steps = resolve_steps(step_configs, step_names)?
            .into_iter()
            .map(|(name, config)| WorkflowStep { name, config })
            .collect();

        Ok(Self {
            base_url: base_url.to_string(),
            steps,
            transport,
        })
    }

    /// Step names in execution order
    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|step| step.name.as_str())
    }

    /// Resolve a step's templates against the session
    pub fn prepare(&self, step: &ApiStepConfig, session: &SessionState) -> PreparedRequest {
        let url = format!("{}{}", self.base_url, interpolate(&step.url, session));

        let headers = step
            .headers
            .iter()
            .map(|(name, template)| (name.clone(), interpolate(template, session)))
            .collect();

        let query = step
            .query_params
            .iter()
            .map(|(name, template)| (name.clone(), resolve_string(template, session)))
            .collect();

        let body = if step.body.is_empty() {
            None
        } else {
            let fields: Map<String, Value> = step
                .body
                .iter()
                .map(|(name, template)| (name.clone(), resolve_value(template, session)))
                .collect();
            Some(Value::Object(fields))
        };

        PreparedRequest {
            method: step.method.clone(),
            url,
            headers,
            query,
            body,
        }
    }

    /// Run every step of one iteration, stopping at the first failure
    pub async fn execute(&self, mut session: SessionState) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let result = self.execute_step(step, &mut session).await;
            let failed = !result.is_success();
            results.push(result);
            if failed {
                break;
            }
        }

        results
    }

    async fn execute_step(&self, step: &WorkflowStep, session: &mut SessionState) -> StepResult {
        let request = self.prepare(&step.config, session);
        debug!(step = %step.name, method = %request.method, url = %request.url, "Sending request");

        let start = Instant::now();
        let response = match self.transport.send(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(step = %step.name, kind = %err.kind, error = %err.message, "Request failed");
                return StepResult::failure(&step.name, None, start.elapsed(), err.kind, err.message);
            }
        };
        let elapsed = start.elapsed();

        trace!(
            step = %step.name,
            status = response.status,
            body = %String::from_utf8_lossy(&response.body),
            "Response received"
        );

        let document = match serde_json::from_slice::<Value>(&response.body) {
            Ok(document @ Value::Object(_)) => document,
            Ok(other) => {
                warn!(step = %step.name, status = response.status, "Response is not a JSON object");
                return StepResult::failure(
                    &step.name,
                    Some(response.status),
                    elapsed,
                    ErrorKind::Parse,
                    format!("expected a JSON object, got {}", json_type(&other)),
                );
            }
            Err(err) => {
                warn!(step = %step.name, status = response.status, error = %err, "Response is not valid JSON");
                return StepResult::failure(
                    &step.name,
                    Some(response.status),
                    elapsed,
                    ErrorKind::Parse,
                    err.to_string(),
                );
            }
        };

        log_business_code(&step.name, &document);
        apply_extractions(&step.name, &step.config, &document, session);

        StepResult::success(&step.name, response.status, elapsed, document)
    }
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("base_url", &self.base_url)
            .field("steps", &self.step_names().collect::<Vec<_>>())
            .finish()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A non-zero top-level `code` is an application error, not a transport one.
/// It is only reported.
fn log_business_code(step: &str, document: &Value) {
    let code = document.get("code").and_then(Value::as_f64);
    if let Some(code) = code.filter(|code| *code != 0.0) {
        warn!(step, code, "Response carries a non-zero application code");
    }
}

fn apply_extractions(
    step: &str,
    config: &ApiStepConfig,
    document: &Value,
    session: &mut SessionState,
) {
    for (key, rule) in &config.response {
        match rule.locate(document) {
            Some(value) => session.insert(key.clone(), value.clone()),
            None => warn!(
                step,
                key = %key,
                source = rule.source(),
                "Field not found in response"
            ),
        }
    }
}
