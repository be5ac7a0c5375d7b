//! Run configuration types
//!
//! Field names follow the JSON layout of the run and API definition files
//! (`totalRequests`, `baseURL`, `queryParams`, ...). Everything here is built
//! once before a run and treated as read-only afterwards.

use crate::error::{ConfigError, Result};
use crate::extract::ExtractionRule;
use crate::types::TestDataRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default capacity of the worker → aggregator result channel
pub const DEFAULT_RESULT_BUFFER: usize = 1024;

/// Complete configuration for one load run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Number of iterations to run; 0 selects duration mode
    #[serde(default)]
    pub total_requests: u64,

    /// Number of concurrent workers (and ticket channel capacity)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Run length in seconds when `total_requests` is 0
    #[serde(default, rename = "duration")]
    pub duration_secs: u64,

    /// Ordered step names executed once per iteration
    #[serde(default)]
    pub workflow: Vec<String>,

    /// Base URL that step URLs are appended to
    #[serde(rename = "baseURL", alias = "baseUrl")]
    pub base_url: String,

    /// Step name → API template
    #[serde(default)]
    pub apis: HashMap<String, ApiStepConfig>,

    /// How test-data records are handed out
    #[serde(default)]
    pub test_data_mode: FeedMode,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Result channel capacity
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,

    /// Preloaded test data; `None` means every iteration starts empty
    #[serde(skip)]
    pub test_data: Option<Vec<TestDataRecord>>,
}

fn default_concurrency() -> usize {
    1
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_result_buffer() -> usize {
    DEFAULT_RESULT_BUFFER
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            total_requests: 0,
            concurrency: default_concurrency(),
            duration_secs: 0,
            workflow: Vec::new(),
            base_url: "http://localhost:8080".to_string(),
            apis: HashMap::new(),
            test_data_mode: FeedMode::default(),
            request_timeout_secs: default_request_timeout(),
            result_buffer: default_result_buffer(),
            test_data: None,
        }
    }
}

/// Test-data hand-out policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// Each record is used at most once
    #[default]
    Exhausting,
    /// Records wrap around to the start
    Cyclic,
}

/// Ticket pacing mode derived from the configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMode {
    /// Emit exactly this many tickets
    Count(u64),
    /// Emit tickets until the deadline elapses
    Duration(Duration),
}

/// One API call template
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStepConfig {
    /// Path appended to the base URL; may contain `{{key}}` placeholders
    pub url: String,

    /// HTTP method
    #[serde(default = "default_method")]
    pub method: String,

    /// Header templates, interpolated per occurrence
    #[serde(default)]
    pub headers: IndexMap<String, String>,

    /// Query parameter templates
    #[serde(default)]
    pub query_params: IndexMap<String, String>,

    /// JSON body field templates
    #[serde(default)]
    pub body: IndexMap<String, String>,

    /// Session key → extraction rule applied to the response
    #[serde(default)]
    pub response: IndexMap<String, ExtractionRule>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl ApiStepConfig {
    /// Create a step with the given method and URL
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.headers.insert(name.into(), template.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), template.into());
        self
    }

    pub fn with_body_field(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.body.insert(name.into(), template.into());
        self
    }

    pub fn with_extraction(mut self, key: impl Into<String>, rule: ExtractionRule) -> Self {
        self.response.insert(key.into(), rule);
        self
    }
}

/// Look up each step name in order.
///
/// Fails on an empty list or a name with no definition.
pub fn resolve_steps(
    apis: &HashMap<String, ApiStepConfig>,
    names: &[String],
) -> Result<Vec<(String, ApiStepConfig)>> {
    if names.is_empty() {
        return Err(ConfigError::EmptyWorkflow);
    }

    names
        .iter()
        .map(|name| {
            apis.get(name)
                .map(|step| (name.clone(), step.clone()))
                .ok_or_else(|| ConfigError::MissingStep(name.clone()))
        })
        .collect()
}

impl RunConfig {
    /// Ticket pacing mode: count when `total_requests > 0`, else duration
    pub fn load_mode(&self) -> LoadMode {
        if self.total_requests > 0 {
            LoadMode::Count(self.total_requests)
        } else {
            LoadMode::Duration(Duration::from_secs(self.duration_secs))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve the workflow into ordered `(name, step)` pairs
    pub fn resolve_workflow(&self) -> Result<Vec<(String, ApiStepConfig)>> {
        resolve_steps(&self.apis, &self.workflow)
    }

    /// Check everything that would make a run fail before it starts
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        for (name, step) in self.resolve_workflow()? {
            let valid_method = !step.method.is_empty()
                && step.method.bytes().all(|b| b.is_ascii_alphabetic());
            if !valid_method {
                return Err(ConfigError::InvalidMethod {
                    step: name,
                    method: step.method,
                });
            }
        }

        Ok(())
    }

    pub fn with_test_data(mut self, records: Vec<TestDataRecord>) -> Self {
        self.test_data = Some(records);
        self
    }
}
