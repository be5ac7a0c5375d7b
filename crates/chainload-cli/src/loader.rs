//! Configuration and test-data loading

use anyhow::{bail, Context, Result};
use chainload_core::{ApiStepConfig, ConfigError, RunConfig, TestDataRecord};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Supported configuration file formats, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            _ => bail!(ConfigError::load(
                path.display().to_string(),
                "expected a .json or .toml file"
            )),
        }
    }
}

fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = Format::of(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let parsed = match format {
        Format::Json => serde_json::from_str(&text)
            .map_err(|e| ConfigError::load(path.display().to_string(), e))?,
        Format::Toml => {
            toml::from_str(&text).map_err(|e| ConfigError::load(path.display().to_string(), e))?
        }
    };
    Ok(parsed)
}

/// Load the run configuration
pub fn load_run_config(path: &Path) -> Result<RunConfig> {
    let config: RunConfig = load_file(path)?;
    debug!(path = %path.display(), steps = config.apis.len(), "Loaded run configuration");
    Ok(config)
}

/// Load a step-name → API map from its own file
pub fn load_api_map(path: &Path) -> Result<HashMap<String, ApiStepConfig>> {
    let apis: HashMap<String, ApiStepConfig> = load_file(path)?;
    debug!(path = %path.display(), steps = apis.len(), "Loaded API definitions");
    Ok(apis)
}

/// Load CSV test data; the header row names the fields of every record
pub fn load_test_data(path: &Path) -> Result<Vec<TestDataRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open test data {}", path.display()))?;

    let headers = reader
        .headers()
        .map_err(|e| ConfigError::load(path.display().to_string(), e))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ConfigError::load(path.display().to_string(), e))?;
        let record: TestDataRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        records.push(record);
    }

    info!(path = %path.display(), records = records.len(), "Loaded test data");
    Ok(records)
}
