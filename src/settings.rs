// SPDX-License-Identifier: MIT

//! Service settings
//!
//! Values come from built-in defaults, then an optional YAML file, then
//! environment variables (which `main` seeds from `.env` first).

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::FlowError;
use crate::workflow::ExecutionLimits;

#[derive(Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub redis_url: String,
    pub openai_api_key: Option<String>,
    pub openai_endpoint: Option<String>,
    /// Maximum accepted document size in bytes
    pub max_file_size: usize,
    pub max_concurrent_workflows: usize,
    /// Seconds; 0 disables the limit
    pub workflow_timeout: u64,
    pub host: String,
    pub port: u16,
    pub max_refinement_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:///./instance/app.db".to_string(),
            redis_url: "redis://localhost:6379/0".to_string(),
            openai_api_key: None,
            openai_endpoint: None,
            max_file_size: 50 * 1024 * 1024,
            max_concurrent_workflows: 10,
            workflow_timeout: 3600,
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_refinement_attempts: 3,
        }
    }
}

impl Settings {
    /// Load settings from `path` (if any) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, FlowError> {
        let mut settings = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(utf8_vars(std::env::vars_os()))?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, FlowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::config(format!("Failed to read settings file {:?}: {}", path, e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, FlowError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| FlowError::config(format!("Invalid settings file: {}", e)))
    }

    /// Override fields from `KEY=value` pairs; key matching ignores case
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), FlowError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.to_ascii_uppercase().as_str() {
                "DATABASE_URL" => self.database_url = value,
                "REDIS_URL" => self.redis_url = value,
                "OPENAI_API_KEY" => self.openai_api_key = Some(value),
                "OPENAI_ENDPOINT" => self.openai_endpoint = Some(value),
                "MAX_FILE_SIZE" => self.max_file_size = parse_number(&key, &value)?,
                "MAX_CONCURRENT_WORKFLOWS" => {
                    self.max_concurrent_workflows = parse_number(&key, &value)?
                }
                "WORKFLOW_TIMEOUT" => self.workflow_timeout = parse_number(&key, &value)?,
                "HOST" => self.host = value,
                "PORT" => self.port = parse_number(&key, &value)?,
                "MAX_REFINEMENT_ATTEMPTS" => {
                    self.max_refinement_attempts = parse_number(&key, &value)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn execution_limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            max_concurrent: self.max_concurrent_workflows,
            timeout: (self.workflow_timeout > 0)
                .then(|| Duration::from_secs(self.workflow_timeout)),
            max_document_bytes: self.max_file_size,
            max_refinement_attempts: self.max_refinement_attempts,
        }
    }
}

/// Keep the variables whose key and value are both valid UTF-8
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                log::debug!("Skipping non UTF-8 environment variable {:?}", key);
                None
            }
        })
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, FlowError> {
    value
        .trim()
        .parse()
        .map_err(|_| FlowError::config(format!("{} must be a number, got '{}'", key, value)))
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("database_url", &self.database_url)
            .field("redis_url", &self.redis_url)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("openai_endpoint", &self.openai_endpoint)
            .field("max_file_size", &self.max_file_size)
            .field("max_concurrent_workflows", &self.max_concurrent_workflows)
            .field("workflow_timeout", &self.workflow_timeout)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_refinement_attempts", &self.max_refinement_attempts)
            .finish()
    }
}
