//! HTTP requests

use super::{expand_opt, Task};
use crate::error::{BuildError, BuildResult};
use crate::listener::Priority;
use crate::project::Project;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Sends an HTTP request and checks the response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpRequestTask {
    pub url: String,
    /// GET, POST, PUT, DELETE, PATCH or HEAD
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// The response body must match this expression
    #[serde(default)]
    pub responseregex: Option<String>,
    #[serde(default)]
    pub responseproperty: Option<String>,
    #[serde(default)]
    pub statuscodeproperty: Option<String>,
    /// Client timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl HttpRequestTask {
    /// Create a GET request task
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Task for HttpRequestTask {
    fn execute(&self, project: &mut Project) -> BuildResult<()> {
        let url = project.expand(&self.url);
        if url.trim().is_empty() {
            return Err(BuildError::missing_attribute("http", "url"));
        }
        let method = expand_opt(project, &self.method)
            .unwrap_or_else(|| "GET".to_string())
            .to_uppercase();
        let http_err = |error: String| BuildError::Http {
            url: url.clone(),
            error,
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)))
            .build()
            .map_err(|e| http_err(format!("failed to create client: {}", e)))?;

        let mut request = match method.as_str() {
            "GET" => client.get(&url),
            "POST" => client.post(&url),
            "PUT" => client.put(&url),
            "DELETE" => client.delete(&url),
            "PATCH" => client.patch(&url),
            "HEAD" => client.head(&url),
            other => {
                return Err(BuildError::invalid_attribute(
                    "http",
                    "method",
                    format!("unsupported method '{}'", other),
                ))
            }
        };
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), project.expand(value));
        }
        if let Some(body) = expand_opt(project, &self.body) {
            request = request.body(body);
        }

        project.log(format!("Sending {} request to {}", method, url), Priority::Verbose);
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                http_err("request timed out".to_string())
            } else {
                http_err(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| http_err(format!("failed to read response body: {}", e)))?;
        project.log(format!("Response status: {}", status), Priority::Verbose);

        if let Some(property) = expand_opt(project, &self.statuscodeproperty) {
            project.set_property(property, status.to_string());
        }
        if let Some(property) = expand_opt(project, &self.responseproperty) {
            project.set_property(property, body.clone());
        }

        if !(200..300).contains(&status) {
            return Err(http_err(format!("unexpected status code {}", status)));
        }

        if let Some(pattern) = expand_opt(project, &self.responseregex) {
            let re = Regex::new(&pattern).map_err(|e| BuildError::regex(&pattern, e))?;
            if !re.is_match(&body) {
                return Err(http_err(format!("response did not match '{}'", pattern)));
            }
        }
        Ok(())
    }
}
