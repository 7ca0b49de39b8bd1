//! Webhook client for user-defined tool execution.
//!
//! When the model selects a user-defined tool, its arguments are forwarded to
//! the tool's configured execution URL. These calls go through the executor
//! with the tool retry policy (plain exponential backoff, no jitter) and no
//! circuit breaker: webhook targets are arbitrary and don't share a pool.

use serde_json::Value;

use crate::error::Error;
use crate::types::Tool;

use super::{build_http_client, status_error, ProviderCallError};

pub struct ToolExecutionClient {
    http: reqwest::Client,
}

impl ToolExecutionClient {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            http: build_http_client()?,
        })
    }

    /// Forward tool-call arguments to the tool's webhook. Non-JSON response
    /// bodies are preserved as a JSON string.
    pub async fn execute(
        &self,
        tool: &Tool,
        url: &str,
        arguments: &Value,
    ) -> Result<Value, ProviderCallError> {
        let method = tool
            .execution_method
            .as_deref()
            .unwrap_or("POST")
            .to_uppercase();
        let mut req = match method.as_str() {
            "GET" => self.http.get(url),
            "PUT" => self.http.put(url),
            "PATCH" => self.http.patch(url),
            "DELETE" => self.http.delete(url),
            _ => self.http.post(url),
        };
        if method != "GET" && method != "DELETE" {
            req = req.json(arguments);
        }
        if let Some(key) = tool.execution_base64_key.as_deref() {
            req = req.header(reqwest::header::AUTHORIZATION, format!("Basic {}", key));
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let text = resp.text().await?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
