//! Provider clients: one per host, all speaking the same trait.
//!
//! Clients perform exactly one attempt per call; retry, breaker, and
//! cancellation live in the resilience executor. Failures are classified at
//! the attempt level so the executor can decide what to do without inspecting
//! provider-specific payloads.

pub mod anthropic;
pub mod azure;
pub mod openai;
pub mod tool;

pub use anthropic::AnthropicClient;
pub use azure::AzureClient;
pub use openai::OpenAiClient;
pub use tool::ToolExecutionClient;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::catalog::ServiceHost;
use crate::error::Error as DispatchError;
use crate::types::{CompletionRequest, CompletionResponse, Role, Tool, ToolCall, Usage};
use crate::validation::image::sniff_base64_prefix;

/// Connect/read timeout applied to every provider HTTP client.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a single attempt against one endpoint.
#[derive(Debug, Error)]
pub enum ProviderCallError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The provider answered but the body could not be interpreted.
    #[error("HTTP {status}: {message}")]
    Malformed { status: u16, message: String },
}

impl ProviderCallError {
    /// Transient outcomes worth another attempt: network trouble, server
    /// errors, request timeout, and explicit rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            Self::Malformed { .. } => false,
        }
    }

    /// Failures that count toward opening the pool's circuit: transport
    /// errors and status >= 500. Rate limiting does not qualify.
    pub fn trips_breaker(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed { .. } => false,
        }
    }
}

/// A completion client for one provider host.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn host(&self) -> ServiceHost;

    /// Run one completion attempt against the given endpoint address.
    async fn complete(
        &self,
        request: &CompletionRequest,
        endpoint: &str,
    ) -> Result<CompletionResponse, ProviderCallError>;
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, DispatchError> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| DispatchError::configuration(format!("failed to build HTTP client: {}", e)))
}

/// Read a non-2xx response into a classified attempt error.
pub(crate) async fn status_error(resp: reqwest::Response) -> ProviderCallError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    ProviderCallError::Status { status, message }
}

/// Messages in the OpenAI chat wire shape, with the profile's system message
/// prepended and images carried as data URLs.
pub(crate) fn openai_style_messages(request: &CompletionRequest) -> Vec<Value> {
    let mut wire = Vec::new();
    if let Some(system) = request
        .profile_options
        .system_message
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        wire.push(json!({ "role": "system", "content": system }));
    }
    for message in &request.messages {
        let role = message.role.unwrap_or(Role::User).as_str();
        let content = message.content.as_deref().unwrap_or_default();
        match message.base64_image.as_deref().filter(|i| !i.is_empty()) {
            Some(image) => {
                let media_type = sniff_base64_prefix(image)
                    .map(|f| f.media_type())
                    .unwrap_or("image/png");
                let mut parts = Vec::new();
                if !content.is_empty() {
                    parts.push(json!({ "type": "text", "text": content }));
                }
                parts.push(json!({
                    "type": "image_url",
                    "image_url": { "url": format!("data:{};base64,{}", media_type, image) }
                }));
                wire.push(json!({ "role": role, "content": parts }));
            }
            None => wire.push(json!({ "role": role, "content": content })),
        }
    }
    wire
}

/// Function definitions in the OpenAI tools wire shape. Only the schema
/// fields are sent; execution metadata stays server-side.
pub(crate) fn tool_definitions(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .filter_map(|tool| {
            let name = tool.name()?;
            let properties: Value = tool
                .function
                .parameters
                .properties
                .iter()
                .map(|(key, property)| {
                    let mut schema = json!({
                        "type": property.property_type.as_deref().unwrap_or("string")
                    });
                    if let Some(description) = property.description.as_deref() {
                        schema["description"] = json!(description);
                    }
                    (key.clone(), schema)
                })
                .collect::<serde_json::Map<String, Value>>()
                .into();
            let mut function = json!({
                "name": name,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                }
            });
            if let Some(description) = tool.function.description.as_deref() {
                function["description"] = json!(description);
            }
            if let Some(required) = tool.function.parameters.required.as_deref() {
                function["parameters"]["required"] = json!(required);
            }
            Some(json!({ "type": "function", "function": function }))
        })
        .collect()
}

/// Sampling parameters shared by the OpenAI and Azure chat endpoints.
pub(crate) fn apply_openai_style_options(body: &mut Value, request: &CompletionRequest) {
    let profile = &request.profile_options;
    if let Some(temperature) = profile.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(top_p) = profile.top_p {
        body["top_p"] = json!(top_p);
    }
    if let Some(penalty) = profile.frequency_penalty {
        body["frequency_penalty"] = json!(penalty);
    }
    if let Some(penalty) = profile.presence_penalty {
        body["presence_penalty"] = json!(penalty);
    }
    if let Some(max_tokens) = profile.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(user) = profile.user.as_deref() {
        body["user"] = json!(user);
    }
    if let Some(stop) = profile.stop.as_deref() {
        body["stop"] = json!(stop);
    }
    if let Some(top_logprobs) = profile.top_logprobs.filter(|n| *n > 0) {
        body["logprobs"] = json!(true);
        body["top_logprobs"] = json!(top_logprobs);
    }
    if profile.response_format.as_deref() == Some("json") {
        body["response_format"] = json!({ "type": "json_object" });
    }
    if let Some(tools) = profile.tools.as_deref().filter(|t| !t.is_empty()) {
        body["tools"] = json!(tool_definitions(tools));
    }
}

/// Normalize an OpenAI-style chat completion body.
pub(crate) fn parse_openai_style(body: &Value) -> CompletionResponse {
    let content = body
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(String::from);
    let finish_reason = body
        .pointer("/choices/0/finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let tool_calls = body
        .pointer("/choices/0/message/tool_calls")
        .and_then(|v| v.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let name = call.pointer("/function/name")?.as_str()?.to_string();
                    // Arguments arrive as a JSON-encoded string.
                    let arguments = call
                        .pointer("/function/arguments")
                        .and_then(|v| v.as_str())
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or(Value::Null);
                    Some(ToolCall {
                        id: call.get("id").and_then(|v| v.as_str()).map(String::from),
                        name,
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let usage = body.get("usage").map(|u| Usage {
        prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
        total_tokens: u["total_tokens"].as_u64().unwrap_or(0),
    });

    CompletionResponse {
        content,
        tool_calls,
        finish_reason,
        usage,
    }
}
