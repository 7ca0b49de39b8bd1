//! Anthropic Messages API client. Handles the key differences from the
//! OpenAI shape:
//! - System text is a top-level `system` parameter, not a message.
//! - Content uses typed blocks; images are base64 source blocks.
//! - `max_tokens` is required, not optional.
//! - The response carries `content` blocks and a `stop_reason` that is
//!   normalized into the shared finish-reason vocabulary.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::ServiceHost;
use crate::error::Error;
use crate::types::{CompletionRequest, CompletionResponse, Role, ToolCall, Usage};
use crate::validation::image::sniff_base64_prefix;

use super::{build_http_client, status_error, ProviderCallError, ProviderClient};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            http: build_http_client()?,
            api_key: api_key.into(),
        })
    }

    /// System text is pulled out of the message list; the rest become typed
    /// content blocks.
    fn split_messages(request: &CompletionRequest) -> (Option<String>, Vec<Value>) {
        let mut system_parts: Vec<String> = Vec::new();
        if let Some(system) = request
            .profile_options
            .system_message
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            system_parts.push(system.to_string());
        }

        let mut wire = Vec::new();
        for message in &request.messages {
            let role = message.role.unwrap_or(Role::User);
            let content = message.content.as_deref().unwrap_or_default();
            if role == Role::System {
                if !content.is_empty() {
                    system_parts.push(content.to_string());
                }
                continue;
            }
            let role = match role {
                Role::Assistant => "assistant",
                _ => "user",
            };

            let mut blocks = Vec::new();
            if !content.is_empty() {
                blocks.push(json!({ "type": "text", "text": content }));
            }
            if let Some(image) = message.base64_image.as_deref().filter(|i| !i.is_empty()) {
                let media_type = sniff_base64_prefix(image)
                    .map(|f| f.media_type())
                    .unwrap_or("image/png");
                blocks.push(json!({
                    "type": "image",
                    "source": { "type": "base64", "media_type": media_type, "data": image }
                }));
            }
            wire.push(json!({ "role": role, "content": blocks }));
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, wire)
    }

    fn build_body(request: &CompletionRequest) -> Value {
        let profile = &request.profile_options;
        let (system, messages) = Self::split_messages(request);

        let mut body = json!({
            "model": profile.model.as_deref().unwrap_or_default(),
            "messages": messages,
            "max_tokens": profile.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = profile.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = profile.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(stop) = profile.stop.as_deref() {
            body["stop_sequences"] = json!(stop);
        }
        if let Some(tools) = profile.tools.as_deref().filter(|t| !t.is_empty()) {
            body["tools"] = json!(tools
                .iter()
                .filter_map(|tool| {
                    let definition = super::tool_definitions(std::slice::from_ref(tool))
                        .into_iter()
                        .next()?;
                    let function = &definition["function"];
                    let mut wire = json!({
                        "name": function["name"],
                        "input_schema": function["parameters"],
                    });
                    if let Some(description) = function.get("description") {
                        wire["description"] = description.clone();
                    }
                    Some(wire)
                })
                .collect::<Vec<Value>>());
        }
        body
    }

    fn parse_body(body: &Value) -> CompletionResponse {
        let content = body
            .pointer("/content/0/text")
            .and_then(|v| v.as_str())
            .map(String::from);

        let finish_reason = body
            .get("stop_reason")
            .and_then(|v| v.as_str())
            .map(|reason| match reason {
                "end_turn" => "stop".to_string(),
                "max_tokens" => "length".to_string(),
                "tool_use" => "tool_calls".to_string(),
                other => other.to_string(),
            });

        let tool_calls = body
            .get("content")
            .and_then(|c| c.as_array())
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("tool_use"))
                    .filter_map(|b| {
                        Some(ToolCall {
                            id: b.get("id").and_then(|v| v.as_str()).map(String::from),
                            name: b.get("name")?.as_str()?.to_string(),
                            arguments: b.get("input").cloned().unwrap_or(Value::Null),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage = body.get("usage").map(|u| {
            let prompt = u["input_tokens"].as_u64().unwrap_or(0);
            let completion = u["output_tokens"].as_u64().unwrap_or(0);
            Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }
        });

        CompletionResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        }
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn host(&self) -> ServiceHost {
        ServiceHost::Anthropic
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        endpoint: &str,
    ) -> Result<CompletionResponse, ProviderCallError> {
        let url = format!("{}/v1/messages", endpoint.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&Self::build_body(request))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let status = resp.status().as_u16();
        let body: Value = resp.json().await.map_err(|e| ProviderCallError::Malformed {
            status,
            message: e.to_string(),
        })?;
        Ok(Self::parse_body(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ProfileOptions};

    fn request() -> CompletionRequest {
        CompletionRequest {
            profile_options: ProfileOptions::new(
                "claude",
                ServiceHost::Anthropic,
                "claude-3-5-sonnet-20241022",
            ),
            messages: vec![Message::user_text("Hello")],
        }
    }

    #[test]
    fn test_system_message_is_top_level() {
        let mut request = request();
        request.profile_options.system_message = Some("You are helpful.".into());
        let body = AnthropicClient::build_body(&request);
        assert_eq!(body["system"], "You are helpful.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["content"][0]["text"], "Hello");
    }

    #[test]
    fn test_max_tokens_always_present() {
        let body = AnthropicClient::build_body(&request());
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);

        let mut request = request();
        request.profile_options.max_tokens = Some(2000);
        let body = AnthropicClient::build_body(&request);
        assert_eq!(body["max_tokens"], 2000);
    }

    #[test]
    fn test_stop_reason_normalization() {
        let body = json!({
            "content": [{ "type": "text", "text": "Hi" }],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 10, "output_tokens": 5 }
        });
        let response = AnthropicClient::parse_body(&body);
        assert_eq!(response.content.as_deref(), Some("Hi"));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_tool_use_blocks_become_tool_calls() {
        let body = json!({
            "content": [
                { "type": "text", "text": "" },
                { "type": "tool_use", "id": "tu_1", "name": "weather_lookup", "input": { "city": "Oslo" } }
            ],
            "stop_reason": "tool_use"
        });
        let response = AnthropicClient::parse_body(&body);
        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "weather_lookup");
        assert_eq!(response.tool_calls[0].arguments["city"], "Oslo");
    }
}
