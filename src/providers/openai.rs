//! OpenAI chat completions client.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::ServiceHost;
use crate::error::Error;
use crate::types::{CompletionRequest, CompletionResponse};

use super::{
    apply_openai_style_options, build_http_client, openai_style_messages, parse_openai_style,
    status_error, ProviderCallError, ProviderClient,
};

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            http: build_http_client()?,
            api_key: api_key.into(),
        })
    }

    fn build_body(request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.profile_options.model.as_deref().unwrap_or_default(),
            "messages": openai_style_messages(request),
        });
        apply_openai_style_options(&mut body, request);
        body
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn host(&self) -> ServiceHost {
        ServiceHost::OpenAI
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        endpoint: &str,
    ) -> Result<CompletionResponse, ProviderCallError> {
        let url = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
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
        Ok(parse_openai_style(&body))
    }
}
