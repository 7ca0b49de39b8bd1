//! Azure OpenAI client.
//!
//! Differences from the OpenAI endpoint: the deployment (model) name lives in
//! the URL path, authentication uses the `api-key` header, and an
//! `api-version` query parameter is required. The body and response shapes
//! are otherwise OpenAI-compatible.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::catalog::ServiceHost;
use crate::error::Error;
use crate::types::{CompletionRequest, CompletionResponse};

use super::{
    apply_openai_style_options, build_http_client, openai_style_messages, parse_openai_style,
    status_error, ProviderCallError, ProviderClient,
};

const API_VERSION: &str = "2024-02-01";

pub struct AzureClient {
    http: reqwest::Client,
    api_key: String,
}

impl AzureClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            http: build_http_client()?,
            api_key: api_key.into(),
        })
    }

    fn build_body(request: &CompletionRequest) -> Value {
        // No model field: Azure routes by deployment in the path.
        let mut body = json!({ "messages": openai_style_messages(request) });
        apply_openai_style_options(&mut body, request);
        body
    }
}

#[async_trait]
impl ProviderClient for AzureClient {
    fn host(&self) -> ServiceHost {
        ServiceHost::Azure
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        endpoint: &str,
    ) -> Result<CompletionResponse, ProviderCallError> {
        let deployment = request.profile_options.model.as_deref().unwrap_or_default();
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            API_VERSION
        );
        let resp = self
            .http
            .post(&url)
            .header("api-key", &self.api_key)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, ProfileOptions};

    #[test]
    fn test_body_has_no_model_field() {
        let request = CompletionRequest {
            profile_options: ProfileOptions::new("p", ServiceHost::Azure, "gpt-4o-deployment"),
            messages: vec![Message::user_text("hi")],
        };
        let body = AzureClient::build_body(&request);
        assert!(body.get("model").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }
}
