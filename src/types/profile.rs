//! Profile configuration sent with (or stored for) completion requests.

use serde::{Deserialize, Serialize};

use crate::catalog::ServiceHost;
use crate::types::tool::Tool;

/// Generation settings plus routing metadata for one named profile.
///
/// Every scalar is optional so a partially specified request stays
/// representable; the validation engine, not the type, decides what a usable
/// profile looks like.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub name: Option<String>,
    pub host: ServiceHost,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_host: Option<ServiceHost>,
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_logprobs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_profiles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_history: Option<u32>,
}

impl ProfileOptions {
    /// Convenience constructor for the common name/host/model triple.
    pub fn new(
        name: impl Into<String>,
        host: ServiceHost,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            host,
            model: Some(model.into()),
            ..Default::default()
        }
    }
}
