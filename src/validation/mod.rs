//! Request validation engine.
//!
//! Every validator takes a fully populated DTO and returns either `None`
//! (pass) or the message for the *first* violated rule; rule order is part of
//! the contract. Validators are pure functions of their input plus the
//! provider catalog and never panic on malformed-but-representable input.
//!
//! Only the message validator is async, because image sniffing runs under a
//! wall-clock budget ([`image::SNIFF_TIMEOUT`]); everything else completes
//! without blocking.

pub mod image;

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{ProviderCatalog, ServiceHost, ANTHROPIC_CONTEXT_WINDOW};
use crate::types::{comma_joined, Message, Property, Role, SystemTool, Tool};
use crate::types::{CompletionRequest, ProfileOptions};

use image::ImageRejection;

/// Allowed `type` values for tool properties.
const VALID_PROPERTY_TYPES: [&str; 8] = [
    "char", "string", "bool", "int", "double", "float", "date", "enum",
];

const MAX_NAME_LEN: usize = 40;
const MAX_COLUMN_LEN: usize = 255;
const MAX_SYSTEM_MESSAGE_LEN: usize = 2040;
const MAX_REFERENCE_PROFILES: usize = 3;
const MAX_FUNCTION_NAME_LEN: usize = 64;
const MAX_FUNCTION_DESCRIPTION_LEN: usize = 512;
const MAX_EXECUTION_URL_LEN: usize = 4000;
const MAX_PROPERTY_DESCRIPTION_LEN: usize = 200;
const MAX_MESSAGE_CONTENT_LEN: usize = 32_000;

fn is_blank(value: Option<&str>) -> bool {
    value.map(|s| s.trim().is_empty()).unwrap_or(true)
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Validates chat requests, profiles, tools and messages against the
/// provider catalog and the fixed structural limits.
#[derive(Clone)]
pub struct ValidationEngine {
    catalog: Arc<ProviderCatalog>,
}

impl ValidationEngine {
    pub fn new(catalog: Arc<ProviderCatalog>) -> Self {
        Self { catalog }
    }

    /// Validate a full chat request: profile name, profile options (with the
    /// message list available for token budgeting), then the messages.
    pub async fn validate_chat_request(&self, request: &CompletionRequest) -> Option<String> {
        if request.profile_options.name.is_none() {
            return Some("A profile name must be included in the request body or route.".into());
        }
        if let Some(message) =
            self.validate_profile_options(&request.profile_options, Some(&request.messages))
        {
            return Some(message);
        }
        self.validate_message_list(&request.messages).await
    }

    /// Validate a profile being created or updated through the profile API.
    pub fn validate_api_profile(&self, profile: &ProfileOptions) -> Option<String> {
        let name = profile.name.as_deref();
        if is_blank(name) {
            return Some("The 'Name' field is required.".into());
        }
        if name.map(|n| n.eq_ignore_ascii_case("all")).unwrap_or(false) {
            return Some("Profile name 'all' conflicts with the profile/get/all route.".into());
        }
        self.validate_profile_options(profile, None)
    }

    /// Validate profile options, optionally against a message list for the
    /// combined prompt-plus-completion token check.
    pub fn validate_profile_options(
        &self,
        profile: &ProfileOptions,
        messages: Option<&[Message]>,
    ) -> Option<String> {
        let model = match profile.model.as_deref().filter(|m| !m.is_empty()) {
            Some(model) => model,
            None => return Some("The model parameter is required.".into()),
        };
        if profile.host == ServiceHost::Unspecified {
            return Some("The host parameter is required.".into());
        }

        if !self.catalog.supports(profile.host, model) {
            let allowed = self.catalog.allowed_models(profile.host);
            let host_name = match profile.host {
                ServiceHost::Azure => "Azure",
                ServiceHost::OpenAI => "OpenAI",
                ServiceHost::Anthropic => "Anthropic",
                ServiceHost::Unspecified => unreachable!(),
            };
            return Some(format!(
                "The provided model name is not supported by {}. Supported model names include: {}.",
                host_name,
                comma_joined(&allowed)
            ));
        }

        if let Some(penalty) = profile.frequency_penalty {
            if !(-2.0..=2.0).contains(&penalty) {
                return Some("FrequencyPenalty must be a value between -2 and 2.".into());
            }
        }
        if let Some(penalty) = profile.presence_penalty {
            if !(-2.0..=2.0).contains(&penalty) {
                return Some("PresencePenalty must be a value between -2 and 2.".into());
            }
        }
        if let Some(temperature) = profile.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Some("Temperature must be a value between 0 and 2.".into());
            }
        }
        if let Some(top_p) = profile.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Some("TopP must be a value between 0 and 1.".into());
            }
        }
        if profile.max_tokens == Some(0) {
            return Some("MaxTokens must be at least 1.".into());
        }
        if let Some(references) = profile.reference_profiles.as_deref() {
            if references.len() > MAX_REFERENCE_PROFILES {
                return Some("The 'ReferenceProfiles' field must contain 3 or fewer profiles.".into());
            }
            for reference in references {
                if char_len(reference) > MAX_NAME_LEN {
                    return Some(
                        "The 'ReferenceProfiles' field exceeds the maximum allowed length of 40 characters."
                            .into(),
                    );
                }
            }
        }

        if let Some(message) = self.validate_host_constraints(profile, messages) {
            return Some(message);
        }

        if let Some(top_logprobs) = profile.top_logprobs {
            if top_logprobs > 5 {
                return Some("TopLogprobs must be a value between 0 and 5.".into());
            }
        }
        if let Some(format) = profile.response_format.as_deref() {
            if format != "text" && format != "json" {
                return Some(
                    "If ResponseFormat is set, it must either be equal to 'text' or 'json'.".into(),
                );
            }
        }

        if let Some(message) = Self::validate_column_lengths(profile, model) {
            return Some(message);
        }

        if let Some(tools) = profile.tools.as_deref() {
            for tool in tools {
                if let Some(message) = self.validate_tool(tool) {
                    return Some(message);
                }
            }
        }
        None
    }

    /// Host-specific parameter constraints: context windows, penalty support,
    /// log-probability support.
    fn validate_host_constraints(
        &self,
        profile: &ProfileOptions,
        messages: Option<&[Message]>,
    ) -> Option<String> {
        match profile.host {
            ServiceHost::OpenAI => {
                let model = profile.model.as_deref().unwrap_or_default();
                let window = self.catalog.openai_context_window(model);
                if let Some(max_tokens) = profile.max_tokens {
                    if max_tokens > window {
                        return Some(format!(
                            "For OpenAI, MaxTokens cannot exceed {} for the selected model.",
                            window
                        ));
                    }
                    if let Some(messages) = messages {
                        let prompt_tokens = estimate_token_count(messages);
                        if prompt_tokens + max_tokens as usize > window as usize {
                            return Some(format!(
                                "The combined token count of the prompt ({}) and the requested max tokens ({}) exceeds the model's capacity of {} tokens.",
                                prompt_tokens, max_tokens, window
                            ));
                        }
                    }
                }
                None
            }
            ServiceHost::Anthropic => {
                let window = ANTHROPIC_CONTEXT_WINDOW;
                if let Some(max_tokens) = profile.max_tokens {
                    if max_tokens > window {
                        return Some(format!(
                            "For Anthropic, MaxTokens should not exceed {}.",
                            window
                        ));
                    }
                }
                if profile.frequency_penalty.unwrap_or(0.0) != 0.0
                    || profile.presence_penalty.unwrap_or(0.0) != 0.0
                {
                    return Some(
                        "Frequency and Presence penalties are not supported for Anthropic and must be set to 0 or null."
                            .into(),
                    );
                }
                if let (Some(max_tokens), Some(messages)) = (profile.max_tokens, messages) {
                    let prompt_tokens = estimate_token_count(messages);
                    if prompt_tokens + max_tokens as usize > window as usize {
                        return Some(format!(
                            "The combined token count of the prompt ({}) and the requested max tokens ({}) exceeds the Anthropic model's capacity of {} tokens.",
                            prompt_tokens, max_tokens, window
                        ));
                    }
                }
                None
            }
            ServiceHost::Azure => {
                // Azure endpoints do not return token-level log probabilities.
                if profile.top_logprobs.unwrap_or(0) != 0 {
                    return Some(
                        "The Azure endpoint does not support TopLogprobs. Please set TopLogprobs to 0 or leave it unset."
                            .into(),
                    );
                }
                None
            }
            ServiceHost::Unspecified => None,
        }
    }

    /// Storage column ceilings shared with the persistence collaborator.
    fn validate_column_lengths(profile: &ProfileOptions, model: &str) -> Option<String> {
        if let Some(name) = profile.name.as_deref() {
            if char_len(name) > MAX_NAME_LEN {
                return Some(
                    "The 'Name' field exceeds the maximum allowed length of 40 characters.".into(),
                );
            }
        }
        if char_len(model) > MAX_COLUMN_LEN {
            return Some(
                "The 'Model' field exceeds the maximum allowed length of 255 characters.".into(),
            );
        }
        if let Some(format) = profile.response_format.as_deref() {
            if char_len(format) > MAX_COLUMN_LEN {
                return Some(
                    "The 'ResponseFormat' field exceeds the maximum allowed length of 255 characters."
                        .into(),
                );
            }
        }
        if let Some(user) = profile.user.as_deref() {
            if char_len(user) > MAX_COLUMN_LEN {
                return Some(
                    "The 'User' field exceeds the maximum allowed length of 255 characters.".into(),
                );
            }
        }
        if let Some(system_message) = profile.system_message.as_deref() {
            if char_len(system_message) > MAX_SYSTEM_MESSAGE_LEN {
                return Some(
                    "The 'SystemMessage' field exceeds the maximum allowed length of 2040 characters."
                        .into(),
                );
            }
        }
        if let Some(stop) = profile.stop.as_deref() {
            if char_len(&comma_joined(stop)) > MAX_COLUMN_LEN {
                return Some(
                    "The 'Stop' field exceeds the maximum allowed length of 255 characters. Please note that separators are added between entries, adding +1 to each one's character count."
                        .into(),
                );
            }
        }
        if let Some(references) = profile.reference_profiles.as_deref() {
            if char_len(&comma_joined(references)) > MAX_SYSTEM_MESSAGE_LEN {
                return Some(
                    "The 'ReferenceProfiles' field exceeds the maximum allowed length of 2040 characters."
                        .into(),
                );
            }
        }
        None
    }

    /// Validate one tool definition.
    pub fn validate_tool(&self, tool: &Tool) -> Option<String> {
        let name = match tool.name() {
            Some(name) => name,
            None => return Some("A function name is required for all tools.".into()),
        };
        if char_len(name) > MAX_FUNCTION_NAME_LEN {
            return Some(
                "The function name exceeds the maximum allowed length of 64 characters.".into(),
            );
        }
        if name.eq_ignore_ascii_case("all") {
            return Some("Tool name 'all' conflicts with the tool/get/all route.".into());
        }
        for reserved in SystemTool::ALL {
            if name.eq_ignore_ascii_case(reserved.as_str()) {
                return Some(format!(
                    "The function name '{}' is reserved.",
                    reserved.as_str()
                ));
            }
        }
        if let Some(description) = tool.function.description.as_deref() {
            if char_len(description) > MAX_FUNCTION_DESCRIPTION_LEN {
                return Some(
                    "The function description exceeds the maximum allowed length of 512 characters."
                        .into(),
                );
            }
        }
        if let Some(url) = tool.execution_url.as_deref() {
            if char_len(url) > MAX_EXECUTION_URL_LEN {
                return Some("The tool ExecutionUrl exceeds the maximum length of 4000 characters.".into());
            }
        }
        if let Some(key) = tool.execution_base64_key.as_deref() {
            if char_len(key) > MAX_COLUMN_LEN {
                return Some(
                    "The tool ExecutionBase64Key exceeds the maximum length of 255 characters.".into(),
                );
            }
        }
        if let Some(method) = tool.execution_method.as_deref() {
            if char_len(method) > MAX_COLUMN_LEN {
                return Some(
                    "The tool ExecutionMethod exceeds the maximum length of 255 characters.".into(),
                );
            }
        }
        if let Some(required) = tool.function.parameters.required.as_deref() {
            for property in required {
                if !tool.function.parameters.properties.contains_key(property) {
                    return Some(format!(
                        "Required property {} does not exist in the tool {}'s properties list.",
                        property, name
                    ));
                }
            }
        }
        if !tool.function.parameters.properties.is_empty() {
            return self.validate_properties(&tool.function.parameters.properties);
        }
        None
    }

    /// Validate a tool's property map.
    pub fn validate_properties(&self, properties: &HashMap<String, Property>) -> Option<String> {
        for (name, property) in properties {
            let property_type = match property.property_type.as_deref() {
                Some(t) => t,
                None => {
                    return Some(format!("The field 'type' for property {} is required.", name))
                }
            };
            if !VALID_PROPERTY_TYPES.contains(&property_type) {
                return Some(format!(
                    "The 'type' field '{}' for property {} is invalid. Please ensure one of the following types is selected: {}.",
                    property_type,
                    name,
                    VALID_PROPERTY_TYPES.join(", ")
                ));
            }
            if let Some(description) = property.description.as_deref() {
                if char_len(description) > MAX_PROPERTY_DESCRIPTION_LEN {
                    return Some("Tool property descriptions cannot exceed 200 characters.".into());
                }
            }
            if char_len(name) > MAX_FUNCTION_NAME_LEN {
                return Some("Tool property names cannot exceed 64 characters.".into());
            }
        }
        None
    }

    /// Validate a message list: non-empty, at least one user message, and
    /// every message individually valid.
    pub async fn validate_message_list(&self, messages: &[Message]) -> Option<String> {
        if messages.is_empty() {
            return Some("The messages array was null or empty.".into());
        }
        if !messages.iter().any(|m| m.role == Some(Role::User)) {
            return Some(
                "The messages array must contain at least one user message, but contains none."
                    .into(),
            );
        }
        for message in messages {
            if let Some(error) = self.validate_message(message).await {
                return Some(error);
            }
        }
        None
    }

    /// Validate a single message, including bounded-time image sniffing.
    pub async fn validate_message(&self, message: &Message) -> Option<String> {
        if message.role.is_none() {
            return Some("A role must be provided for each message.".into());
        }
        if is_blank(message.content.as_deref()) && is_blank(message.base64_image.as_deref()) {
            return Some("All messages must contain content or an image.".into());
        }
        if let Some(user) = message.user.as_deref() {
            if char_len(user) > MAX_COLUMN_LEN {
                return Some(
                    "The user name exceeds the maximum allowed length of 255 characters.".into(),
                );
            }
        }
        if let Some(content) = message.content.as_deref() {
            if char_len(content) > MAX_MESSAGE_CONTENT_LEN {
                return Some(
                    "The message content exceeds the maximum allowed length of 32,000 characters."
                        .into(),
                );
            }
        }
        if let Some(payload) = message.base64_image.as_deref() {
            if !is_blank(Some(payload)) {
                match image::validate_base64_image(payload).await {
                    Ok(_) => {}
                    Err(ImageRejection::TooLarge) => {
                        return Some("The image size exceeds the maximum allowed size of 20MB.".into())
                    }
                    // Encoding, format, and timeout failures collapse to one
                    // public message by contract.
                    Err(_) => return Some("The image provided is not valid.".into()),
                }
            }
        }
        None
    }
}

/// Whitespace-split word count summed across the list. An approximation by
/// design: it keeps the core independent of any provider tokenizer and is
/// only used for the combined prompt-plus-completion budget check.
pub fn estimate_token_count(messages: &[Message]) -> usize {
    messages
        .iter()
        .filter_map(|m| m.content.as_deref())
        .map(|content| content.split_whitespace().count())
        .sum()
}
