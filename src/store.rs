//! Persistence collaborator boundary.
//!
//! The core does not own a database; it defines the flat record shapes a
//! storage backend exchanges with it, the DTO<->record mapping (including the
//! defaults applied when a stored profile is partially specified), and the
//! repository traits a backend implements. An in-memory implementation is
//! provided for tests and embedding without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::SystemTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalog::ServiceHost;
use crate::error::Error;
use crate::types::{
    comma_joined, comma_split, Message, ProfileOptions, Property, Role, Tool, ToolFunction,
};

/// Model applied when a stored OpenAI profile has none.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
/// Model applied when a stored Anthropic profile has none.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Flat storage shape for a profile. List-valued fields are comma-joined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileRecord {
    pub id: i32,
    pub name: String,
    pub model: Option<String>,
    pub host: String,
    pub image_host: Option<String>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_logprobs: Option<u32>,
    pub response_format: Option<String>,
    pub user: Option<String>,
    pub system_message: Option<String>,
    pub stop: Option<String>,
    pub reference_profiles: Option<String>,
    pub max_message_history: Option<u32>,
}

/// Flat storage shape for a tool; properties are stored separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolRecord {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub required: String,
    pub execution_url: Option<String>,
    pub execution_method: Option<String>,
    pub execution_base64_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyRecord {
    pub id: i32,
    pub tool_id: i32,
    pub name: String,
    pub property_type: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: i32,
    pub conversation_id: Uuid,
    pub role: String,
    pub content: Option<String>,
    pub user: String,
    pub base64_image: Option<String>,
    pub timestamp: Option<SystemTime>,
}

/// Build a profile DTO from its stored record, deriving `logprobs` from the
/// stored log-probability count.
pub fn profile_from_record(record: &ProfileRecord, tools: Option<Vec<Tool>>) -> ProfileOptions {
    let top_logprobs = record.top_logprobs;
    ProfileOptions {
        id: Some(record.id),
        name: Some(record.name.clone()),
        model: record.model.clone(),
        host: ServiceHost::from_str(&record.host).unwrap_or_default(),
        image_host: record
            .image_host
            .as_deref()
            .and_then(ServiceHost::from_str),
        frequency_penalty: record.frequency_penalty,
        presence_penalty: record.presence_penalty,
        temperature: record.temperature,
        top_p: record.top_p,
        max_tokens: record.max_tokens,
        top_logprobs,
        logprobs: Some(top_logprobs.unwrap_or(0) > 0),
        response_format: record.response_format.clone(),
        user: record.user.clone(),
        system_message: record.system_message.clone(),
        stop: record.stop.as_deref().map(comma_split),
        reference_profiles: record.reference_profiles.as_deref().map(comma_split),
        tools,
        max_message_history: record.max_message_history,
    }
}

/// Merge a profile update onto an existing record (or a blank one), applying
/// the storage defaults: unset host becomes OpenAI, unset model falls back to
/// the host's default, and unset sampling parameters get their neutral
/// values.
pub fn profile_to_record(
    name: &str,
    default_azure_model: &str,
    existing: Option<ProfileRecord>,
    update: Option<&ProfileOptions>,
) -> ProfileRecord {
    let mut record = existing.unwrap_or_default();

    let mut host = update
        .map(|u| u.host)
        .filter(|h| *h != ServiceHost::Unspecified)
        .or_else(|| ServiceHost::from_str(&record.host))
        .unwrap_or(ServiceHost::Unspecified);
    if host == ServiceHost::Unspecified {
        host = ServiceHost::OpenAI;
    }

    let model = update
        .and_then(|u| u.model.clone())
        .or_else(|| record.model.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| match host {
            ServiceHost::Azure => default_azure_model.to_string(),
            ServiceHost::Anthropic => DEFAULT_ANTHROPIC_MODEL.to_string(),
            _ => DEFAULT_OPENAI_MODEL.to_string(),
        });

    record.name = name.to_string();
    record.model = Some(model);
    record.host = host.as_str().to_string();
    record.image_host = update
        .and_then(|u| u.image_host)
        .map(|h| h.as_str().to_string())
        .or(record.image_host)
        .or_else(|| Some(host.as_str().to_string()));
    record.frequency_penalty = update
        .and_then(|u| u.frequency_penalty)
        .or(record.frequency_penalty)
        .or(Some(0.0));
    record.presence_penalty = update
        .and_then(|u| u.presence_penalty)
        .or(record.presence_penalty)
        .or(Some(0.0));
    record.temperature = update
        .and_then(|u| u.temperature)
        .or(record.temperature)
        .or(Some(1.0));
    record.top_p = update.and_then(|u| u.top_p).or(record.top_p).or(Some(1.0));
    record.max_tokens = update.and_then(|u| u.max_tokens).or(record.max_tokens);
    record.top_logprobs = update.and_then(|u| u.top_logprobs).or(record.top_logprobs);
    record.response_format = update
        .and_then(|u| u.response_format.clone())
        .or(record.response_format);
    record.user = update.and_then(|u| u.user.clone()).or(record.user);
    record.system_message = update
        .and_then(|u| u.system_message.clone())
        .or(record.system_message);
    record.stop = update
        .and_then(|u| u.stop.as_deref().map(comma_joined))
        .or(record.stop);
    record.reference_profiles = update
        .and_then(|u| u.reference_profiles.as_deref().map(comma_joined))
        .or(record.reference_profiles);
    record.max_message_history = update
        .and_then(|u| u.max_message_history)
        .or(record.max_message_history);

    record
}

/// Build a tool DTO from its record and associated property records.
pub fn tool_from_record(record: &ToolRecord, properties: &[PropertyRecord]) -> Tool {
    let mut tool = Tool {
        id: Some(record.id),
        execution_url: record.execution_url.clone(),
        execution_method: record.execution_method.clone(),
        execution_base64_key: record.execution_base64_key.clone(),
        function: ToolFunction {
            name: Some(record.name.clone()),
            description: if record.description.is_empty() {
                None
            } else {
                Some(record.description.clone())
            },
            ..Default::default()
        },
    };
    for property in properties {
        tool.function.parameters.properties.insert(
            property.name.clone(),
            Property {
                id: Some(property.id),
                property_type: property.property_type.clone(),
                description: if property.description.is_empty() {
                    None
                } else {
                    Some(property.description.clone())
                },
            },
        );
    }
    if !record.required.is_empty() {
        tool.function.parameters.required = Some(comma_split(&record.required));
    }
    tool
}

pub fn tool_to_record(tool: &Tool) -> ToolRecord {
    ToolRecord {
        id: tool.id.unwrap_or(0),
        name: tool.function.name.clone().unwrap_or_default(),
        description: tool.function.description.clone().unwrap_or_default(),
        required: tool
            .function
            .parameters
            .required
            .as_deref()
            .map(comma_joined)
            .unwrap_or_default(),
        execution_url: tool.execution_url.clone(),
        execution_method: tool.execution_method.clone(),
        execution_base64_key: tool.execution_base64_key.clone(),
    }
}

pub fn property_to_record(tool_id: i32, name: &str, property: &Property) -> PropertyRecord {
    PropertyRecord {
        id: property.id.unwrap_or(0),
        tool_id,
        name: name.to_string(),
        property_type: property.property_type.clone(),
        description: property.description.clone().unwrap_or_default(),
    }
}

pub fn message_from_record(record: &MessageRecord) -> Message {
    Message {
        id: Some(record.id),
        role: Role::from_str(&record.role),
        content: record.content.clone(),
        user: if record.user.is_empty() {
            None
        } else {
            Some(record.user.clone())
        },
        base64_image: record.base64_image.clone(),
        timestamp: record.timestamp,
    }
}

pub fn message_to_record(message: &Message, conversation_id: Uuid) -> MessageRecord {
    MessageRecord {
        id: message.id.unwrap_or(0),
        conversation_id,
        role: message.role.map(|r| r.as_str().to_string()).unwrap_or_default(),
        content: message.content.clone(),
        user: message.user.clone().unwrap_or_default(),
        base64_image: message.base64_image.clone(),
        timestamp: message.timestamp,
    }
}

/// Loads and saves profile records by name.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn load(&self, name: &str) -> Result<Option<ProfileRecord>, Error>;
    async fn save(&self, record: ProfileRecord) -> Result<ProfileRecord, Error>;
    async fn delete(&self, name: &str) -> Result<bool, Error>;
}

/// Loads and saves tool records (with their properties) by tool name.
#[async_trait]
pub trait ToolRepository: Send + Sync {
    async fn load(&self, name: &str) -> Result<Option<(ToolRecord, Vec<PropertyRecord>)>, Error>;
    async fn save(
        &self,
        record: ToolRecord,
        properties: Vec<PropertyRecord>,
    ) -> Result<ToolRecord, Error>;
}

/// Map-backed profile repository for tests and database-free embedding.
#[derive(Default)]
pub struct InMemoryProfileRepository {
    entries: RwLock<HashMap<String, ProfileRecord>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn load(&self, name: &str) -> Result<Option<ProfileRecord>, Error> {
        Ok(self.entries.read().await.get(name).cloned())
    }

    async fn save(&self, record: ProfileRecord) -> Result<ProfileRecord, Error> {
        self.entries
            .write()
            .await
            .insert(record.name.clone(), record.clone());
        Ok(record)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        Ok(self.entries.write().await.remove(name).is_some())
    }
}
