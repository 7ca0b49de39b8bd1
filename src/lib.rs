//! # completion-hub
//!
//! Request validation and resilient multi-endpoint dispatch for
//! multi-provider AI completions.
//!
//! ## Overview
//!
//! This crate fronts several AI providers (Azure OpenAI, OpenAI, Anthropic)
//! behind a single completion API. It does two jobs:
//!
//! - **Validation**: reject malformed or policy-violating requests before any
//!   network call is made, with the first violated rule's message reported
//!   verbatim.
//! - **Dispatch**: route accepted requests across each host's pool of
//!   interchangeable endpoints with round-robin load distribution, bounded
//!   retry with jittered backoff, and a per-pool circuit breaker.
//!
//! Persistence, HTTP routing, and streaming transport are collaborator
//! concerns; this crate defines their contracts ([`store`],
//! [`providers::ProviderClient`], the normalized
//! [`CompletionResponse`]) and nothing more.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use completion_hub::{CompletionRequest, Dispatcher, OpenAiClient, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), completion_hub::Error> {
//!     let settings = Settings::from_yaml(r#"
//! catalog:
//!   openai_models:
//!     gpt-4o: 128000
//! endpoints:
//!   openai: ["https://api.openai.com"]
//! "#)?;
//!     let dispatcher = Dispatcher::new(
//!         &settings,
//!         vec![Arc::new(OpenAiClient::new("api-key")?)],
//!     )?;
//!
//!     let request: CompletionRequest = serde_json::from_str(r#"{
//!         "profileOptions": { "name": "assistant", "host": "openai", "model": "gpt-4o" },
//!         "messages": [{ "role": "user", "content": "Hello" }]
//!     }"#).expect("request json");
//!
//!     let response = dispatcher.dispatch(&request, &CancellationToken::new()).await?;
//!     println!("{}", response.content.unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`catalog`] | Host enum and per-host model allow-lists |
//! | [`config`] | Value-only configuration surface |
//! | [`types`] | Profile, tool, message, and completion DTOs |
//! | [`validation`] | Ordered first-failure request validators |
//! | [`pool`] | Endpoint pools and round-robin selection |
//! | [`resilience`] | Retry, circuit breaker, cancellation-aware executor |
//! | [`providers`] | Provider clients and attempt-level error classification |
//! | [`dispatch`] | End-to-end dispatch orchestration |
//! | [`store`] | Persistence collaborator contracts and record mapping |

pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pool;
pub mod providers;
pub mod resilience;
pub mod store;
pub mod types;
pub mod validation;

pub use catalog::{ProviderCatalog, ServiceHost};
pub use config::Settings;
pub use dispatch::Dispatcher;
pub use error::{Error, FailureKind};
pub use providers::{AnthropicClient, AzureClient, OpenAiClient, ProviderClient};
pub use types::{
    CompletionRequest, CompletionResponse, Message, ProfileOptions, Role, Tool, ToolCall, Usage,
};
pub use validation::ValidationEngine;

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
