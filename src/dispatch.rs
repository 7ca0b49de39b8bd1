//! Dispatch orchestration: validate, resolve the pool, select an endpoint,
//! execute through the resilience layer, and classify the outcome.
//!
//! Every terminal failure leaves here carrying its [`FailureKind`]
//! classification and the last underlying message; nothing is swallowed, and
//! a panicking provider client is caught at this boundary and reclassified
//! rather than leaked.
//!
//! [`FailureKind`]: crate::error::FailureKind

use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::catalog::{ProviderCatalog, ServiceHost};
use crate::config::Settings;
use crate::error::Error;
use crate::pool::PoolRegistry;
use crate::providers::{ProviderClient, ToolExecutionClient};
use crate::resilience::{ResilienceExecutor, RetryPolicy};
use crate::types::{CompletionRequest, CompletionResponse, Tool};
use crate::validation::ValidationEngine;

pub struct Dispatcher {
    validator: ValidationEngine,
    pools: PoolRegistry,
    clients: HashMap<ServiceHost, Arc<dyn ProviderClient>>,
    completion_executor: ResilienceExecutor,
    tool_executor: ResilienceExecutor,
    tool_client: ToolExecutionClient,
}

impl Dispatcher {
    /// Build the dispatcher from a configuration snapshot and the provider
    /// clients the embedding application wants routed.
    pub fn new(
        settings: &Settings,
        clients: Vec<Arc<dyn ProviderClient>>,
    ) -> Result<Self, Error> {
        let catalog = Arc::new(ProviderCatalog::from_settings(&settings.catalog));
        let pools = PoolRegistry::from_settings(&settings.endpoints, &settings.circuit_breaker);
        let clients = clients.into_iter().map(|c| (c.host(), c)).collect();
        Ok(Self {
            validator: ValidationEngine::new(catalog),
            pools,
            clients,
            completion_executor: ResilienceExecutor::new(RetryPolicy::completion(
                &settings.completion_retry,
            )),
            tool_executor: ResilienceExecutor::new(RetryPolicy::tool(&settings.tool_retry)),
            tool_client: ToolExecutionClient::new()?,
        })
    }

    /// The validation engine, for collaborators that validate profiles and
    /// tools outside the dispatch path (profile CRUD, tool registration).
    pub fn validator(&self) -> &ValidationEngine {
        &self.validator
    }

    /// Validate and dispatch one completion request.
    pub async fn dispatch(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse, Error> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        if let Some(message) = self.validator.validate_chat_request(request).await {
            return Err(Error::Validation(message));
        }

        let host = request.profile_options.host;
        let client = self.clients.get(&host).ok_or_else(|| {
            Error::configuration(format!(
                "no provider client registered for host '{}'",
                host.as_str()
            ))
        })?;
        let endpoint = self.pools.select_endpoint(host)?;
        let breaker = self.pools.breaker(host);

        let call = self.completion_executor.execute(
            host.as_str(),
            breaker.as_deref(),
            cancel,
            || client.complete(request, &endpoint),
        );
        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(Error::Provider {
                status: 500,
                message: "provider client panicked".into(),
            }),
        };

        match &result {
            Ok(response) => tracing::debug!(
                %request_id,
                host = host.as_str(),
                endpoint = endpoint.as_str(),
                duration_ms = started.elapsed().as_millis() as u64,
                finish_reason = response.finish_reason.as_deref().unwrap_or(""),
                "completion dispatched"
            ),
            Err(error) => tracing::info!(
                %request_id,
                host = host.as_str(),
                endpoint = endpoint.as_str(),
                duration_ms = started.elapsed().as_millis() as u64,
                kind = ?error.kind(),
                error = %error,
                "completion dispatch failed"
            ),
        }
        result
    }

    /// Execute a user-defined tool's webhook with the tool retry policy.
    pub async fn execute_tool(
        &self,
        tool: &Tool,
        arguments: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, Error> {
        if let Some(message) = self.validator.validate_tool(tool) {
            return Err(Error::Validation(message));
        }
        let url = tool
            .execution_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                Error::configuration(format!(
                    "tool '{}' has no execution URL configured",
                    tool.name().unwrap_or("unnamed")
                ))
            })?;

        self.tool_executor
            .execute("tool-execution", None, cancel, || {
                self.tool_client.execute(tool, url, arguments)
            })
            .await
    }
}
