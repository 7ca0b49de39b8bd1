//! Configuration surface consumed by the dispatch core.
//!
//! `Settings` is a plain value: how it is sourced (file, environment layer,
//! secret store) is the embedding application's concern. The core only reads
//! it once at startup to build the catalog, the endpoint pools, and the
//! retry/breaker policies.

use serde::Deserialize;
use std::collections::HashMap;

use crate::catalog::ServiceHost;
use crate::error::Error;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub endpoints: EndpointSettings,
    pub completion_retry: CompletionRetrySettings,
    pub tool_retry: ToolRetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Settings {
    pub fn from_yaml(content: &str) -> Result<Self, Error> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("failed to parse settings: {}", e)))
    }

    pub fn from_json(content: &str) -> Result<Self, Error> {
        serde_json::from_str(content)
            .map_err(|e| Error::configuration(format!("failed to parse settings: {}", e)))
    }
}

/// Per-host model allow-lists. Azure is a flat set; OpenAI maps each model
/// to its context window; Anthropic is a flat set with a fixed window.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub azure_models: Vec<String>,
    pub openai_models: HashMap<String, u32>,
    pub anthropic_models: Vec<String>,
}

/// Endpoint addresses per host. A host with an empty list simply has no pool
/// and requests targeting it fail fast with a configuration error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub azure: Vec<String>,
    pub openai: Vec<String>,
    pub anthropic: Vec<String>,
}

impl EndpointSettings {
    pub fn for_host(&self, host: ServiceHost) -> &[String] {
        match host {
            ServiceHost::Azure => &self.azure,
            ServiceHost::OpenAI => &self.openai,
            ServiceHost::Anthropic => &self.anthropic,
            ServiceHost::Unspecified => &[],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionRetrySettings {
    pub max_retries: u32,
    pub initial_delay_secs: u64,
    /// Upper bound for the uniformly distributed jitter added to each delay.
    pub max_jitter_secs: u64,
}

impl Default for CompletionRetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_secs: 1,
            max_jitter_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolRetrySettings {
    pub max_retries: u32,
    pub initial_delay_secs: u64,
}

impl Default for ToolRetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub break_duration_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            break_duration_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.completion_retry.max_retries, 3);
        assert_eq!(settings.completion_retry.max_jitter_secs, 5);
        assert_eq!(settings.tool_retry.max_retries, 3);
        assert_eq!(settings.circuit_breaker.failure_threshold, 5);
        assert!(settings.endpoints.openai.is_empty());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
catalog:
  azure_models: ["gpt-4o-deployment"]
  openai_models:
    gpt-4o: 128000
  anthropic_models: ["claude-3-5-sonnet-20241022"]
endpoints:
  openai:
    - "https://api.openai.com"
    - "https://openai-mirror.internal"
circuit_breaker:
  failure_threshold: 3
  break_duration_secs: 10
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.endpoints.openai.len(), 2);
        assert_eq!(settings.catalog.openai_models["gpt-4o"], 128_000);
        assert_eq!(settings.circuit_breaker.failure_threshold, 3);
        // Unlisted sections keep their defaults.
        assert_eq!(settings.completion_retry.max_retries, 3);
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        let err = Settings::from_yaml("catalog: [not, a, map]").unwrap_err();
        assert!(err.to_string().contains("failed to parse settings"));
    }

    #[test]
    fn test_endpoints_for_host() {
        let mut settings = Settings::default();
        settings.endpoints.anthropic = vec!["https://api.anthropic.com".into()];
        assert_eq!(
            settings.endpoints.for_host(ServiceHost::Anthropic).len(),
            1
        );
        assert!(settings
            .endpoints
            .for_host(ServiceHost::Unspecified)
            .is_empty());
    }
}
