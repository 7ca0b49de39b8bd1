//! Provider catalog: which model names are valid per host, and how large
//! their context windows are.
//!
//! The catalog is an immutable snapshot built from [`crate::config::Settings`]
//! at startup and shared by reference. There are no hidden global lookups;
//! everything the validators consult lives here.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::CatalogSettings;

/// Context window applied to OpenAI models missing from the configured map.
pub const DEFAULT_OPENAI_CONTEXT_WINDOW: u32 = 4096;

/// Fixed context window applied to all Anthropic models.
pub const ANTHROPIC_CONTEXT_WINDOW: u32 = 4000;

/// The provider host a profile targets.
///
/// `Unspecified` exists so a request that never set a host is representable;
/// validation always rejects it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHost {
    #[default]
    Unspecified,
    Azure,
    OpenAI,
    Anthropic,
}

impl ServiceHost {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Azure => "azure",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "azure" => Some(Self::Azure),
            "openai" => Some(Self::OpenAI),
            "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-host model allow-lists.
///
/// Model comparisons are case-insensitive; names are lowercased on ingest.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    azure_models: HashSet<String>,
    openai_models: HashMap<String, u32>,
    anthropic_models: HashSet<String>,
}

impl ProviderCatalog {
    pub fn from_settings(settings: &CatalogSettings) -> Self {
        Self {
            azure_models: settings
                .azure_models
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            openai_models: settings
                .openai_models
                .iter()
                .map(|(m, window)| (m.to_lowercase(), *window))
                .collect(),
            anthropic_models: settings
                .anthropic_models
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    /// Whether `model` is in `host`'s allow-list. Always false for
    /// `Unspecified` (validation rejects that host before consulting us).
    pub fn supports(&self, host: ServiceHost, model: &str) -> bool {
        let model = model.to_lowercase();
        match host {
            ServiceHost::Azure => self.azure_models.contains(&model),
            ServiceHost::OpenAI => self.openai_models.contains_key(&model),
            ServiceHost::Anthropic => self.anthropic_models.contains(&model),
            ServiceHost::Unspecified => false,
        }
    }

    /// The allow-list for `host`, sorted for stable error messages.
    pub fn allowed_models(&self, host: ServiceHost) -> Vec<String> {
        let mut models: Vec<String> = match host {
            ServiceHost::Azure => self.azure_models.iter().cloned().collect(),
            ServiceHost::OpenAI => self.openai_models.keys().cloned().collect(),
            ServiceHost::Anthropic => self.anthropic_models.iter().cloned().collect(),
            ServiceHost::Unspecified => Vec::new(),
        };
        models.sort();
        models
    }

    /// Context window for an OpenAI model, falling back to
    /// [`DEFAULT_OPENAI_CONTEXT_WINDOW`] for unknown names.
    pub fn openai_context_window(&self, model: &str) -> u32 {
        self.openai_models
            .get(&model.to_lowercase())
            .copied()
            .unwrap_or(DEFAULT_OPENAI_CONTEXT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ProviderCatalog {
        ProviderCatalog::from_settings(&CatalogSettings {
            azure_models: vec!["GPT-4o-Deployment".into()],
            openai_models: [("gpt-4o".to_string(), 128_000), ("gpt-3.5-turbo".to_string(), 16_385)]
                .into_iter()
                .collect(),
            anthropic_models: vec!["claude-3-5-sonnet-20241022".into()],
        })
    }

    #[test]
    fn test_model_lookup_is_case_insensitive() {
        let catalog = catalog();
        assert!(catalog.supports(ServiceHost::Azure, "gpt-4o-deployment"));
        assert!(catalog.supports(ServiceHost::OpenAI, "GPT-4O"));
        assert!(!catalog.supports(ServiceHost::OpenAI, "gpt-5"));
    }

    #[test]
    fn test_unspecified_host_supports_nothing() {
        let catalog = catalog();
        assert!(!catalog.supports(ServiceHost::Unspecified, "gpt-4o"));
        assert!(catalog.allowed_models(ServiceHost::Unspecified).is_empty());
    }

    #[test]
    fn test_openai_context_window_default() {
        let catalog = catalog();
        assert_eq!(catalog.openai_context_window("gpt-4o"), 128_000);
        assert_eq!(
            catalog.openai_context_window("unknown-model"),
            DEFAULT_OPENAI_CONTEXT_WINDOW
        );
    }

    #[test]
    fn test_allowed_models_sorted() {
        let catalog = catalog();
        let models = catalog.allowed_models(ServiceHost::OpenAI);
        assert_eq!(models, vec!["gpt-3.5-turbo", "gpt-4o"]);
    }
}
