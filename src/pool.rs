//! Endpoint pools and load-balanced selection.
//!
//! One pool per provider host, built once from configuration and immutable
//! afterwards. Selection is a single atomic counter per pool, so concurrent
//! callers never block and traffic spreads evenly across endpoints. Selection
//! is deliberately independent of per-call outcomes; containing a failing
//! endpoint is the circuit breaker's job, not the selector's.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::catalog::ServiceHost;
use crate::config::{CircuitBreakerSettings, EndpointSettings};
use crate::error::Error;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

/// Ordered, immutable set of interchangeable endpoint addresses for one host.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    pub name: String,
    endpoints: Vec<String>,
}

impl EndpointPool {
    pub fn new(name: impl Into<String>, endpoints: Vec<String>) -> Self {
        Self {
            name: name.into(),
            endpoints,
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

struct PoolEntry {
    pool: EndpointPool,
    cursor: AtomicUsize,
    breaker: Option<Arc<CircuitBreaker>>,
}

/// All configured pools, keyed by host. Hosts with zero configured endpoints
/// have no entry and requests for them fail fast with a configuration error.
pub struct PoolRegistry {
    entries: HashMap<ServiceHost, PoolEntry>,
}

impl PoolRegistry {
    /// Build the registry from configured endpoint lists. A breaker is
    /// attached only to pools with more than one endpoint.
    pub fn from_settings(
        endpoints: &EndpointSettings,
        breaker: &CircuitBreakerSettings,
    ) -> Self {
        let mut entries = HashMap::new();
        for host in [ServiceHost::Azure, ServiceHost::OpenAI, ServiceHost::Anthropic] {
            let addresses = endpoints.for_host(host);
            if addresses.is_empty() {
                continue;
            }
            let pool = EndpointPool::new(host.as_str(), addresses.to_vec());
            let breaker = (pool.len() > 1).then(|| {
                Arc::new(CircuitBreaker::new(
                    pool.name.clone(),
                    CircuitBreakerConfig::from_settings(breaker),
                ))
            });
            entries.insert(
                host,
                PoolEntry {
                    pool,
                    cursor: AtomicUsize::new(0),
                    breaker,
                },
            );
        }
        Self { entries }
    }

    pub fn contains(&self, host: ServiceHost) -> bool {
        self.entries.contains_key(&host)
    }

    /// Pick the next endpoint for `host` by atomic round-robin.
    pub fn select_endpoint(&self, host: ServiceHost) -> Result<String, Error> {
        let entry = self.entries.get(&host).ok_or_else(|| {
            Error::configuration(format!(
                "no endpoints configured for host '{}'",
                host.as_str()
            ))
        })?;
        let index = entry.cursor.fetch_add(1, Ordering::Relaxed) % entry.pool.len();
        Ok(entry.pool.endpoints()[index].clone())
    }

    /// The breaker shared by all calls against `host`'s pool, if the pool is
    /// large enough to warrant one.
    pub fn breaker(&self, host: ServiceHost) -> Option<Arc<CircuitBreaker>> {
        self.entries.get(&host).and_then(|e| e.breaker.clone())
    }

    pub fn pool(&self, host: ServiceHost) -> Option<&EndpointPool> {
        self.entries.get(&host).map(|e| &e.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::thread;

    fn make_registry(openai_endpoints: &[&str]) -> PoolRegistry {
        let endpoints = EndpointSettings {
            openai: openai_endpoints.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        PoolRegistry::from_settings(&endpoints, &CircuitBreakerSettings::default())
    }

    #[test]
    fn test_missing_pool_is_configuration_error() {
        let registry = make_registry(&["https://a"]);
        let err = registry.select_endpoint(ServiceHost::Anthropic).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn test_single_endpoint_pool_has_no_breaker() {
        let registry = make_registry(&["https://a"]);
        assert!(registry.breaker(ServiceHost::OpenAI).is_none());

        let registry = make_registry(&["https://a", "https://b"]);
        assert!(registry.breaker(ServiceHost::OpenAI).is_some());
    }

    #[test]
    fn test_round_robin_cycles_in_order() {
        let registry = make_registry(&["https://a", "https://b", "https://c"]);
        let picks: Vec<String> = (0..6)
            .map(|_| registry.select_endpoint(ServiceHost::OpenAI).unwrap())
            .collect();
        assert_eq!(
            picks,
            vec![
                "https://a",
                "https://b",
                "https://c",
                "https://a",
                "https://b",
                "https://c"
            ]
        );
    }

    #[test]
    fn test_fairness_under_concurrent_selection() {
        let registry = Arc::new(make_registry(&["e0", "e1", "e2", "e3"]));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                let mut local: StdHashMap<String, usize> = StdHashMap::new();
                for _ in 0..1250 {
                    let endpoint = registry.select_endpoint(ServiceHost::OpenAI).unwrap();
                    *local.entry(endpoint).or_default() += 1;
                }
                local
            }));
        }

        let mut totals: StdHashMap<String, usize> = StdHashMap::new();
        for handle in handles {
            for (endpoint, count) in handle.join().unwrap() {
                *totals.entry(endpoint).or_default() += count;
            }
        }

        // 10_000 selections over 4 endpoints: each within 25% ± 3%.
        assert_eq!(totals.values().sum::<usize>(), 10_000);
        for endpoint in ["e0", "e1", "e2", "e3"] {
            let count = totals.get(endpoint).copied().unwrap_or(0);
            assert!(
                (2_200..=2_800).contains(&count),
                "endpoint {} received {} selections",
                endpoint,
                count
            );
        }
    }
}
