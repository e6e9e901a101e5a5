//! Backend registry and selection.
//!
//! # Responsibilities
//! - Own one breaker per configured backend, grouped by service name
//! - Apply round-robin selection skipping backends whose breaker refuses
//! - Forward request outcomes to the breaker that approved the request

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::config::GatewayConfig;
use crate::load_balancer::{backend::Selection, round_robin::RoundRobin, SelectError};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};
use crate::resilience::clock::Clock;

/// Breaker states for one service, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    pub service: String,
    pub backends: Vec<BreakerSnapshot>,
}

/// Chooses a backend per request for each registered service.
///
/// Built once at startup and shared behind an `Arc`; the set of services
/// never changes afterwards.
#[derive(Debug)]
pub struct BackendSelector {
    services: BTreeMap<Arc<str>, RoundRobin>,
    clock: Arc<dyn Clock>,
}

impl BackendSelector {
    /// Create an empty selector whose breakers read time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            services: BTreeMap::new(),
            clock,
        }
    }

    /// Build a selector from the `[services]` and `[circuit_breaker]` sections.
    ///
    /// Unparseable URLs and empty services are skipped with a warning;
    /// validation rejects both before this point in normal startup.
    pub fn from_config(config: &GatewayConfig, clock: Arc<dyn Clock>) -> Self {
        let mut selector = Self::new(clock);
        let cooldown = Duration::from_secs(config.circuit_breaker.cooldown_secs);

        for (name, addresses) in &config.services {
            let urls: Vec<Url> = addresses
                .iter()
                .filter_map(|address| match Url::parse(address) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!(service = %name, address = %address, error = %e, "Invalid backend URL");
                        None
                    }
                })
                .collect();
            selector.register(name, urls, config.circuit_breaker.failure_threshold, cooldown);
        }
        selector
    }

    /// Register `service` with its backends in selection order.
    ///
    /// A service with no backends is not registered. Registering the same
    /// name twice replaces the earlier backends.
    pub fn register(&mut self, service: &str, urls: Vec<Url>, failure_threshold: u32, cooldown: Duration) {
        let breakers = urls
            .into_iter()
            .map(|url| Arc::new(CircuitBreaker::new(url, failure_threshold, cooldown, self.clock.clone())))
            .collect();

        match RoundRobin::new(breakers) {
            Some(pool) => {
                tracing::info!(
                    service = %service,
                    backends = pool.breakers().len(),
                    failure_threshold,
                    cooldown_secs = cooldown.as_secs(),
                    "Service registered"
                );
                self.services.insert(Arc::from(service), pool);
            }
            None => tracing::warn!(service = %service, "Service has no backends, not registered"),
        }
    }

    /// Pick a backend for `service`.
    pub fn select(&self, service: &str) -> Result<Selection, SelectError> {
        let Some((name, pool)) = self.services.get_key_value(service) else {
            tracing::debug!(service = %service, "Service not registered");
            metrics::record_selection_failure(service, "service_not_found");
            return Err(SelectError::ServiceNotFound(service.to_string()));
        };

        match pool.next_server() {
            Some((index, breaker)) => {
                tracing::debug!(service = %service, backend = %breaker.url(), index, "Backend selected");
                Ok(Selection::new(name.clone(), index, breaker))
            }
            None => {
                tracing::debug!(service = %service, backend_count = pool.breakers().len(), "No available backends");
                for b in pool.breakers() {
                    tracing::debug!(backend = %b.url(), state = %b.state(), "Backend status");
                }
                metrics::record_selection_failure(service, "no_available_backend");
                Err(SelectError::NoAvailableBackend(service.to_string()))
            }
        }
    }

    /// Report that the request sent to `selection` succeeded.
    pub fn report_success(&self, selection: Selection) {
        selection.succeed();
    }

    /// Report that the request sent to `selection` failed.
    pub fn report_failure(&self, selection: Selection) {
        selection.fail();
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(|name| name.as_ref())
    }

    /// Current breaker state of every backend, grouped by service.
    pub fn snapshot(&self) -> Vec<ServiceSnapshot> {
        self.services
            .iter()
            .map(|(name, pool)| ServiceSnapshot {
                service: name.to_string(),
                backends: pool.breakers().iter().map(|b| b.snapshot()).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{CircuitState, ManualClock};

    const A: &str = "http://10.0.0.1:8001/";
    const B: &str = "http://10.0.0.2:8001/";
    const C: &str = "http://10.0.0.3:8001/";

    fn urls(list: &[&str]) -> Vec<Url> {
        list.iter().map(|u| Url::parse(u).unwrap()).collect()
    }

    fn selector(threshold: u32, backends: &[&str]) -> (BackendSelector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let mut selector = BackendSelector::new(clock.clone());
        selector.register("orders", urls(backends), threshold, Duration::from_secs(60));
        (selector, clock)
    }

    fn pick(selector: &BackendSelector, service: &str) -> String {
        let selection = selector.select(service).unwrap();
        let url = selection.url().to_string();
        selector.report_success(selection);
        url
    }

    #[test]
    fn test_unknown_service() {
        let (selector, _) = selector(3, &[A]);
        let err = selector.select("billing").unwrap_err();
        assert_eq!(err, SelectError::ServiceNotFound("billing".into()));
    }

    #[test]
    fn test_empty_service_not_registered() {
        let (mut selector, _) = selector(3, &[A]);
        selector.register("empty", Vec::new(), 3, Duration::from_secs(60));
        assert!(!selector.contains("empty"));
        assert_eq!(
            selector.select("empty").unwrap_err(),
            SelectError::ServiceNotFound("empty".into())
        );
    }

    #[test]
    fn test_round_robin_fairness() {
        let (selector, _) = selector(3, &[A, B, C]);
        let picks: Vec<String> = (0..3).map(|_| pick(&selector, "orders")).collect();
        assert_eq!(picks, vec![A, B, C]);

        let next: Vec<String> = (0..3).map(|_| pick(&selector, "orders")).collect();
        assert_eq!(next, vec![A, B, C]);
    }

    #[test]
    fn test_healthy_backend_preferred_until_cooldown() {
        let (selector, clock) = selector(1, &[A, B]);

        // Trip B: select A then B, fail B.
        pick(&selector, "orders");
        let b = selector.select("orders").unwrap();
        assert_eq!(b.url().as_str(), B);
        selector.report_failure(b);

        for _ in 0..5 {
            assert_eq!(pick(&selector, "orders"), A);
        }

        clock.advance(Duration::from_secs(60));
        let picks: Vec<String> = (0..2).map(|_| pick(&selector, "orders")).collect();
        assert!(picks.contains(&B.to_string()));
    }

    #[test]
    fn test_no_available_backend() {
        let (selector, clock) = selector(1, &[A, B]);
        for _ in 0..2 {
            let s = selector.select("orders").unwrap();
            selector.report_failure(s);
        }

        assert_eq!(
            selector.select("orders").unwrap_err(),
            SelectError::NoAvailableBackend("orders".into())
        );

        clock.advance(Duration::from_secs(60));
        let probe = selector.select("orders").unwrap();
        assert_eq!(probe.url().as_str(), A);

        // A is mid-probe, B takes its own probe.
        let second = selector.select("orders").unwrap();
        assert_eq!(second.url().as_str(), B);
        assert!(selector.select("orders").is_err());

        selector.report_success(probe);
        selector.report_failure(second);
        assert_eq!(pick(&selector, "orders"), A);
        assert_eq!(pick(&selector, "orders"), A);
    }

    #[test]
    fn test_unreported_selection_leaves_breaker_alone() {
        let (selector, _) = selector(1, &[A]);
        let s = selector.select("orders").unwrap();
        drop(s);

        let snapshot = selector.snapshot();
        assert_eq!(snapshot[0].backends[0].state, CircuitState::Closed);
        assert_eq!(snapshot[0].backends[0].consecutive_failures, 0);
    }

    #[test]
    fn test_from_config() {
        let mut config = GatewayConfig::default();
        config.services.insert("orders".into(), vec![A.into(), "not a url".into()]);
        config.services.insert("empty".into(), Vec::new());
        config.circuit_breaker.failure_threshold = 2;

        let selector = BackendSelector::from_config(&config, Arc::new(ManualClock::new()));
        assert_eq!(selector.services().collect::<Vec<_>>(), vec!["orders"]);

        let s = selector.select("orders").unwrap();
        assert_eq!(s.service(), "orders");
        assert_eq!(s.index(), 0);
        selector.report_failure(s);
        assert_eq!(selector.snapshot()[0].backends[0].consecutive_failures, 1);
    }
}
