//! Authentication counters
//!
//! The service layer only sees the [`AuthMetrics`] capability; the concrete
//! Prometheus sink owns its own registry so several instances (tests, for
//! one) can coexist in a process.

use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Counter sink used by the authentication use cases
pub trait AuthMetrics: Send + Sync {
    fn inc_login(&self);
    fn inc_logout(&self);
    fn inc_authentication_error(&self);
}

/// Error raised while building or rendering the registry
pub type MetricsError = prometheus::Error;

/// Prometheus-backed [`AuthMetrics`]
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    login_total: IntCounter,
    logout_total: IntCounter,
    authentication_error_total: IntCounter,
}

impl PrometheusMetrics {
    /// Create the three counters under `<namespace>_...`
    pub fn new(namespace: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let login_total = counter(&registry, namespace, "login_total", "Successful logins")?;
        let logout_total = counter(&registry, namespace, "logout_total", "Logouts")?;
        let authentication_error_total = counter(
            &registry,
            namespace,
            "authentication_error_total",
            "Rejected login attempts",
        )?;

        Ok(Self {
            registry,
            login_total,
            logout_total,
            authentication_error_total,
        })
    }

    pub fn login_total(&self) -> u64 {
        self.login_total.get()
    }

    pub fn logout_total(&self) -> u64 {
        self.logout_total.get()
    }

    pub fn authentication_error_total(&self) -> u64 {
        self.authentication_error_total.get()
    }

    /// Render the registry in the text exposition format
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Msg(e.to_string()))
    }
}

fn counter(
    registry: &Registry,
    namespace: &str,
    name: &str,
    help: &str,
) -> Result<IntCounter, MetricsError> {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace(namespace))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl AuthMetrics for PrometheusMetrics {
    fn inc_login(&self) {
        self.login_total.inc();
    }

    fn inc_logout(&self) {
        self.logout_total.inc();
    }

    fn inc_authentication_error(&self) {
        self.authentication_error_total.inc();
    }
}
