use crate::SharedController;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{counter::Counter, gauge::ConstGauge, MetricType},
    registry::Registry,
};

/// Counts rebuilds and their effects on disk and on the proxy.
#[derive(Clone, Debug, Default)]
pub struct ApplyMetrics {
    rebuilds: Counter,
    config_writes: Counter,
    cert_writes: Counter,
    reloads: Counter,
    reload_errors: Counter,
}

#[derive(Debug)]
struct Instrumented(SharedController);

/// Registers gauges describing the controller's state, read on each scrape.
pub fn register(reg: &mut Registry, controller: SharedController) {
    reg.register_collector(Box::new(Instrumented(controller)));
}

// === impl ApplyMetrics ===

impl ApplyMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();
        reg.register(
            "rebuilds",
            "The number of configuration rebuilds",
            metrics.rebuilds.clone(),
        );
        reg.register(
            "config_writes",
            "The number of times the configuration file was written",
            metrics.config_writes.clone(),
        );
        reg.register(
            "cert_writes",
            "The number of certificate files written",
            metrics.cert_writes.clone(),
        );
        reg.register(
            "reloads",
            "The number of reload signals sent to the proxy",
            metrics.reloads.clone(),
        );
        reg.register(
            "reload_errors",
            "The number of failed proxy reloads",
            metrics.reload_errors.clone(),
        );
        metrics
    }

    pub(crate) fn rebuild(&self) {
        self.rebuilds.inc();
    }

    pub(crate) fn config_write(&self) {
        self.config_writes.inc();
    }

    pub(crate) fn cert_write(&self) {
        self.cert_writes.inc();
    }

    pub(crate) fn reload(&self) {
        self.reloads.inc();
    }

    pub(crate) fn reload_error(&self) {
        self.reload_errors.inc();
    }
}

// === impl Instrumented ===

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let this = self.0.read();
        let stats = this.stats();

        for (name, help, value) in [
            ("hosts", "The number of hosts", stats.hosts),
            ("routes", "The number of routes across all hosts", stats.routes),
            ("ingresses", "The number of indexed ingresses", stats.ingresses),
            ("secrets", "The number of stored secrets", stats.secrets),
            ("services", "The number of known services", stats.services),
        ] {
            let gauge_encoder = encoder.encode_descriptor(name, help, None, MetricType::Gauge)?;
            ConstGauge::new(value as i64).encode(gauge_encoder)?;
        }

        Ok(())
    }
}
