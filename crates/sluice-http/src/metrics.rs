//! In-process metrics: instrument traits, a registry and the per-pipeline HTTP set
//!
//! The registry is an explicit object owned by the composition root and handed to whatever
//! needs to register instruments. Registering the same name and label set twice is an error
//! returned to the caller.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use http::StatusCode;
use parking_lot::Mutex;
use thiserror::Error;

pub trait Counter: Send + Sync {
    fn add(&self, value: u64);

    fn inc(&self) {
        self.add(1);
    }
}

pub trait Gauge: Send + Sync {
    fn add(&self, delta: i64);

    fn inc(&self) {
        self.add(1);
    }

    fn dec(&self) {
        self.add(-1);
    }
}

pub trait Histogram: Send + Sync {
    fn observe(&self, value: f64);
}

#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Counter for AtomicCounter {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct AtomicGauge(AtomicI64);

impl AtomicGauge {
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Gauge for AtomicGauge {
    fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }
}

/// Count and sum of observations, rendered as a Prometheus summary without quantiles
#[derive(Debug, Default)]
pub struct Summary {
    state: Mutex<(u64, f64)>,
}

impl Summary {
    pub fn count(&self) -> u64 {
        self.state.lock().0
    }

    pub fn sum(&self) -> f64 {
        self.state.lock().1
    }
}

impl Histogram for Summary {
    fn observe(&self, value: f64) {
        let mut state = self.state.lock();
        state.0 += 1;
        state.1 += value;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricsError {
    #[error("metric {0} already registered")]
    Duplicate(String),

    #[error("invalid metric name {0:?}")]
    InvalidName(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MetricKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl MetricKey {
    fn render_labels(&self) -> String {
        if self.labels.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
            .collect();
        format!("{{{}}}", pairs.join(","))
    }
}

enum Instrument {
    Counter(Arc<AtomicCounter>),
    Gauge(Arc<AtomicGauge>),
    Summary(Arc<Summary>),
}

#[derive(Default)]
pub struct MetricsRegistry {
    instruments: Mutex<BTreeMap<MetricKey, Instrument>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(
        &self,
        name: &str,
        labels: &[(&str, &str)],
    ) -> Result<Arc<AtomicCounter>, MetricsError> {
        let counter = Arc::new(AtomicCounter::default());
        self.register(name, labels, Instrument::Counter(counter.clone()))?;
        Ok(counter)
    }

    pub fn gauge(
        &self,
        name: &str,
        labels: &[(&str, &str)],
    ) -> Result<Arc<AtomicGauge>, MetricsError> {
        let gauge = Arc::new(AtomicGauge::default());
        self.register(name, labels, Instrument::Gauge(gauge.clone()))?;
        Ok(gauge)
    }

    pub fn summary(
        &self,
        name: &str,
        labels: &[(&str, &str)],
    ) -> Result<Arc<Summary>, MetricsError> {
        let summary = Arc::new(Summary::default());
        self.register(name, labels, Instrument::Summary(summary.clone()))?;
        Ok(summary)
    }

    pub fn len(&self) -> usize {
        self.instruments.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn register(
        &self,
        name: &str,
        labels: &[(&str, &str)],
        instrument: Instrument,
    ) -> Result<(), MetricsError> {
        if !is_valid_name(name) {
            return Err(MetricsError::InvalidName(name.to_string()));
        }
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.sort();
        let key = MetricKey {
            name: name.to_string(),
            labels,
        };

        let mut instruments = self.instruments.lock();
        if instruments.contains_key(&key) {
            return Err(MetricsError::Duplicate(format!(
                "{}{}",
                key.name,
                key.render_labels()
            )));
        }
        instruments.insert(key, instrument);
        Ok(())
    }

    /// Prometheus text exposition of every registered instrument
    pub fn render(&self) -> String {
        let instruments = self.instruments.lock();
        let mut out = String::new();
        let mut last_name: Option<&str> = None;

        for (key, instrument) in instruments.iter() {
            if last_name != Some(key.name.as_str()) {
                let kind = match instrument {
                    Instrument::Counter(_) => "counter",
                    Instrument::Gauge(_) => "gauge",
                    Instrument::Summary(_) => "summary",
                };
                let _ = writeln!(out, "# TYPE {} {}", key.name, kind);
                last_name = Some(key.name.as_str());
            }

            let labels = key.render_labels();
            let _ = match instrument {
                Instrument::Counter(c) => writeln!(out, "{}{} {}", key.name, labels, c.get()),
                Instrument::Gauge(g) => writeln!(out, "{}{} {}", key.name, labels, g.get()),
                Instrument::Summary(s) => writeln!(
                    out,
                    "{name}_sum{labels} {}\n{name}_count{labels} {}",
                    s.sum(),
                    s.count(),
                    name = key.name,
                ),
            };
        }
        out
    }
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Request counters, latency and in-flight gauge for one pipeline
#[derive(Clone)]
pub struct HttpMetrics {
    pub requests: Arc<dyn Counter>,
    pub requests_2xx: Arc<dyn Counter>,
    pub requests_4xx: Arc<dyn Counter>,
    pub requests_5xx: Arc<dyn Counter>,
    pub latency_2xx_ms: Arc<dyn Histogram>,
    pub current_conns: Arc<dyn Gauge>,
}

impl HttpMetrics {
    /// Register the standard set under `namespace`, labelled `method=<method>` when non-empty
    pub fn register(
        registry: &MetricsRegistry,
        namespace: &str,
        method: &str,
    ) -> Result<Self, MetricsError> {
        let name = |suffix: &str| {
            if namespace.is_empty() {
                suffix.to_string()
            } else {
                format!("{namespace}_{suffix}")
            }
        };
        let method_label = [("method", method)];
        let labels: &[(&str, &str)] = if method.is_empty() {
            &[]
        } else {
            &method_label
        };

        Ok(Self {
            requests: registry.counter(&name("http_nb_req"), labels)?,
            requests_2xx: registry.counter(&name("http_nb_req_2xx"), labels)?,
            requests_4xx: registry.counter(&name("http_nb_req_4xx"), labels)?,
            requests_5xx: registry.counter(&name("http_nb_req_5xx"), labels)?,
            latency_2xx_ms: registry.summary(&name("http_latency_2xx_ms"), labels)?,
            current_conns: registry.gauge(&name("http_nb_current_conns"), labels)?,
        })
    }

    /// Count a new request and hold the in-flight gauge until the guard drops
    pub fn start(&self) -> InFlight {
        self.requests.inc();
        self.current_conns.inc();
        InFlight {
            gauge: self.current_conns.clone(),
        }
    }

    /// Classify a finished request by the status it produced
    pub fn record(&self, status: StatusCode, elapsed: Duration) {
        match status.as_u16() {
            400..=499 => self.requests_4xx.inc(),
            500..=599 => self.requests_5xx.inc(),
            _ => {
                self.requests_2xx.inc();
                self.latency_2xx_ms.observe(elapsed.as_secs_f64() * 1000.0);
            }
        }
    }
}

/// Decrements the in-flight gauge on drop, including during unwinding
pub struct InFlight {
    gauge: Arc<dyn Gauge>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_is_an_error() {
        let registry = MetricsRegistry::new();
        registry.counter("jobs_total", &[("queue", "a")]).unwrap();
        registry.counter("jobs_total", &[("queue", "b")]).unwrap();

        let err = registry.counter("jobs_total", &[("queue", "a")]).unwrap_err();
        assert_eq!(err, MetricsError::Duplicate("jobs_total{queue=\"a\"}".into()));

        assert!(HttpMetrics::register(&registry, "svc", "get_user").is_ok());
        assert!(matches!(
            HttpMetrics::register(&registry, "svc", "get_user"),
            Err(MetricsError::Duplicate(_))
        ));
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let registry = MetricsRegistry::new();
        assert!(matches!(
            registry.gauge("9lives", &[]),
            Err(MetricsError::InvalidName(_))
        ));
        assert!(matches!(
            registry.gauge("has-dash", &[]),
            Err(MetricsError::InvalidName(_))
        ));
    }

    #[test]
    fn test_status_classification() {
        let registry = MetricsRegistry::new();
        let metrics = HttpMetrics::register(&registry, "svc", "op").unwrap();

        for status in [200, 204, 302, 404, 413, 500, 503] {
            let _guard = metrics.start();
            metrics.record(
                StatusCode::from_u16(status).unwrap(),
                Duration::from_millis(5),
            );
        }

        let text = registry.render();
        assert!(text.contains("svc_http_nb_req{method=\"op\"} 7"));
        assert!(text.contains("svc_http_nb_req_2xx{method=\"op\"} 3"));
        assert!(text.contains("svc_http_nb_req_4xx{method=\"op\"} 2"));
        assert!(text.contains("svc_http_nb_req_5xx{method=\"op\"} 2"));
        assert!(text.contains("svc_http_latency_2xx_ms_count{method=\"op\"} 3"));
        assert!(text.contains("svc_http_nb_current_conns{method=\"op\"} 0"));
        assert!(text.contains("# TYPE svc_http_latency_2xx_ms summary"));
    }

    #[test]
    fn test_in_flight_gauge_tracks_guards() {
        let registry = MetricsRegistry::new();
        let gauge = registry.gauge("conns", &[]).unwrap();
        let metrics = HttpMetrics {
            requests: registry.counter("req", &[]).unwrap(),
            requests_2xx: registry.counter("req_2xx", &[]).unwrap(),
            requests_4xx: registry.counter("req_4xx", &[]).unwrap(),
            requests_5xx: registry.counter("req_5xx", &[]).unwrap(),
            latency_2xx_ms: registry.summary("lat", &[]).unwrap(),
            current_conns: gauge.clone(),
        };

        let first = metrics.start();
        let second = metrics.start();
        assert_eq!(gauge.get(), 2);
        drop(first);
        assert_eq!(gauge.get(), 1);
        drop(second);
        assert_eq!(gauge.get(), 0);
    }
}
