//! Metric dispatch boundary
//!
//! Converts extracted metrics into the sink's call shape and isolates sink
//! failures from the poll cycle: a failed submit is logged and dropped, and
//! one bad metric never aborts a cycle.

use std::io::Write;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::SinkError;

/// A metric payload: one scalar or a fixed-order series
///
/// The dispatch adapter coerces `Scalar` into a one-element series and
/// passes `Series` through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// A single number
    Scalar(f64),
    /// A fixed-order sequence of numbers
    Series(Vec<f64>),
}

impl MetricValue {
    /// Coerce into the sink's sequence shape
    pub fn into_values(self) -> Vec<f64> {
        match self {
            MetricValue::Scalar(v) => vec![v],
            MetricValue::Series(vs) => vs,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Scalar(v)
    }
}

impl From<Vec<f64>> for MetricValue {
    fn from(vs: Vec<f64>) -> Self {
        MetricValue::Series(vs)
    }
}

/// Flattened coordinates a value is filed under in the downstream sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricIdentity {
    /// Scope label (normalized vhost scope)
    pub host: String,
    /// Category label: queues, exchanges, node or overview
    pub plugin: String,
    /// Queue/exchange/node/cluster name
    pub plugin_instance: Option<String>,
    /// Stat name
    pub type_name: String,
    /// Sub-stat label for detail sub-objects (rate, avg, ...)
    pub type_instance: Option<String>,
}

impl MetricIdentity {
    /// Create a new identity
    pub fn new(
        host: impl Into<String>,
        plugin: impl Into<String>,
        plugin_instance: Option<String>,
        type_name: impl Into<String>,
        type_instance: Option<String>,
    ) -> Self {
        Self {
            host: host.into(),
            plugin: plugin.into(),
            plugin_instance,
            type_name: type_name.into(),
            type_instance,
        }
    }

    /// Dotted path form, used for diagnostics
    pub fn path(&self) -> String {
        let mut parts = vec![self.host.as_str(), self.plugin.as_str()];
        if let Some(instance) = &self.plugin_instance {
            parts.push(instance);
        }
        parts.push(&self.type_name);
        if let Some(instance) = &self.type_instance {
            parts.push(instance);
        }
        parts.join(".")
    }
}

/// One dispatched metric
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Where the values are filed
    pub identity: MetricIdentity,
    /// Coerced fixed-order values, never empty and never null
    pub values: Vec<f64>,
    /// Companion metadata attached to every dispatch. Required for
    /// compatibility with write_http in collectd versions < 5.5.
    pub meta: Value,
}

/// External metric sink boundary
///
/// Implementations hand metrics to the host monitoring daemon. A sink is a
/// fallible external collaborator; the [`Dispatcher`] catches everything it
/// raises.
pub trait MetricSink {
    /// Submit one metric
    ///
    /// # Errors
    /// Returns an error if the sink cannot accept the metric
    fn submit(&mut self, metric: &Metric) -> Result<(), SinkError>;
}

/// Wraps a sink and guarantees failure isolation
///
/// A failed submit is logged and dropped; subsequent metrics in the same
/// cycle are unaffected.
#[derive(Debug)]
pub struct Dispatcher<S> {
    sink: S,
    dispatched: u64,
    dropped: u64,
}

impl<S: MetricSink> Dispatcher<S> {
    /// Wrap a sink
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            dispatched: 0,
            dropped: 0,
        }
    }

    /// Coerce `values`, attach the identity and companion metadata, and
    /// hand the metric to the sink
    ///
    /// Every dispatched metric carries one or more numbers; an empty series
    /// is refused here.
    pub fn dispatch(&mut self, values: impl Into<MetricValue>, identity: MetricIdentity) {
        let values = values.into().into_values();
        if values.is_empty() {
            warn!(path = %identity.path(), "Refusing to dispatch empty value series");
            return;
        }

        let metric = Metric {
            values,
            meta: json!({"0": true}),
            identity,
        };

        debug!(path = %metric.identity.path(), values = ?metric.values, "Dispatching metric");

        match self.sink.submit(&metric) {
            Ok(()) => self.dispatched += 1,
            Err(e) => {
                self.dropped += 1;
                warn!(
                    path = %metric.identity.path(),
                    error = %e,
                    "Sink rejected metric, dropping"
                );
            }
        }
    }

    /// Metrics accepted by the sink so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Metrics dropped due to sink failures so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Borrow the wrapped sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Unwrap the sink
    pub fn into_inner(self) -> S {
        self.sink
    }
}

/// Sink that writes collectd exec-plugin `PUTVAL` lines
///
/// Identifier format is `host/plugin[-instance]/type[-instance]`; values are
/// sent with the `N:` (now) timestamp. The exec protocol has no metadata
/// field, so the companion flag is not representable on this wire.
#[derive(Debug)]
pub struct PutvalSink<W> {
    writer: W,
    interval_secs: u64,
}

impl<W: Write> PutvalSink<W> {
    /// Create a sink writing to `writer`, advertising `interval_secs` as the
    /// collection interval
    pub fn new(writer: W, interval_secs: u64) -> Self {
        Self {
            writer,
            interval_secs,
        }
    }

    fn identifier(identity: &MetricIdentity) -> String {
        let mut identifier = format!("{}/{}", identity.host, identity.plugin);
        if let Some(instance) = &identity.plugin_instance {
            identifier.push('-');
            identifier.push_str(instance);
        }
        identifier.push('/');
        identifier.push_str(&identity.type_name);
        if let Some(instance) = &identity.type_instance {
            identifier.push('-');
            identifier.push_str(instance);
        }
        identifier
    }
}

impl<W: Write> MetricSink for PutvalSink<W> {
    fn submit(&mut self, metric: &Metric) -> Result<(), SinkError> {
        let values: Vec<String> = metric.values.iter().map(|v| v.to_string()).collect();
        writeln!(
            self.writer,
            "PUTVAL \"{}\" interval={} N:{}",
            Self::identifier(&metric.identity),
            self.interval_secs,
            values.join(":")
        )?;
        // The exec protocol is consumed line by line; don't sit in the
        // stdio buffer until the next cycle.
        self.writer.flush()?;
        Ok(())
    }
}

/// Sink that collects submitted metrics in memory
///
/// Used by integration tests and dry runs.
#[derive(Debug, Default)]
pub struct VecSink {
    metrics: Vec<Metric>,
}

impl VecSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All metrics submitted so far
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }
}

impl MetricSink for VecSink {
    fn submit(&mut self, metric: &Metric) -> Result<(), SinkError> {
        self.metrics.push(metric.clone());
        Ok(())
    }
}
