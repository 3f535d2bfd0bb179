//! Metrics primitives

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Monotonic counter
#[derive(Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
    name: String,
}

impl Counter {
    pub fn new(name: &str) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
            name: name.to_string(),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Gauge that can move in both directions (never below zero)
#[derive(Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicU64>,
    name: String,
}

impl Gauge {
    pub fn new(name: &str) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
            name: name.to_string(),
        }
    }

    pub fn set(&self, val: u64) {
        self.value.store(val, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Sample-based histogram (keeps the most recent samples for percentiles)
#[derive(Clone)]
pub struct Histogram {
    samples: Arc<parking_lot::Mutex<Vec<f64>>>,
    name: String,
    max_samples: usize,
}

impl Histogram {
    pub fn new(name: &str) -> Self {
        Self::with_capacity(name, 1000)
    }

    pub fn with_capacity(name: &str, max_samples: usize) -> Self {
        Self {
            samples: Arc::new(parking_lot::Mutex::new(Vec::with_capacity(max_samples.min(1024)))),
            name: name.to_string(),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record(&self, value: f64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.max_samples {
            samples.remove(0);
        }
        samples.push(value);
    }

    pub fn percentile(&self, p: f64) -> f64 {
        let mut sorted = self.samples.lock().clone();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((sorted.len() as f64) * p / 100.0) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn mean(&self) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Point-in-time view of a set of metrics, suitable for printing or JSON output
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub counters: Vec<(String, u64)>,
    pub gauges: Vec<(String, u64)>,
    /// name, mean, p95
    pub histograms: Vec<(String, f64, f64)>,
}

impl MetricsSnapshot {
    pub fn counter(mut self, counter: &Counter) -> Self {
        self.counters.push((counter.name().to_string(), counter.get()));
        self
    }

    pub fn gauge(mut self, gauge: &Gauge) -> Self {
        self.gauges.push((gauge.name().to_string(), gauge.get()));
        self
    }

    pub fn histogram(mut self, histogram: &Histogram) -> Self {
        self.histograms.push((
            histogram.name().to_string(),
            histogram.mean(),
            histogram.percentile(95.0),
        ));
        self
    }

    /// Look up a counter value by name
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        self.counters.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new("commands_written");
        assert_eq!(counter.get(), 0);
        counter.inc();
        assert_eq!(counter.get(), 1);
        counter.add(5);
        assert_eq!(counter.get(), 6);
    }

    #[test]
    fn test_gauge_never_underflows() {
        let gauge = Gauge::new("active_calls");
        gauge.set(1);
        gauge.dec();
        gauge.dec();
        assert_eq!(gauge.get(), 0);
        gauge.inc();
        assert_eq!(gauge.get(), 1);
    }

    #[test]
    fn test_histogram() {
        let hist = Histogram::new("command_latency_ms");
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            hist.record(v);
        }

        assert_eq!(hist.count(), 5);
        assert!((hist.mean() - 3.0).abs() < 0.001);
        assert!((hist.percentile(50.0) - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_histogram_evicts_oldest() {
        let hist = Histogram::with_capacity("small", 2);
        hist.record(100.0);
        hist.record(1.0);
        hist.record(3.0);
        assert_eq!(hist.count(), 2);
        assert!((hist.mean() - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_snapshot_lookup() {
        let sent = Counter::new("sms_sent");
        sent.add(3);
        let snapshot = MetricsSnapshot::default().counter(&sent);
        assert_eq!(snapshot.counter_value("sms_sent"), Some(3));
        assert_eq!(snapshot.counter_value("missing"), None);
    }
}
