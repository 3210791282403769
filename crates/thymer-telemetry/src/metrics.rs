use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

/// In-memory counter. Monotonically increasing.
struct Counter {
    value: AtomicU64,
}

impl Counter {
    fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }
    fn increment(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }
    fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// In-memory gauge. Can go up or down.
struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }
    fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }
    fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Histogram over a bounded window of the most recent observations.
struct Histogram {
    observations: Mutex<Vec<f64>>,
    count: AtomicU64,
}

const HISTOGRAM_WINDOW: usize = 1024;

impl Histogram {
    fn new() -> Self {
        Self {
            observations: Mutex::new(Vec::new()),
            count: AtomicU64::new(0),
        }
    }
    fn observe(&self, value: f64) {
        let mut obs = self.observations.lock();
        if obs.len() == HISTOGRAM_WINDOW {
            let _ = obs.remove(0);
        }
        obs.push(value);
        self.count.fetch_add(1, Ordering::Relaxed);
    }
    fn summary(&self) -> HistogramSummary {
        let mut obs = self.observations.lock().clone();
        if obs.is_empty() {
            return HistogramSummary::default();
        }
        obs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = obs.len();
        let sum: f64 = obs.iter().sum();
        HistogramSummary {
            count: self.count.load(Ordering::Relaxed),
            sum,
            p50: obs[n / 2],
            p95: obs[((n as f64 * 0.95) as usize).min(n - 1)],
            p99: obs[((n as f64 * 0.99) as usize).min(n - 1)],
        }
    }
}

/// Summary statistics from a histogram. `sum` and the percentiles cover the
/// retained window; `count` is lifetime.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Point-in-time dump of every metric, keyed by name.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MetricsReport {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, i64>,
    pub histograms: BTreeMap<String, HistogramSummary>,
}

/// Thread-safe in-memory metrics recorder. Nothing is persisted.
#[derive(Default)]
pub struct MetricsRecorder {
    counters: RwLock<HashMap<String, Counter>>,
    gauges: RwLock<HashMap<String, Gauge>>,
    histograms: RwLock<HashMap<String, Histogram>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by n.
    pub fn counter_inc(&self, name: &str, n: u64) {
        let counters = self.counters.read();
        if let Some(c) = counters.get(name) {
            c.increment(n);
            return;
        }
        drop(counters);
        let mut counters = self.counters.write();
        let c = counters.entry(name.to_owned()).or_insert_with(Counter::new);
        c.increment(n);
    }

    pub fn counter_get(&self, name: &str) -> u64 {
        self.counters.read().get(name).map_or(0, Counter::get)
    }

    /// Set a gauge to a specific value.
    pub fn gauge_set(&self, name: &str, value: i64) {
        let gauges = self.gauges.read();
        if let Some(g) = gauges.get(name) {
            g.set(value);
            return;
        }
        drop(gauges);
        let mut gauges = self.gauges.write();
        let g = gauges.entry(name.to_owned()).or_insert_with(Gauge::new);
        g.set(value);
    }

    pub fn gauge_get(&self, name: &str) -> i64 {
        self.gauges.read().get(name).map_or(0, Gauge::get)
    }

    /// Record a histogram observation.
    pub fn histogram_observe(&self, name: &str, value: f64) {
        let histograms = self.histograms.read();
        if let Some(h) = histograms.get(name) {
            h.observe(value);
            return;
        }
        drop(histograms);
        let mut histograms = self.histograms.write();
        let h = histograms.entry(name.to_owned()).or_insert_with(Histogram::new);
        h.observe(value);
    }

    pub fn histogram_summary(&self, name: &str) -> HistogramSummary {
        self.histograms
            .read()
            .get(name)
            .map(Histogram::summary)
            .unwrap_or_default()
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            counters: self
                .counters
                .read()
                .iter()
                .map(|(k, c)| (k.clone(), c.get()))
                .collect(),
            gauges: self
                .gauges
                .read()
                .iter()
                .map(|(k, g)| (k.clone(), g.get()))
                .collect(),
            histograms: self
                .histograms
                .read()
                .iter()
                .map(|(k, h)| (k.clone(), h.summary()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_basic() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("bridge_calls_total", 1);
        recorder.counter_inc("bridge_calls_total", 2);
        assert_eq!(recorder.counter_get("bridge_calls_total"), 3);
        assert_eq!(recorder.counter_get("missing"), 0);
    }

    #[test]
    fn gauge_set() {
        let recorder = MetricsRecorder::new();
        recorder.gauge_set("bridge_pending_calls", 4);
        recorder.gauge_set("bridge_pending_calls", 1);
        assert_eq!(recorder.gauge_get("bridge_pending_calls"), 1);
    }

    #[test]
    fn histogram_observations() {
        let recorder = MetricsRecorder::new();
        for v in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0] {
            recorder.histogram_observe("bridge_call_duration_ms", v);
        }
        let summary = recorder.histogram_summary("bridge_call_duration_ms");
        assert_eq!(summary.count, 10);
        assert_eq!(summary.sum, 550.0);
        assert!(summary.p50 >= 50.0 && summary.p50 <= 60.0);
        assert!(summary.p95 >= 90.0);
    }

    #[test]
    fn histogram_empty() {
        let summary = MetricsRecorder::new().histogram_summary("nonexistent");
        assert_eq!(summary, HistogramSummary::default());
    }

    #[test]
    fn histogram_window_is_bounded() {
        let recorder = MetricsRecorder::new();
        for i in 0..(HISTOGRAM_WINDOW + 10) {
            recorder.histogram_observe("h", i as f64);
        }
        let summary = recorder.histogram_summary("h");
        assert_eq!(summary.count, (HISTOGRAM_WINDOW + 10) as u64);
        // Oldest observations fall out of the window.
        assert!(summary.p50 >= 10.0 + (HISTOGRAM_WINDOW / 2) as f64 - 1.0);
    }

    #[test]
    fn report_serializes_all_kinds() {
        let recorder = MetricsRecorder::new();
        recorder.counter_inc("c", 1);
        recorder.gauge_set("g", 2);
        recorder.histogram_observe("h", 3.0);
        let json = serde_json::to_value(recorder.report()).unwrap();
        assert_eq!(json["counters"]["c"], 1);
        assert_eq!(json["gauges"]["g"], 2);
        assert_eq!(json["histograms"]["h"]["count"], 1);
    }

    #[test]
    fn concurrent_counter_increments() {
        use std::sync::Arc;
        use std::thread;

        let recorder = Arc::new(MetricsRecorder::new());
        let mut handles = vec![];
        for _ in 0..10 {
            let r = recorder.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    r.counter_inc("concurrent.test", 1);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(recorder.counter_get("concurrent.test"), 10_000);
    }
}
