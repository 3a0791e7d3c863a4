//! In-process engine metrics.
//!
//! Plain atomics so they can be read from tests or exported by the host.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Thread-safe atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Thread-safe atomic gauge.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Fixed-bucket latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    bounds: Vec<u64>,
    buckets: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(bounds: Vec<u64>) -> Self {
        let buckets = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            buckets,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn latency_ms() -> Self {
        Self::new(vec![10, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000])
    }

    pub fn observe(&self, value_ms: u64) {
        let idx = self
            .bounds
            .iter()
            .position(|&bound| value_ms <= bound)
            .unwrap_or(self.bounds.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value_ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.sum.load(Ordering::Relaxed) as f64 / n as f64,
        }
    }
}

/// Counters for the graph engine and its collaborators.
#[derive(Debug)]
pub struct EngineMetrics {
    pub steps: Counter,
    pub reasoning_calls: Counter,
    pub reasoning_retries: Counter,
    pub reasoning_failures: Counter,
    pub tool_calls: Counter,
    pub tool_errors: Counter,
    pub pauses: Counter,
    pub approvals: Counter,
    pub denials: Counter,
    pub active_turns: Gauge,
    pub tool_latency: Histogram,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self {
            steps: Counter::default(),
            reasoning_calls: Counter::default(),
            reasoning_retries: Counter::default(),
            reasoning_failures: Counter::default(),
            tool_calls: Counter::default(),
            tool_errors: Counter::default(),
            pauses: Counter::default(),
            approvals: Counter::default(),
            denials: Counter::default(),
            active_turns: Gauge::default(),
            tool_latency: Histogram::latency_ms(),
        }
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tool(&self, duration_ms: u64, is_error: bool) {
        self.tool_calls.inc();
        if is_error {
            self.tool_errors.inc();
        }
        self.tool_latency.observe(duration_ms);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            steps: self.steps.get(),
            reasoning_calls: self.reasoning_calls.get(),
            reasoning_retries: self.reasoning_retries.get(),
            reasoning_failures: self.reasoning_failures.get(),
            tool_calls: self.tool_calls.get(),
            tool_errors: self.tool_errors.get(),
            pauses: self.pauses.get(),
            approvals: self.approvals.get(),
            denials: self.denials.get(),
            active_turns: self.active_turns.get(),
            mean_tool_latency_ms: self.tool_latency.mean(),
        }
    }
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub steps: u64,
    pub reasoning_calls: u64,
    pub reasoning_retries: u64,
    pub reasoning_failures: u64,
    pub tool_calls: u64,
    pub tool_errors: u64,
    pub pauses: u64,
    pub approvals: u64,
    pub denials: u64,
    pub active_turns: i64,
    pub mean_tool_latency_ms: f64,
}
