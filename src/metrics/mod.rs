//! In-memory metrics for the storefront API.
//!
//! Counters and gauges are plain atomics behind a shared registry, and
//! the whole registry renders as Prometheus text at `/metrics` or JSON
//! at `/metrics/json`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request, middleware::Next, response::Response, routing::get, Json, Router,
};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Gauge storing an f64 as raw bits so fractional values survive
#[derive(Debug, Clone)]
pub struct Gauge {
    value: Arc<AtomicU64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0f64.to_bits())),
        }
    }

    pub fn set(&self, value: f64) {
        self.value.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn add(&self, delta: f64) {
        let mut current = self.value.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Count-and-sum histogram, enough for latency averages
#[derive(Debug, Clone)]
pub struct Histogram {
    sum: Arc<Gauge>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: Arc::new(Gauge::new()),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn observe(&self, value: f64) {
        self.sum.add(value);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        self.sum.get()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    gauges: DashMap<String, Gauge>,
    histograms: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn gauge(&self, name: &str) -> Gauge {
        self.gauges.entry(name.to_string()).or_default().clone()
    }

    pub fn histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Renders the registry in Prometheus text exposition format
    pub fn render_text(&self) -> String {
        let mut output = String::new();
        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.get()));
        }
        for entry in self.gauges.iter() {
            let (name, gauge) = entry.pair();
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{} {}\n", name, gauge.get()));
        }
        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            output.push_str(&format!("# TYPE {} histogram\n", name));
            output.push_str(&format!("{}_count {}\n", name, histogram.get_count()));
            output.push_str(&format!("{}_sum {}\n", name, histogram.get_sum()));
        }
        output
    }

    pub fn render_json(&self) -> serde_json::Value {
        let mut counters = serde_json::Map::new();
        for entry in self.counters.iter() {
            counters.insert(entry.key().clone(), json!(entry.value().get()));
        }
        let mut gauges = serde_json::Map::new();
        for entry in self.gauges.iter() {
            gauges.insert(entry.key().clone(), json!(entry.value().get()));
        }
        let mut histograms = serde_json::Map::new();
        for entry in self.histograms.iter() {
            histograms.insert(
                entry.key().clone(),
                json!({
                    "count": entry.value().get_count(),
                    "sum": entry.value().get_sum(),
                }),
            );
        }
        json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        })
    }
}

pub static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

/// Purchase funnel metrics
pub struct StoreMetrics {
    pub cart_items_added: Counter,
    pub checkouts_started: Counter,
    pub payments_committed: Counter,
    pub payments_failed: Counter,
    pub revenue_total_aoa: Gauge,
}

impl StoreMetrics {
    fn new() -> Self {
        Self {
            cart_items_added: METRICS.counter("cart_items_added_total"),
            checkouts_started: METRICS.counter("checkouts_started_total"),
            payments_committed: METRICS.counter("payments_committed_total"),
            payments_failed: METRICS.counter("payments_failed_total"),
            revenue_total_aoa: METRICS.gauge("revenue_total_aoa"),
        }
    }

    pub fn record_commit(&self, amount: i64) {
        self.payments_committed.inc();
        self.revenue_total_aoa.add(amount as f64);
    }
}

pub static STORE_METRICS: Lazy<StoreMetrics> = Lazy::new(StoreMetrics::new);

/// Records request count, latency and status class for every request
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    METRICS.counter("http_requests_total").inc();
    METRICS
        .histogram("http_request_duration_seconds")
        .observe(start.elapsed().as_secs_f64());
    let class = match response.status().as_u16() {
        100..=199 => "http_status_1xx_total",
        200..=299 => "http_status_2xx_total",
        300..=399 => "http_status_3xx_total",
        400..=499 => "http_status_4xx_total",
        _ => "http_status_5xx_total",
    };
    METRICS.counter(class).inc();

    response
}

async fn metrics_text() -> String {
    METRICS.render_text()
}

async fn metrics_json() -> Json<serde_json::Value> {
    Json(METRICS.render_json())
}

pub fn metrics_routes<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new()
        .route("/", get(metrics_text))
        .route("/json", get(metrics_json))
}
