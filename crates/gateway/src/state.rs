use inference::ObjectDetector;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use sysinfo::System;

#[derive(Clone)]
pub struct AppState {
    /// `None` only when the router is built without a model.
    pub detector: Option<Arc<dyn ObjectDetector>>,
    pub confidence_threshold: f32,
    pub metrics: VerifyMetrics,
    pub system: SystemMonitor,
}

impl AppState {
    pub fn new(detector: Option<Arc<dyn ObjectDetector>>, confidence_threshold: f32) -> Self {
        Self {
            detector,
            confidence_threshold,
            metrics: VerifyMetrics::new("gateway"),
            system: SystemMonitor::new(),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.detector.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Verified,
    Unverified,
    Rejected,
    Failed,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Verified => "verified",
            Outcome::Unverified => "unverified",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

#[derive(Clone)]
pub struct VerifyMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
}

impl VerifyMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];

        let duration = meter
            .f64_histogram("verify_duration_seconds")
            .with_description("Time to handle one verification (decode + infer + select)")
            .with_unit("s")
            .with_boundaries(latency_buckets.to_vec())
            .build();
        let requests = meter
            .u64_counter("verify_requests_total")
            .with_description("Verification requests by outcome")
            .build();

        Self { duration, requests }
    }

    pub fn record(&self, outcome: Outcome, elapsed_secs: f64) {
        let attributes = [KeyValue::new("outcome", outcome.as_str())];
        self.requests.add(1, &attributes);
        self.duration.record(elapsed_secs, &attributes);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemSnapshot {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub cpu_count: usize,
    pub cuda_available: bool,
    pub cuda_device_count: usize,
}

/// Shared `sysinfo` handle; CPU usage is measured between consecutive snapshots.
#[derive(Clone)]
pub struct SystemMonitor {
    inner: Arc<Mutex<System>>,
    cuda_device_count: usize,
}

impl SystemMonitor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(System::new())),
            cuda_device_count: inference::cuda_device_count(),
        }
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        let mut system = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        system.refresh_cpu();
        system.refresh_memory();

        let total = system.total_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            (system.used_memory() as f64 / total as f64 * 100.0) as f32
        };

        SystemSnapshot {
            cpu_percent: system.global_cpu_info().cpu_usage(),
            memory_percent,
            cpu_count: system.cpus().len(),
            cuda_available: self.cuda_device_count > 0,
            cuda_device_count: self.cuda_device_count,
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}
