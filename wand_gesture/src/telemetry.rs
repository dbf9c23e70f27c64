use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    prediction_counter: Counter<u64>,
    error_counter: Counter<u64>,
    inference_duration: Histogram<u64>,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("wand_gesture");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let prediction_counter = meter
            .u64_counter("predictions_total")
            .with_description("Predictions served, by gesture")
            .build();

        let error_counter = meter
            .u64_counter("prediction_errors_total")
            .with_description("Rejected prediction requests, by error kind")
            .build();

        let boundaries = generate_boundaries(&[(50, 500, 50), (500, 5_000, 500), (5_000, 50_000, 5_000)]);

        let inference_duration = meter
            .u64_histogram("inference_duration_us")
            .with_boundaries(boundaries)
            .with_description("Duration of validation plus inference in microseconds")
            .build();

        Ok(Metrics {
            request_counter,
            prediction_counter,
            error_counter,
            inference_duration,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_prediction(&self, gesture: &str) {
        let attributes = vec![KeyValue::new("gesture", gesture.to_string())];
        self.prediction_counter.add(1, &attributes);
    }

    pub fn record_error(&self, kind: &'static str) {
        let attributes = vec![KeyValue::new("kind", kind)];
        self.error_counter.add(1, &attributes);
    }

    pub fn record_inference_duration(&self, duration_us: u64) {
        self.inference_duration.record(duration_us, &[]);
    }
}

/// Concatenates `(start, end, step)` ranges into sorted, deduplicated bucket boundaries.
fn generate_boundaries(segments: &[(u64, u64, usize)]) -> Vec<f64> {
    let mut seen = HashSet::new();
    segments
        .iter()
        .flat_map(|&(start, end, step)| (start..=end).step_by(step))
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}
