use once_cell::sync::Lazy;
use prometheus::{
    opts, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder,
};

macro_rules! counter_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| IntCounterVec::new(opts!($name, $help), $labels).unwrap())
    };
}
macro_rules! histogram_vec {
    ($name:expr, $help:expr, $labels:expr) => {
        Lazy::new(|| {
            HistogramVec::new(HistogramOpts::new($name, $help).buckets(LATENCY_BUCKETS.to_vec()), $labels)
                .unwrap()
        })
    };
}
macro_rules! counter {
    ($name:expr, $help:expr) => {
        Lazy::new(|| IntCounter::new($name, $help).unwrap())
    };
}

const LATENCY_BUCKETS: [f64; 11] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

// ── HTTP ────────────────────────────────────────────────────────────────────
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> =
    counter_vec!("http_requests_total", "Total HTTP requests", &["method", "path", "status"]);
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> =
    histogram_vec!("http_request_duration_seconds", "HTTP request latency", &["method", "path"]);

// ── Movies ──────────────────────────────────────────────────────────────────
pub static MOVIE_EDIT_CONFLICTS: Lazy<IntCounter> =
    counter!("movie_edit_conflicts_total", "Movie updates rejected by the version check");
pub static VALIDATION_FAILURES: Lazy<IntCounterVec> = counter_vec!(
    "validation_failures_total",
    "Requests rejected before reaching storage",
    &["kind"]
);

pub fn register_all(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    registry.register(Box::new(MOVIE_EDIT_CONFLICTS.clone()))?;
    registry.register(Box::new(VALIDATION_FAILURES.clone()))?;
    Ok(())
}

pub fn gather_metrics(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_prefixed() {
        let registry = Registry::new_custom(Some("test".into()), None).unwrap();
        register_all(&registry).unwrap();

        HTTP_REQUESTS_TOTAL.with_label_values(&["GET", "/v1/movies", "200"]).inc();
        MOVIE_EDIT_CONFLICTS.inc();
        VALIDATION_FAILURES.with_label_values(&["body"]).inc();
        HTTP_REQUEST_DURATION.with_label_values(&["GET", "/v1/movies"]).observe(0.01);

        for family in registry.gather() {
            assert!(
                family.get_name().starts_with("test_"),
                "metric {} missing prefix",
                family.get_name()
            );
        }

        let text = gather_metrics(&registry);
        assert!(text.contains("test_movie_edit_conflicts_total"));
    }
}
