use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref ASSIGNMENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "assignments_total",
        "Total number of assignment rows processed during fan-out",
        &["outcome"]
    )
    .unwrap();

    pub static ref ATTEMPTS_COMPLETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempts_completed_total",
        "Total number of completed drill attempts",
        &["drill_type"]
    )
    .unwrap();

    pub static ref REVIEWS_COMPLETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reviews_completed_total",
        "Total number of completed human reviews",
        &["drill_type"]
    )
    .unwrap();

    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notifications_total",
        "Total number of notification deliveries",
        &["channel", "kind", "status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = ASSIGNMENTS_TOTAL.with_label_values(&["created"]).get();
    }

    #[test]
    fn test_render_metrics() {
        ATTEMPTS_COMPLETED_TOTAL
            .with_label_values(&["vocabulary"])
            .inc();

        let result = render_metrics();
        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.contains("attempts_completed_total"));
    }
}
