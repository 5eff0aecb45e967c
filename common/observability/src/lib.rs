use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};

#[derive(Clone)]
pub struct WorkboxMetrics {
    pub registry: Registry,
    pub login_attempts_total: IntCounterVec,
    pub stock_alerts_total: IntCounterVec,
    pub stock_alert_recipient_failures: IntCounter,
    pub activity_write_failures: IntCounter,
    pub reports_generated_total: IntCounterVec,
    pub report_generation_seconds: Histogram,
}

impl WorkboxMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let login_attempts_total = IntCounterVec::new(
            prometheus::Opts::new("login_attempts_total", "Login attempts by outcome"),
            &["outcome"],
        )
        .unwrap();
        let stock_alerts_total = IntCounterVec::new(
            prometheus::Opts::new(
                "stock_alerts_total",
                "Stock alert fan-outs triggered, by severity",
            ),
            &["severity"],
        )
        .unwrap();
        let stock_alert_recipient_failures = IntCounter::new(
            "stock_alert_recipient_failures_total",
            "Recipient notification writes that failed during stock alert fan-out",
        )
        .unwrap();
        let activity_write_failures = IntCounter::new(
            "activity_write_failures_total",
            "Activity log writes that failed and were dropped",
        )
        .unwrap();
        let reports_generated_total = IntCounterVec::new(
            prometheus::Opts::new("reports_generated_total", "Reports generated, by type"),
            &["type"],
        )
        .unwrap();
        let report_generation_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "report_generation_seconds",
                "Time spent rendering and persisting a report",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )
        .unwrap();

        let _ = registry.register(Box::new(login_attempts_total.clone()));
        let _ = registry.register(Box::new(stock_alerts_total.clone()));
        let _ = registry.register(Box::new(stock_alert_recipient_failures.clone()));
        let _ = registry.register(Box::new(activity_write_failures.clone()));
        let _ = registry.register(Box::new(reports_generated_total.clone()));
        let _ = registry.register(Box::new(report_generation_seconds.clone()));

        WorkboxMetrics {
            registry,
            login_attempts_total,
            stock_alerts_total,
            stock_alert_recipient_failures,
            activity_write_failures,
            reports_generated_total,
            report_generation_seconds,
        }
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_ok() {
            String::from_utf8(buffer).unwrap_or_default()
        } else {
            String::new()
        }
    }
}

impl Default for WorkboxMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_register_and_render() {
        let metrics = WorkboxMetrics::new();
        metrics
            .stock_alerts_total
            .with_label_values(&["critical"])
            .inc();
        metrics.stock_alert_recipient_failures.inc_by(2);

        let rendered = metrics.gather();
        assert!(rendered.contains("stock_alerts_total"));
        assert!(rendered.contains("stock_alert_recipient_failures_total 2"));
    }
}
