//! Alert transport (§4.10). Out of scope as business logic; a logging
//! default keeps the monitor loop real-and-runnable without a paging
//! integration.

use super::fetcher::DataPoint;

#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, task: &str, series: &str, lower: f64, upper: f64, last_bad_point: DataPoint);
}

pub struct LoggingAlertSink;

#[async_trait::async_trait]
impl AlertSink for LoggingAlertSink {
    async fn alert(&self, task: &str, series: &str, lower: f64, upper: f64, last_bad_point: DataPoint) {
        tracing::warn!(
            task,
            series,
            lower,
            upper,
            bad_stamp = %last_bad_point.stamp,
            bad_value = last_bad_point.value,
            "series out of bounds"
        );
    }
}
