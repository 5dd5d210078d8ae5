use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::{PowError, Result};
use crate::metrics::{ErrorType, MetricsCollector};
use crate::prometheus_metrics::PrometheusMetrics;

/// Caller-side retry policy for gateway calls.
///
/// Only transient failures ([`PowError::is_transient`]) are retried; a
/// rejection or a malformed response is returned on first sight.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_retry_delay.as_secs_f64()),
        )
    }
}

/// Runs gateway calls under the retry policy and is the one place errors
/// get counted. Every failed attempt is recorded exactly once, in both sinks.
pub struct ErrorHandler {
    retry_config: RetryConfig,
    metrics: Arc<MetricsCollector>,
    prometheus: Option<Arc<PrometheusMetrics>>,
}

impl ErrorHandler {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { retry_config: RetryConfig::default(), metrics, prometheus: None }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn with_prometheus(mut self, prometheus: Arc<PrometheusMetrics>) -> Self {
        self.prometheus = Some(prometheus);
        self
    }

    pub async fn execute_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.retry_config.retry_delay;
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    self.record(&err);
                    if !err.is_transient() || attempt >= self.retry_config.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying gateway call");
                    tokio::time::sleep(delay).await;
                    delay = self.retry_config.next_delay(delay);
                }
            }
        }
    }

    pub fn record(&self, err: &PowError) {
        let kind = ErrorType::from(err);
        self.metrics.record_error(kind);
        if let Some(p) = &self.prometheus {
            p.record_error(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> RetryConfig {
        RetryConfig { retry_delay: Duration::from_millis(1), ..RetryConfig::default() }
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = RetryConfig { max_retry_delay: Duration::from_secs(3), ..RetryConfig::default() };
        assert_eq!(cfg.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(cfg.next_delay(Duration::from_secs(2)), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let metrics = Arc::new(MetricsCollector::new());
        let handler = ErrorHandler::new(metrics.clone()).with_retry_config(quick());
        let calls = AtomicU32::new(0);
        let res: Result<()> = handler
            .execute_with_retry(|| {
                calls.fetch_add(1, Ordering::Relaxed);
                async { Err(PowError::Rejected { status: 400, message: "invalid work: -1".into() }) }
            })
            .await;
        assert!(matches!(res, Err(PowError::Rejected { status: 400, .. })));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_metrics().rejected_errors, 1);
    }

    #[tokio::test]
    async fn each_failed_attempt_is_counted_once_in_both_sinks() {
        let metrics = Arc::new(MetricsCollector::new());
        let prometheus = Arc::new(PrometheusMetrics::new());
        let handler = ErrorHandler::new(metrics.clone())
            .with_retry_config(RetryConfig { max_retries: 0, ..quick() })
            .with_prometheus(prometheus.clone());

        let res: Result<()> = handler
            .execute_with_retry(|| async { Err(PowError::MalformedResponse("eof".into())) })
            .await;
        assert!(matches!(res, Err(PowError::MalformedResponse(_))));
        assert_eq!(metrics.get_metrics().malformed_errors, 1);
        let text = prometheus.export_metrics().unwrap();
        assert!(text.contains("garry_pow_malformed_errors_total 1"), "{text}");
    }

    #[tokio::test]
    async fn success_passes_through() {
        let handler = ErrorHandler::new(Arc::new(MetricsCollector::new())).with_retry_config(quick());
        let v = handler.execute_with_retry(|| async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
    }
}
