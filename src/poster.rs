//! Mine, encode and submit in one call.

use std::sync::Arc;
use std::time::Instant;

use reqwest::Url;
use tracing::info;

use crate::codec;
use crate::difficulty::Difficulty;
use crate::error::{PowError, Result};
use crate::error_handling::{ErrorHandler, RetryConfig};
use crate::gateway::GatewayClient;
use crate::hasher::WorkHasher;
use crate::metrics::MetricsCollector;
use crate::miner::{CancelToken, Miner};
use crate::prometheus_metrics::PrometheusMetrics;
use crate::types::{AuxBindings, Solution, SubmissionRecord};

/// Outcome of an accepted post.
#[derive(Debug, Clone)]
pub struct Posted {
    pub record: SubmissionRecord,
    pub solution: Solution,
    pub content_id: String,
    pub url: Url,
}

pub struct Poster<H> {
    miner: Arc<Miner<H>>,
    gateway: GatewayClient,
    metrics: Arc<MetricsCollector>,
    prometheus: Option<Arc<PrometheusMetrics>>,
    errors: ErrorHandler,
}

impl<H: WorkHasher + 'static> Poster<H> {
    pub fn new(miner: Miner<H>, gateway: GatewayClient, metrics: Arc<MetricsCollector>) -> Self {
        let errors = ErrorHandler::new(Arc::clone(&metrics));
        Self { miner: Arc::new(miner), gateway, metrics, prometheus: None, errors }
    }

    pub fn with_prometheus(mut self, prometheus: Arc<PrometheusMetrics>) -> Self {
        self.errors = self.errors.with_prometheus(Arc::clone(&prometheus));
        self.prometheus = Some(prometheus);
        self
    }

    /// Retry policy for the submit step of [`Poster::post`].
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.errors = self.errors.with_retry_config(config);
        self
    }

    pub fn miner(&self) -> &Miner<H> {
        &self.miner
    }

    pub fn gateway(&self) -> &GatewayClient {
        &self.gateway
    }

    /// Run the search on a blocking thread so the runtime stays responsive.
    pub async fn mine(
        &self,
        val: &str,
        aux: &AuxBindings,
        difficulty: Difficulty,
        cancel: &CancelToken,
    ) -> Result<Solution> {
        let miner = Arc::clone(&self.miner);
        let payload = val.as_bytes().to_vec();
        let aux_owned = aux.clone();
        let token = cancel.clone();
        let started = Instant::now();

        let joined = tokio::task::spawn_blocking(move || {
            miner.solve(&payload, &aux_owned, difficulty, &token)
        })
        .await;
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // Runtime shutting down under us.
            Err(_) => Err(PowError::Cancelled),
        };

        match &result {
            Ok(sol) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.metrics.record_solve(sol.trials, elapsed_ms);
                if let Some(p) = &self.prometheus {
                    p.record_solve(sol.trials, elapsed_ms);
                }
            }
            Err(err) => self.errors.record(err),
        }
        result
    }

    /// One submission attempt. Errors are left for the caller's
    /// [`ErrorHandler`] to count.
    pub async fn submit(&self, record: &SubmissionRecord) -> Result<()> {
        let started = Instant::now();
        let result = self.gateway.submit(record).await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(()) => self.record_submission(true, latency_ms),
            Err(PowError::Rejected { .. }) => self.record_submission(false, latency_ms),
            Err(_) => {}
        }
        result
    }

    /// Mine `val`, submit it, and return where it can be fetched from.
    pub async fn post(
        &self,
        val: &str,
        aux: &AuxBindings,
        difficulty: Difficulty,
        cancel: &CancelToken,
    ) -> Result<Posted> {
        let solution = self.mine(val, aux, difficulty, cancel).await?;
        let record = codec::encode_submission(val, aux, &solution.nonce, &solution.work_hash);
        self.errors.execute_with_retry(|| self.submit(&record)).await?;

        let url = self.gateway.content_url(&solution.work_hash)?;
        let content_id = codec::content_id(&solution.work_hash);
        info!(%content_id, trials = solution.trials, "posted");
        Ok(Posted { record, solution, content_id, url })
    }

    fn record_submission(&self, accepted: bool, latency_ms: f64) {
        self.metrics.record_submission(accepted);
        if let Some(p) = &self.prometheus {
            p.record_submission(accepted, latency_ms);
        }
    }
}
