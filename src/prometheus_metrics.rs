use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, gauge::Gauge, histogram::Histogram},
    registry::Registry,
};

use crate::metrics::{ErrorType, Metrics};

pub struct PrometheusMetrics {
    registry: Registry,

    trials: Counter,
    solves: Counter,
    cancellations: Counter,
    accepted_submissions: Counter,
    rejected_submissions: Counter,
    transport_errors: Counter,
    malformed_errors: Counter,
    validation_errors: Counter,

    uptime_seconds: Gauge<i64>,
    hashes_per_second: Gauge<i64>,

    solve_duration_ms: Histogram,
    gateway_latency_ms: Histogram,
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let trials = Counter::default();
        let solves = Counter::default();
        let cancellations = Counter::default();
        let accepted_submissions = Counter::default();
        let rejected_submissions = Counter::default();
        let transport_errors = Counter::default();
        let malformed_errors = Counter::default();
        let validation_errors = Counter::default();

        let uptime_seconds = Gauge::default();
        let hashes_per_second = Gauge::default();

        // Solve time spans orders of magnitude per difficulty step.
        let solve_duration_ms = Histogram::new(
            [1.0, 10.0, 100.0, 1_000.0, 10_000.0, 60_000.0, 600_000.0].into_iter(),
        );
        let gateway_latency_ms = Histogram::new(
            [1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0].into_iter(),
        );

        registry.register("garry_pow_trials", "Hash trials run by the miner", trials.clone());
        registry.register("garry_pow_solves", "Searches that found valid work", solves.clone());
        registry.register(
            "garry_pow_cancellations",
            "Searches abandoned by cancellation or deadline",
            cancellations.clone(),
        );
        registry.register(
            "garry_pow_accepted_submissions",
            "Submissions the gateway accepted",
            accepted_submissions.clone(),
        );
        registry.register(
            "garry_pow_rejected_submissions",
            "Submissions the gateway rejected",
            rejected_submissions.clone(),
        );
        registry.register(
            "garry_pow_transport_errors",
            "Network failures talking to the gateway",
            transport_errors.clone(),
        );
        registry.register(
            "garry_pow_malformed_errors",
            "Gateway responses that failed to parse",
            malformed_errors.clone(),
        );
        registry.register(
            "garry_pow_validation_errors",
            "Inputs rejected before any work was done",
            validation_errors.clone(),
        );
        registry.register("garry_pow_uptime_seconds", "Process uptime in seconds", uptime_seconds.clone());
        registry.register(
            "garry_pow_hashes_per_second",
            "Mean hash rate over all solves",
            hashes_per_second.clone(),
        );
        registry.register(
            "garry_pow_solve_duration_ms",
            "Wall time of successful searches in milliseconds",
            solve_duration_ms.clone(),
        );
        registry.register(
            "garry_pow_gateway_latency_ms",
            "Gateway request latency in milliseconds",
            gateway_latency_ms.clone(),
        );

        Self {
            registry,
            trials,
            solves,
            cancellations,
            accepted_submissions,
            rejected_submissions,
            transport_errors,
            malformed_errors,
            validation_errors,
            uptime_seconds,
            hashes_per_second,
            solve_duration_ms,
            gateway_latency_ms,
        }
    }

    pub fn update_from_metrics(&self, metrics: &Metrics) {
        self.uptime_seconds.set(metrics.uptime_seconds as i64);
        self.hashes_per_second.set(metrics.hashes_per_second as i64);
    }

    pub fn record_solve(&self, trials: u64, duration_ms: u64) {
        self.trials.inc_by(trials);
        self.solves.inc();
        self.solve_duration_ms.observe(duration_ms as f64);
    }

    pub fn record_submission(&self, accepted: bool, latency_ms: f64) {
        if accepted {
            self.accepted_submissions.inc();
        } else {
            self.rejected_submissions.inc();
        }
        self.gateway_latency_ms.observe(latency_ms);
    }

    pub fn record_error(&self, error_type: ErrorType) {
        match error_type {
            ErrorType::Transport => self.transport_errors.inc(),
            ErrorType::Malformed => self.malformed_errors.inc(),
            ErrorType::Validation => self.validation_errors.inc(),
            ErrorType::Cancelled => self.cancellations.inc(),
            // Already counted by record_submission.
            ErrorType::Rejected => 0,
        };
    }

    pub fn export_metrics(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}
