use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::PowError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    // Mining
    pub total_trials: u64,
    pub solves: u64,
    pub cancellations: u64,
    pub average_solve_ms: f64,
    pub min_solve_ms: u64,
    pub max_solve_ms: u64,
    pub hashes_per_second: f64,

    // Gateway
    pub accepted_submissions: u64,
    pub rejected_submissions: u64,

    // Errors
    pub transport_errors: u64,
    pub rejected_errors: u64,
    pub malformed_errors: u64,
    pub validation_errors: u64,

    pub uptime_seconds: u64,
    pub last_solve_seconds: Option<u64>,
}

#[derive(Debug)]
pub struct MetricsCollector {
    total_trials: AtomicU64,
    solves: AtomicU64,
    cancellations: AtomicU64,
    accepted_submissions: AtomicU64,
    rejected_submissions: AtomicU64,
    transport_errors: AtomicU64,
    rejected_errors: AtomicU64,
    malformed_errors: AtomicU64,
    validation_errors: AtomicU64,

    start_time: Instant,
    last_solve_time: Mutex<Option<Instant>>,

    solve_time_ms: AtomicU64,
    min_solve_ms: AtomicU64,
    max_solve_ms: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            total_trials: AtomicU64::new(0),
            solves: AtomicU64::new(0),
            cancellations: AtomicU64::new(0),
            accepted_submissions: AtomicU64::new(0),
            rejected_submissions: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            rejected_errors: AtomicU64::new(0),
            malformed_errors: AtomicU64::new(0),
            validation_errors: AtomicU64::new(0),
            start_time: Instant::now(),
            last_solve_time: Mutex::new(None),
            solve_time_ms: AtomicU64::new(0),
            min_solve_ms: AtomicU64::new(u64::MAX),
            max_solve_ms: AtomicU64::new(0),
        }
    }

    pub fn record_solve(&self, trials: u64, time_ms: u64) {
        self.total_trials.fetch_add(trials, Ordering::Relaxed);
        self.solves.fetch_add(1, Ordering::Relaxed);
        self.solve_time_ms.fetch_add(time_ms, Ordering::Relaxed);
        if let Ok(mut last) = self.last_solve_time.lock() {
            *last = Some(Instant::now());
        }
        self.min_solve_ms.fetch_min(time_ms, Ordering::Relaxed);
        self.max_solve_ms.fetch_max(time_ms, Ordering::Relaxed);
    }

    pub fn record_submission(&self, accepted: bool) {
        if accepted {
            self.accepted_submissions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_submissions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_error(&self, error_type: ErrorType) {
        match error_type {
            ErrorType::Transport => self.transport_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Rejected => self.rejected_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Malformed => self.malformed_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Validation => self.validation_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Cancelled => self.cancellations.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn get_metrics(&self) -> Metrics {
        let total_trials = self.total_trials.load(Ordering::Relaxed);
        let solves = self.solves.load(Ordering::Relaxed);
        let solve_time_ms = self.solve_time_ms.load(Ordering::Relaxed);
        let min_solve_ms = self.min_solve_ms.load(Ordering::Relaxed);

        let average_solve_ms = if solves > 0 {
            solve_time_ms as f64 / solves as f64
        } else {
            0.0
        };
        let hashes_per_second = if solve_time_ms > 0 {
            total_trials as f64 * 1000.0 / solve_time_ms as f64
        } else {
            0.0
        };
        let last_solve_seconds = self
            .last_solve_time
            .lock()
            .ok()
            .and_then(|t| t.map(|t| t.duration_since(self.start_time).as_secs()));

        Metrics {
            total_trials,
            solves,
            cancellations: self.cancellations.load(Ordering::Relaxed),
            average_solve_ms,
            min_solve_ms: if min_solve_ms == u64::MAX { 0 } else { min_solve_ms },
            max_solve_ms: self.max_solve_ms.load(Ordering::Relaxed),
            hashes_per_second,
            accepted_submissions: self.accepted_submissions.load(Ordering::Relaxed),
            rejected_submissions: self.rejected_submissions.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            rejected_errors: self.rejected_errors.load(Ordering::Relaxed),
            malformed_errors: self.malformed_errors.load(Ordering::Relaxed),
            validation_errors: self.validation_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            last_solve_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Transport,
    Rejected,
    Malformed,
    Validation,
    Cancelled,
}

impl From<&PowError> for ErrorType {
    fn from(err: &PowError) -> Self {
        match err {
            PowError::Transport(_) => ErrorType::Transport,
            PowError::Rejected { .. } => ErrorType::Rejected,
            PowError::MalformedResponse(_) => ErrorType::Malformed,
            PowError::Cancelled => ErrorType::Cancelled,
            PowError::InvalidDifficulty(_) | PowError::InvalidHex { .. } | PowError::InvalidUrl(_) => {
                ErrorType::Validation
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_stats_accumulate() {
        let m = MetricsCollector::new();
        m.record_solve(300, 10);
        m.record_solve(100, 30);
        let s = m.get_metrics();
        assert_eq!(s.solves, 2);
        assert_eq!(s.total_trials, 400);
        assert_eq!((s.min_solve_ms, s.max_solve_ms), (10, 30));
        assert_eq!(s.average_solve_ms, 20.0);
        assert_eq!(s.hashes_per_second, 10_000.0);
        assert!(s.last_solve_seconds.is_some());
    }

    #[test]
    fn empty_snapshot_has_no_sentinels() {
        let s = MetricsCollector::new().get_metrics();
        assert_eq!(s.min_solve_ms, 0);
        assert_eq!(s.last_solve_seconds, None);
    }

    #[test]
    fn errors_are_classified() {
        let m = MetricsCollector::new();
        m.record_error(ErrorType::from(&PowError::Cancelled));
        m.record_error(ErrorType::from(&PowError::MalformedResponse("x".into())));
        m.record_error(ErrorType::from(&PowError::InvalidDifficulty("99".into())));
        let s = m.get_metrics();
        assert_eq!((s.cancellations, s.malformed_errors, s.validation_errors), (1, 1, 1));
    }
}
