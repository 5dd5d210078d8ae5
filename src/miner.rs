//! Random-nonce proof-of-work search.
//!
//! Every trial draws a fresh 32-byte nonce, hashes it behind the load hash and
//! stops at the first digest with enough leading zero bytes. With more than
//! one worker the search becomes a race: workers share only the read-only
//! load hash and a one-shot winner slot, and check both the slot and the
//! caller's [`CancelToken`] between trials.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::difficulty::{self, Difficulty, meets_difficulty, work_hash};
use crate::error::{PowError, Result};
use crate::hasher::{Sha256Hasher, WorkHasher};
use crate::prng::{Entropy, NonceSource};
use crate::types::{AuxBindings, Digest, Nonce, Solution};

pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

// Deadline checks read the clock, so only do it every 64 trials.
const DEADLINE_CHECK_MASK: u64 = 0x3f;

/// Cooperative cancellation shared between a caller and a running search.
///
/// Clones observe the same flag. A deadline, if set, cancels implicitly once
/// it passes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flagged() || self.expired()
    }

    fn flagged(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Periodic search feedback. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub worker: u32,
    /// Trials this worker has run so far.
    pub trials: u64,
}

pub type ProgressObserver = Arc<dyn Fn(Progress) + Send + Sync>;

pub struct Miner<H = Sha256Hasher> {
    hasher: H,
    entropy: Entropy,
    workers: u32,
    progress_interval: u64,
    progress: Option<ProgressObserver>,
}

impl Miner<Sha256Hasher> {
    pub fn new() -> Self {
        Self::with_hasher(Sha256Hasher)
    }
}

impl Default for Miner<Sha256Hasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: WorkHasher> Miner<H> {
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            hasher,
            entropy: Entropy::Secure,
            workers: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress: None,
        }
    }

    pub fn entropy(mut self, entropy: Entropy) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn workers(mut self, workers: u32) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Report progress every `interval` trials per worker. Zero disables it.
    pub fn progress(mut self, interval: u64, observer: ProgressObserver) -> Self {
        self.progress_interval = interval;
        self.progress = Some(observer);
        self
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn worker_count(&self) -> u32 {
        self.workers
    }

    /// Search until a nonce satisfies `difficulty` or `cancel` fires.
    ///
    /// There is no internal bound: expected work is `256^difficulty` trials.
    pub fn solve(
        &self,
        payload: &[u8],
        aux: &AuxBindings,
        difficulty: Difficulty,
        cancel: &CancelToken,
    ) -> Result<Solution> {
        let load_hash = aux.load_hash(&self.hasher, payload);
        debug!(
            %difficulty,
            workers = self.workers,
            load_hash = %hex::encode(load_hash),
            "mining started"
        );
        let started = Instant::now();

        let (found, trials) = if self.workers == 1 {
            let mut source = self.entropy.source_for(0);
            self.search(0, &load_hash, difficulty, source.as_mut(), cancel, &|| false)
        } else {
            self.race(&load_hash, difficulty, cancel)
        };

        let elapsed = started.elapsed();
        match found {
            Some((nonce, work_hash)) => {
                debug!(
                    trials,
                    elapsed_ms = elapsed.as_millis() as u64,
                    work_hash = %hex::encode(work_hash),
                    "mining finished"
                );
                Ok(Solution { load_hash, nonce, work_hash, trials })
            }
            None => {
                debug!(trials, elapsed_ms = elapsed.as_millis() as u64, "mining cancelled");
                Err(PowError::Cancelled)
            }
        }
    }

    pub fn verify(
        &self,
        load_hash: &Digest,
        nonce: &Nonce,
        claimed: &Digest,
        difficulty: Difficulty,
    ) -> bool {
        difficulty::verify(&self.hasher, load_hash, nonce, claimed, difficulty)
    }

    fn race(
        &self,
        load_hash: &Digest,
        difficulty: Difficulty,
        cancel: &CancelToken,
    ) -> (Option<(Nonce, Digest)>, u64) {
        let winner: OnceLock<(Nonce, Digest)> = OnceLock::new();
        let total = AtomicU64::new(0);
        let (winner_ref, total_ref) = (&winner, &total);

        thread::scope(|s| {
            for worker in 0..self.workers {
                let mut source = self.entropy.source_for(worker);
                s.spawn(move || {
                    let stop = || winner_ref.get().is_some();
                    let (found, trials) =
                        self.search(worker, load_hash, difficulty, source.as_mut(), cancel, &stop);
                    total_ref.fetch_add(trials, Ordering::Relaxed);
                    if let Some(hit) = found {
                        // Losing a near-simultaneous race is fine; one winner is kept.
                        let _ = winner_ref.set(hit);
                    }
                });
            }
        });

        (winner.into_inner(), total.into_inner())
    }

    fn search(
        &self,
        worker: u32,
        load_hash: &Digest,
        difficulty: Difficulty,
        source: &mut dyn NonceSource,
        cancel: &CancelToken,
        stop: &dyn Fn() -> bool,
    ) -> (Option<(Nonce, Digest)>, u64) {
        let mut nonce = [0u8; 32];
        let mut trials: u64 = 0;
        loop {
            if stop() || cancel.flagged() {
                return (None, trials);
            }
            if trials & DEADLINE_CHECK_MASK == 0 && cancel.expired() {
                return (None, trials);
            }

            source.fill_nonce(&mut nonce);
            let candidate = work_hash(&self.hasher, load_hash, &nonce);
            trials += 1;

            if meets_difficulty(&candidate, difficulty) {
                return (Some((nonce, candidate)), trials);
            }
            if let Some(observer) = &self.progress {
                if self.progress_interval > 0 && trials % self.progress_interval == 0 {
                    observer(Progress { worker, trials });
                }
            }
        }
    }
}

impl<H> fmt::Debug for Miner<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Miner")
            .field("entropy", &self.entropy)
            .field("workers", &self.workers)
            .field("progress_interval", &self.progress_interval)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn seeded() -> Miner {
        Miner::new().entropy(Entropy::Seeded(*b"garry-pow-tests!"))
    }

    #[test]
    fn difficulty_zero_takes_one_trial() {
        let sol = seeded()
            .solve(b"anything", &AuxBindings::None, Difficulty::ZERO, &CancelToken::new())
            .unwrap();
        assert_eq!(sol.trials, 1);
    }

    #[test]
    fn worker_count_is_at_least_one() {
        assert_eq!(Miner::new().workers(0).worker_count(), 1);
        assert_eq!(Miner::new().workers(4).worker_count(), 4);
    }

    #[test]
    fn seeded_search_is_reproducible() {
        let d = Difficulty::new(1).unwrap();
        let a = seeded().solve(b"hello", &AuxBindings::None, d, &CancelToken::new()).unwrap();
        let b = seeded().solve(b"hello", &AuxBindings::None, d, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn solution_verifies() {
        let miner = seeded();
        let aux = AuxBindings::TaggedTimed { tag: "t".into(), time: 1_700_000_000_000 };
        let d = Difficulty::new(1).unwrap();
        let sol = miner.solve(b"payload", &aux, d, &CancelToken::new()).unwrap();
        assert_eq!(sol.load_hash, aux.load_hash(miner.hasher(), b"payload"));
        assert!(miner.verify(&sol.load_hash, &sol.nonce, &sol.work_hash, d));
    }

    #[test]
    fn already_cancelled_token_stops_before_first_trial() {
        let token = CancelToken::new();
        token.cancel();
        let err = seeded().solve(b"x", &AuxBindings::None, Difficulty::ZERO, &token).unwrap_err();
        assert!(matches!(err, PowError::Cancelled));
    }

    #[test]
    fn progress_fires_at_interval() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let miner = seeded().progress(10, Arc::new(move |p: Progress| sink.lock().unwrap().push(p.trials)));
        let sol = miner
            .solve(b"hello", &AuxBindings::None, Difficulty::new(1).unwrap(), &CancelToken::new())
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len() as u64, (sol.trials - 1) / 10);
        assert!(seen.iter().all(|t| t % 10 == 0));
    }

    #[test]
    fn race_produces_valid_work() {
        let miner = seeded().workers(4);
        let d = Difficulty::new(1).unwrap();
        let sol = miner.solve(b"race", &AuxBindings::tagged("x"), d, &CancelToken::new()).unwrap();
        assert!(miner.verify(&sol.load_hash, &sol.nonce, &sol.work_hash, d));
        assert!(sol.trials >= 1);
    }

    #[test]
    fn race_honours_deadline() {
        let miner = seeded().workers(3);
        let token = CancelToken::new().with_timeout(Duration::from_millis(30));
        let started = Instant::now();
        let err = miner
            .solve(b"x", &AuxBindings::None, Difficulty::new(16).unwrap(), &token)
            .unwrap_err();
        assert!(matches!(err, PowError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
