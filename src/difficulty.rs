//! Leading-zero-byte difficulty and the shared validity predicate.
//!
//! The miner's hot loop and every verifier go through [`meets_difficulty`],
//! so the two can never disagree about what counts as valid work.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PowError;
use crate::hasher::{HASH_LEN, WorkHasher};

pub const MAX_DIFFICULTY: u32 = HASH_LEN as u32;

/// Number of leading zero bytes (not bits) a work hash must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Difficulty(u32);

impl Difficulty {
    pub const ZERO: Difficulty = Difficulty(0);

    pub fn new(bytes: u32) -> Result<Self, PowError> {
        if bytes > MAX_DIFFICULTY {
            return Err(PowError::InvalidDifficulty(bytes.to_string()));
        }
        Ok(Self(bytes))
    }

    pub fn bytes(self) -> usize {
        self.0 as usize
    }

    /// Expected number of trials, `256^d`.
    pub fn expected_trials(self) -> f64 {
        256f64.powi(self.0 as i32)
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = PowError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Difficulty::new(value)
    }
}

impl From<Difficulty> for u32 {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}

impl FromStr for Difficulty {
    type Err = PowError;

    /// Parses untyped input (form fields, env vars). Negative, fractional and
    /// oversized values are rejected here rather than in the search loop.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: u32 = s
            .trim()
            .parse()
            .map_err(|_| PowError::InvalidDifficulty(s.to_string()))?;
        Difficulty::new(bytes)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// True iff the first `difficulty` bytes of `hash` are zero.
#[inline]
pub fn meets_difficulty(hash: &[u8; HASH_LEN], difficulty: Difficulty) -> bool {
    for &b in &hash[..difficulty.bytes()] {
        if b != 0 {
            return false;
        }
    }
    true
}

/// Count of leading zero bytes, i.e. the highest difficulty `hash` satisfies.
pub fn leading_zero_bytes(hash: &[u8; HASH_LEN]) -> u32 {
    hash.iter().take_while(|&&b| b == 0).count() as u32
}

/// `H(load_hash || nonce)`.
#[inline]
pub fn work_hash<H: WorkHasher + ?Sized>(
    hasher: &H,
    load_hash: &[u8; HASH_LEN],
    nonce: &[u8; HASH_LEN],
) -> [u8; HASH_LEN] {
    hasher.digest(&[load_hash.as_slice(), nonce.as_slice()])
}

/// Recompute the work hash and check it against both the claimed value and
/// the difficulty.
pub fn verify<H: WorkHasher + ?Sized>(
    hasher: &H,
    load_hash: &[u8; HASH_LEN],
    nonce: &[u8; HASH_LEN],
    claimed: &[u8; HASH_LEN],
    difficulty: Difficulty,
) -> bool {
    let recomputed = work_hash(hasher, load_hash, nonce);
    recomputed == *claimed && meets_difficulty(&recomputed, difficulty)
}
