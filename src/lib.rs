//! Proof-of-work client for garry content gateways.
//!
//! A post is mined before it is sent: the payload and its optional tag and
//! timestamp are hashed into a load hash, then random nonces are tried until
//! `H(load_hash || nonce)` starts with the required number of zero bytes.
//! That work hash doubles as the content's address on the gateway.

pub mod codec;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod error_handling;
pub mod gateway;
pub mod hasher;
pub mod logging;
pub mod metrics;
pub mod miner;
pub mod poster;
pub mod prng;
pub mod prometheus_metrics;
pub mod types;

pub use codec::{
    content_id, decode_list_response, encode_submission, sort_by_recency_descending,
    verify_submission,
};
pub use difficulty::{Difficulty, meets_difficulty, verify};
pub use error::{PowError, Result};
pub use gateway::{GatewayClient, GatewayConfig, RetrievedContent};
pub use hasher::{Blake3Hasher, HashKind, Sha256Hasher, WorkHasher};
pub use miner::{CancelToken, Miner, Progress};
pub use poster::{Posted, Poster};
pub use prng::Entropy;
pub use types::{AuxBindings, ContentEntry, Solution, SubmissionRecord, WireSchema};
