use sha2::{Digest, Sha256};

pub const HASH_LEN: usize = 32;

/// A fixed 32-byte digest over a sequence of byte slices.
///
/// The parts are hashed as if concatenated, so `digest(&[a, b])` equals
/// `digest(&[a ++ b])`.
pub trait WorkHasher: Send + Sync {
    fn digest(&self, parts: &[&[u8]]) -> [u8; HASH_LEN];
}

/// SHA-256, the hash the gateway verifies against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl WorkHasher for Sha256Hasher {
    fn digest(&self, parts: &[&[u8]]) -> [u8; HASH_LEN] {
        let mut h = Sha256::new();
        for part in parts {
            h.update(part);
        }
        h.finalize().into()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl WorkHasher for Blake3Hasher {
    fn digest(&self, parts: &[&[u8]]) -> [u8; HASH_LEN] {
        let mut h = blake3::Hasher::new();
        for part in parts {
            h.update(part);
        }
        h.finalize().into()
    }
}

/// Runtime choice of hash, for callers that pick it from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashKind {
    #[default]
    Sha256,
    Blake3,
}

impl WorkHasher for HashKind {
    fn digest(&self, parts: &[&[u8]]) -> [u8; HASH_LEN] {
        match self {
            HashKind::Sha256 => Sha256Hasher.digest(parts),
            HashKind::Blake3 => Blake3Hasher.digest(parts),
        }
    }
}

impl std::str::FromStr for HashKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashKind::Sha256),
            "blake3" => Ok(HashKind::Blake3),
            other => Err(format!("unknown hash {other:?}, expected sha256 or blake3")),
        }
    }
}
