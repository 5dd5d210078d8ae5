use serde::{Deserialize, Serialize};

use crate::hasher::{HASH_LEN, WorkHasher};

pub type Nonce = [u8; HASH_LEN];
pub type Digest = [u8; HASH_LEN];

/// Extra fields bound into the load hash ahead of the search.
///
/// Hashed in a fixed order: payload, then tag, then the timestamp as 8
/// big-endian bytes. A missing field contributes zero bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AuxBindings {
    #[default]
    None,
    Tagged { tag: String },
    TaggedTimed { tag: String, time: u64 },
}

impl AuxBindings {
    pub fn tagged(tag: impl Into<String>) -> Self {
        AuxBindings::Tagged { tag: tag.into() }
    }

    /// A timestamp with no tag, the shape the current gateway expects.
    pub fn timed(time: u64) -> Self {
        AuxBindings::TaggedTimed { tag: String::new(), time }
    }

    /// Binds the current wall clock in milliseconds. Call this once per
    /// attempt and keep the value: the gateway re-derives the load hash from
    /// the transmitted `time`.
    pub fn timed_now(tag: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        AuxBindings::TaggedTimed { tag: tag.into(), time: now }
    }

    /// Rebuild bindings from the optional wire fields of a record.
    pub fn from_parts(tag: Option<String>, time: Option<u64>) -> Self {
        match (tag, time) {
            (tag, Some(time)) => AuxBindings::TaggedTimed { tag: tag.unwrap_or_default(), time },
            (Some(tag), None) => AuxBindings::Tagged { tag },
            (None, None) => AuxBindings::None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            AuxBindings::None => None,
            AuxBindings::Tagged { tag } | AuxBindings::TaggedTimed { tag, .. } => Some(tag),
        }
    }

    pub fn time(&self) -> Option<u64> {
        match self {
            AuxBindings::TaggedTimed { time, .. } => Some(*time),
            _ => None,
        }
    }

    /// `H(payload || tag || time_be)`.
    pub fn load_hash<H: WorkHasher + ?Sized>(&self, hasher: &H, payload: &[u8]) -> Digest {
        let tag = self.tag().unwrap_or_default().as_bytes();
        match self.time() {
            Some(time) => hasher.digest(&[payload, tag, time.to_be_bytes().as_slice()]),
            None => hasher.digest(&[payload, tag]),
        }
    }
}

/// Output of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub load_hash: Digest,
    pub nonce: Nonce,
    pub work_hash: Digest,
    /// Trials spent by all workers up to the win, as far as they were counted.
    pub trials: u64,
}

/// The body POSTed to the gateway. Binary fields are lowercase hex.
///
/// Deserialization accepts the key names of every wire schema so records
/// captured from older clients still verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub val: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    #[serde(rename = "nonce", alias = "salt", alias = "noncehex")]
    pub nonce_hex: String,
    #[serde(rename = "work", alias = "workhex", alias = "workHash", alias = "work_hash")]
    pub work_hex: String,
}

/// JSON key naming used when transmitting a [`SubmissionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireSchema {
    /// `val, tag, time, nonce, work`
    #[default]
    Canonical,
    /// `val, tag, time, salt, work`
    Salted,
    /// `val, tag, time, noncehex, workhex`
    HexSuffixed,
}

impl WireSchema {
    pub fn nonce_key(self) -> &'static str {
        match self {
            WireSchema::Canonical => "nonce",
            WireSchema::Salted => "salt",
            WireSchema::HexSuffixed => "noncehex",
        }
    }

    pub fn work_key(self) -> &'static str {
        match self {
            WireSchema::Canonical | WireSchema::Salted => "work",
            WireSchema::HexSuffixed => "workhex",
        }
    }
}

impl std::str::FromStr for WireSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "canonical" => Ok(WireSchema::Canonical),
            "salted" | "salt" => Ok(WireSchema::Salted),
            "hex-suffixed" | "hexsuffixed" | "legacy" => Ok(WireSchema::HexSuffixed),
            other => Err(format!("unknown wire schema {other:?}")),
        }
    }
}

/// One row of a gateway listing.
///
/// `added` is whatever JSON number the gateway sends; only its ordering is
/// relied on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub val: String,
    #[serde(alias = "time")]
    pub added: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}
