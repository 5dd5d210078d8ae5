//! HTTP client for a garry gateway.
//!
//! One request per call. Transport failures and rejections are returned as-is;
//! retrying is left to the caller.

use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec::{self, decode_hash};
use crate::difficulty::{self, Difficulty};
use crate::error::{PowError, Result};
use crate::hasher::WorkHasher;
use crate::types::{AuxBindings, ContentEntry, Digest, Nonce, SubmissionRecord, WireSchema};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    #[serde(skip)]
    pub schema: WireSchema,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 10_000,
            schema: WireSchema::Salted,
        }
    }
}

/// Content fetched from `/<workhex>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedContent {
    pub val: Vec<u8>,
    pub nonce: Option<Nonce>,
    pub time: Option<u64>,
}

impl RetrievedContent {
    /// Check that this content is what `work_hash` commits to.
    ///
    /// The gateway does not send the tag back, so only untagged content can
    /// be checked this way.
    pub fn verify<H: WorkHasher + ?Sized>(
        &self,
        hasher: &H,
        work_hash: &Digest,
        difficulty: Difficulty,
    ) -> bool {
        let Some(nonce) = self.nonce else {
            return false;
        };
        let aux = AuxBindings::from_parts(None, self.time);
        let load_hash = aux.load_hash(hasher, &self.val);
        difficulty::verify(hasher, &load_hash, &nonce, work_hash, difficulty)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    base: Url,
    http: Client,
    schema: WireSchema,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| PowError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(PowError::InvalidUrl(config.base_url.clone()));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("garry-pow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base, http, schema: config.schema })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `<base>/<segments...>`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| PowError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty();
            for seg in segments {
                path.push(seg);
            }
        }
        Ok(url)
    }

    /// Where accepted content can be fetched from.
    pub fn content_url(&self, work_hash: &Digest) -> Result<Url> {
        self.url(&[&codec::content_id(work_hash)])
    }

    /// POST a record. Only HTTP 200 counts as accepted.
    pub async fn submit(&self, record: &SubmissionRecord) -> Result<()> {
        let body = codec::to_wire(record, self.schema);
        let started = Instant::now();
        let resp = self.http.post(self.base.clone()).json(&body).send().await?;
        let status = resp.status();
        debug!(%status, latency_ms = started.elapsed().as_millis() as u64, "submission answered");

        if status != StatusCode::OK {
            let message = resp.text().await?;
            warn!(%status, %message, "submission rejected");
            return Err(PowError::Rejected { status: status.as_u16(), message });
        }
        info!(work = %record.work_hex, "submission accepted");
        Ok(())
    }

    /// GET `/list/<prefix>`, newest first.
    pub async fn list(&self, prefix: &str) -> Result<Vec<ContentEntry>> {
        let url = self.url(&["list", prefix])?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await?;
            return Err(PowError::Rejected { status: status.as_u16(), message });
        }
        let bytes = resp.bytes().await?;
        let entries = codec::decode_list_response(&bytes)?;
        debug!(prefix, count = entries.len(), "listing received");
        Ok(codec::sort_by_recency_descending(entries))
    }

    /// GET `/<workhex>`.
    pub async fn fetch(&self, work_hash: &Digest) -> Result<RetrievedContent> {
        let resp = self.http.get(self.content_url(work_hash)?).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await?;
            return Err(PowError::Rejected { status: status.as_u16(), message });
        }
        let (nonce, time) = parse_content_headers(resp.headers())?;
        let val = resp.bytes().await?.to_vec();
        Ok(RetrievedContent { val, nonce, time })
    }
}

// The gateway sends the nonce as `Salt` and the time as hex of its 8-byte
// big-endian encoding.
fn parse_content_headers(headers: &HeaderMap) -> Result<(Option<Nonce>, Option<u64>)> {
    let header = |name: &str| -> Result<Option<String>> {
        match headers.get(name) {
            None => Ok(None),
            Some(v) => v
                .to_str()
                .map(|s| Some(s.to_string()))
                .map_err(|e| PowError::MalformedResponse(format!("{name} header: {e}"))),
        }
    };

    let nonce = header("Salt")?.map(|s| decode_hash("Salt", &s)).transpose()?;
    let time = match header("Time")? {
        None => None,
        Some(s) => {
            let mut be = [0u8; 8];
            hex::decode_to_slice(&s, &mut be).map_err(|e| PowError::invalid_hex("Time", e))?;
            Some(u64::from_be_bytes(be))
        }
    };
    Ok((nonce, time))
}
