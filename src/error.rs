use thiserror::Error;

pub type Result<T, E = PowError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum PowError {
    #[error("invalid difficulty {0:?}: expected an integer in 0..=32")]
    InvalidDifficulty(String),

    #[error("mining cancelled")]
    Cancelled,

    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("invalid gateway url {0}")]
    InvalidUrl(String),
}

impl PowError {
    pub(crate) fn invalid_hex(field: &'static str, err: hex::FromHexError) -> Self {
        PowError::InvalidHex { field, reason: err.to_string() }
    }

    /// Only network-level failures are worth retrying; a rejection is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, PowError::Transport(_))
    }
}
