//! Ledger gateway errors, split along the transient/permanent line.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("ledger returned HTTP {0}")]
    Http(u16),

    #[error("ledger rejected the submission: {0}")]
    Rejected(String),

    #[error("could not decode ledger response: {0}")]
    Decode(String),
}

impl LedgerError {
    /// Whether a retry with the same input could plausibly succeed.
    ///
    /// Timeouts, transport failures and server-side errors are
    /// transient. Rejections, client errors and malformed responses are
    /// permanent: retrying the identical payload would fail again.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Timeout | LedgerError::Transport(_) => true,
            LedgerError::Http(status) => *status >= 500,
            LedgerError::Rejected(_) | LedgerError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LedgerError::Timeout
        } else if e.is_decode() {
            LedgerError::Decode(e.to_string())
        } else {
            LedgerError::Transport(e.to_string())
        }
    }
}
