use thiserror::Error;

/// Errors surfaced by the ledger. Neither kind is recoverable by retrying;
/// an unsealed search is not an error, it is simply still running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Caller bug: empty miner set, unsupported hash algorithm, bad difficulty.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Corrupted internal state: empty chain, broken linkage, bad proof.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl LedgerError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
