//! Errors raised by chain clients.

use bitcoin::Txid;
use thiserror::Error;

/// Errors that can occur while talking to the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The transaction is unknown to the chain backend.
    #[error("transaction {0} not found")]
    NotFound(Txid),

    /// The request did not complete.
    #[error("transport: {0}")]
    Transport(String),

    /// The backend refused to relay a transaction.
    #[error("broadcast of {txid} rejected: {reason}")]
    Rejected {
        /// The transaction that was rejected.
        txid: Txid,

        /// The backend's reason.
        reason: String,
    },
}

impl ChainError {
    /// Whether the error means the transaction does not exist, as opposed to a failed request.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, ChainError::NotFound(_))
    }
}

/// Wrapper type for results that can fail with a [`ChainError`].
pub type ChainResult<T> = Result<T, ChainError>;
