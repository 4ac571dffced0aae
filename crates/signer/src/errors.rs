//! Errors raised while signing.

use lnrescue_key_deriv::DerivationError;
use lnrescue_primitives::{channel::ChannelType, errors::ScriptError};
use thiserror::Error;

/// Errors that can occur while building sign descriptors, signing or assembling witnesses.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The signing key could not be derived.
    #[error("derivation: {0}")]
    Derivation(#[from] DerivationError),

    /// A script or tweaked key could not be built.
    #[error("script: {0}")]
    Script(#[from] ScriptError),

    /// A per-commitment tweak was combined with a taproot key spend.
    #[error("a key tweak cannot be used with a taproot key spend")]
    TweakWithKeySpend,

    /// The input index is not part of the transaction.
    #[error("input {0} out of range")]
    InputOutOfRange(usize),

    /// The previous output does not match the one in the descriptor.
    #[error("previous output of input {0} does not match the sign descriptor")]
    PrevOutMismatch(usize),

    /// Sighash computation failed.
    #[error("sighash: {0}")]
    Sighash(String),

    /// The channel type cannot be signed for.
    #[error("unsupported channel type {0}")]
    UnsupportedChannelType(ChannelType),

    /// A signature did not verify.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The produced signature has the wrong kind for the witness being built.
    #[error("expected {expected} signature")]
    WrongSignatureKind {
        /// The kind of signature the witness needs.
        expected: &'static str,
    },
}

/// Wrapper type for results that can fail with a [`SignerError`].
pub type SignerResult<T> = Result<T, SignerError>;
