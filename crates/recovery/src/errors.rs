//! Errors raised by the recovery engines.

use std::path::PathBuf;

use bitcoin::{Amount, Network, OutPoint};
use lnrescue_chain::ChainError;
use lnrescue_db::StoreError;
use lnrescue_key_deriv::DerivationError;
use lnrescue_primitives::{channel::ChannelType, errors::ScriptError};
use lnrescue_signer::SignerError;
use secp256k1::PublicKey;
use thiserror::Error;

/// Errors that can occur while recovering funds.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// A key could not be derived.
    #[error("derivation: {0}")]
    Derivation(#[from] DerivationError),

    /// A script or tweaked key could not be built.
    #[error("script: {0}")]
    Script(#[from] ScriptError),

    /// Signing or witness assembly failed.
    #[error("signer: {0}")]
    Signer(#[from] SignerError),

    /// The channel store could not be read.
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// The chain backend failed.
    #[error("chain: {0}")]
    Chain(#[from] ChainError),

    /// The channel has no local commitment transaction to sign.
    #[error("channel {0} has no local commitment transaction")]
    MissingCommitment(OutPoint),

    /// The channel type cannot be recovered by this engine.
    #[error("channel {chan_point}: unsupported channel type {chan_type}")]
    UnsupportedChannelType {
        /// The channel.
        chan_point: OutPoint,

        /// Its type.
        chan_type: ChannelType,
    },

    /// The backup lacks a field needed for signing.
    #[error("backup of {chan_point} is missing signing data: {field}")]
    BackupMissingData {
        /// The channel.
        chan_point: OutPoint,

        /// The missing field.
        field: &'static str,
    },

    /// The backup version is unknown.
    #[error("backup of {chan_point} has unknown version {version}")]
    UnknownBackupVersion {
        /// The channel.
        chan_point: OutPoint,

        /// The version.
        version: u8,
    },

    /// The record belongs to a different network than the key ring.
    #[error("channel {chan_point} is on {found}, expected {expected}")]
    NetworkMismatch {
        /// The channel.
        chan_point: OutPoint,

        /// The key ring's network.
        expected: Network,

        /// The record's network.
        found: Network,
    },

    /// A recorded output does not match the script rebuilt from its keys.
    #[error("output {vout} of the commitment of {chan_point} does not match its keys")]
    OutputMismatch {
        /// The channel.
        chan_point: OutPoint,

        /// The output index.
        vout: u32,
    },

    /// A file could not be read or written.
    #[error("io on {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,

        /// The cause.
        source: std::io::Error,
    },

    /// A file does not hold the expected JSON.
    #[error("parse {path}: {source}")]
    Json {
        /// The file.
        path: PathBuf,

        /// The cause.
        source: serde_json::Error,
    },

    /// This node is not one of the two nodes of a zombie match.
    #[error("node {0} is not part of the match")]
    NotInMatch(PublicKey),

    /// The match or prepared keys files are inconsistent with each other.
    #[error("inconsistent match: {0}")]
    InconsistentMatch(String),

    /// No pair of prepared keys reproduces the channel's funding address.
    #[error("no key pair matches funding address {address} of {chan_point}")]
    NoMatchingKeys {
        /// The channel.
        chan_point: OutPoint,

        /// The funding address from the match file.
        address: String,
    },

    /// The offer does not match what this party expects.
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    /// The PSBT could not be decoded, signed or extracted.
    #[error("psbt: {0}")]
    Psbt(String),

    /// An output would be below the dust limit of its script.
    #[error("output paying {amount} is below the dust limit {limit}")]
    Dust {
        /// The output amount.
        amount: Amount,

        /// The dust limit.
        limit: Amount,
    },

    /// The fee rate times the transaction size does not fit into an amount.
    #[error("fee rate {fee_rate} sat/vB over {vsize} vB overflows")]
    FeeOverflow {
        /// The requested fee rate.
        fee_rate: u64,

        /// The estimated virtual size.
        vsize: u64,
    },

    /// The funds do not cover the requested amounts and fee.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Nothing was eligible.
    #[error("nothing to do: {0}")]
    NothingToDo(String),
}

impl RecoveryError {
    /// Whether the error only concerns the current item of a batch, which is logged and skipped.
    ///
    /// Signing and serialization failures are not item errors and abort the run.
    pub const fn is_item_error(&self) -> bool {
        matches!(
            self,
            RecoveryError::Derivation(_)
                | RecoveryError::Script(_)
                | RecoveryError::Signer(
                    SignerError::Derivation(_)
                        | SignerError::Script(_)
                        | SignerError::UnsupportedChannelType(_)
                )
                | RecoveryError::Chain(_)
                | RecoveryError::MissingCommitment(_)
                | RecoveryError::UnsupportedChannelType { .. }
                | RecoveryError::BackupMissingData { .. }
                | RecoveryError::UnknownBackupVersion { .. }
                | RecoveryError::NetworkMismatch { .. }
                | RecoveryError::OutputMismatch { .. }
        )
    }
}

/// Wrapper type for results that can fail with a [`RecoveryError`].
pub type RecoveryResult<T> = Result<T, RecoveryError>;
