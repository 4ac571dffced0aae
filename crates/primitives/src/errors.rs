//! Errors raised while building channel scripts and keys.

use thiserror::Error;

use crate::channel::ChannelType;

/// Errors that can occur while constructing channel scripts, outputs and tweaked keys.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The channel type combines features this tool cannot reconstruct.
    #[error("unsupported channel type {0}")]
    UnsupportedChannelType(ChannelType),

    /// The CSV delay does not fit into a relative block-height lock.
    #[error("csv delay {0} out of range")]
    CsvDelayOutOfRange(u32),

    /// Channel state lacks a base point needed to rebuild the commitment scripts.
    #[error("missing {0} base point")]
    MissingBasePoint(&'static str),

    /// The script is not a canonical 2-of-2 multisig script.
    #[error("not a 2-of-2 multisig script")]
    NotMultiSig,

    /// A tweak or combination of keys produced an invalid point or scalar.
    #[error("key tweak: {0}")]
    Tweak(#[from] secp256k1::Error),

    /// MuSig2 key aggregation failed.
    #[error("key aggregation: {0}")]
    KeyAgg(String),

    /// The taproot tree could not be built.
    #[error("taproot tree: {0}")]
    Taproot(String),

    /// A commitment height or shachain index does not fit into 48 bits.
    #[error("shachain index {0} exceeds 2^48 - 1")]
    ShachainIndexOutOfRange(u64),
}

/// Wrapper type for results that can fail with a [`ScriptError`].
pub type ScriptResult<T> = Result<T, ScriptError>;
