//! Errors raised while deriving keys.

use lnrescue_primitives::keys::KeyFamily;
use secp256k1::PublicKey;
use thiserror::Error;

/// Error type for key derivation operations.
#[derive(Debug, Error)]
pub enum DerivationError {
    /// A derivation path string could not be parsed.
    #[error("invalid derivation path '{path}': {reason}")]
    InvalidPath {
        /// The offending input.
        path: String,

        /// What is wrong with it.
        reason: &'static str,
    },

    /// BIP32 serialization or derivation failed.
    #[error("BIP32 error: {0}")]
    Bip32(#[from] bitcoin::bip32::Error),

    /// The seed used to create a master key has an invalid length.
    #[error("seed must be between 16 and 64 bytes, got {0}")]
    InvalidSeedLength(usize),

    /// The HSM secret has an invalid length.
    #[error("hsm secret must be 32 bytes, got {0}")]
    InvalidSecretLength(usize),

    /// A derived scalar is not a valid private key.
    #[error("invalid key material: {0}")]
    Secp(#[from] secp256k1::Error),

    /// The key is already at the maximum depth.
    #[error("maximum derivation depth reached")]
    DepthOverflow,

    /// No index in the scanned range produces the requested public key.
    #[error("cannot derive private key for {pubkey} in family {family} (scanned {scanned} indices)")]
    CannotDerive {
        /// The key searched for.
        pubkey: PublicKey,

        /// The family that was scanned.
        family: KeyFamily,

        /// How many indices were tried.
        scanned: u32,
    },

    /// The HSM scheme has no key for this family.
    #[error("family {0} cannot be derived from an hsm secret")]
    UnsupportedFamily(KeyFamily),

    /// An HSM channel key was requested without a peer.
    #[error("hsm channel keys need the peer's node key")]
    MissingPeer,

    /// HKDF expansion failed.
    #[error("hkdf expansion: {0}")]
    Hkdf(String),

    /// An address could not be parsed or is for the wrong network.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress {
        /// The offending input.
        address: String,

        /// Why it was rejected.
        reason: String,
    },

    /// A descriptor checksum is missing, malformed or wrong.
    #[error("invalid descriptor checksum: {0}")]
    InvalidChecksum(String),
}

/// Wrapper type for results that can fail with a [`DerivationError`].
pub type DerivationResult<T> = Result<T, DerivationError>;
