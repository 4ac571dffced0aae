//! BOLT-3 per-commitment secret generation.
//!
//! Secrets are indexed from `2^48 - 1` downwards, so commitment height `n` uses index
//! `2^48 - 1 - n`.

use bitcoin::hashes::{sha256, Hash};
use secp256k1::{ecdh::SharedSecret, PublicKey, SecretKey, SECP256K1};

use crate::errors::{ScriptError, ScriptResult};

/// The first (highest) shachain index.
pub const START_INDEX: u64 = (1 << 48) - 1;

/// Derives per-commitment secrets from a 32-byte root.
#[derive(Clone)]
pub struct RevocationProducer {
    root: [u8; 32],
}

impl std::fmt::Debug for RevocationProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationProducer").finish_non_exhaustive()
    }
}

impl RevocationProducer {
    /// Creates a producer from its root.
    pub const fn new(root: [u8; 32]) -> Self {
        Self { root }
    }

    /// Creates a producer seeded with [`ecdh_root`].
    pub fn from_ecdh(root_key: &SecretKey, multisig_key: &PublicKey) -> Self {
        Self::new(ecdh_root(root_key, multisig_key))
    }

    /// Returns the raw secret at the given shachain index.
    pub fn secret_at_index(&self, index: u64) -> ScriptResult<[u8; 32]> {
        if index > START_INDEX {
            return Err(ScriptError::ShachainIndexOutOfRange(index));
        }

        Ok(generate_from_seed(self.root, index))
    }

    /// Returns the per-commitment secret of the commitment at `height`.
    pub fn per_commitment_secret(&self, height: u64) -> ScriptResult<SecretKey> {
        let index = START_INDEX
            .checked_sub(height)
            .ok_or(ScriptError::ShachainIndexOutOfRange(height))?;
        let bytes = self.secret_at_index(index)?;

        Ok(SecretKey::from_slice(&bytes)?)
    }

    /// Returns the per-commitment point of the commitment at `height`.
    pub fn per_commitment_point(&self, height: u64) -> ScriptResult<PublicKey> {
        Ok(self.per_commitment_secret(height)?.public_key(SECP256K1))
    }
}

/// Returns `sha256(ECDH(root_key, multisig_key))`, the shachain root of channels whose backup
/// carries the local multisig key.
///
/// Older channels use the raw `root_key` bytes instead.
pub fn ecdh_root(root_key: &SecretKey, multisig_key: &PublicKey) -> [u8; 32] {
    let shared = SharedSecret::new(multisig_key, root_key);

    sha256::Hash::hash(&shared.secret_bytes()).to_byte_array()
}

/// Walks the 48 index bits from the top, flipping and hashing for every set bit.
pub fn generate_from_seed(seed: [u8; 32], index: u64) -> [u8; 32] {
    let mut value = seed;

    for bit in (0..48).rev() {
        if index & (1 << bit) != 0 {
            value[bit / 8] ^= 1 << (bit % 8);
            value = sha256::Hash::hash(&value).to_byte_array();
        }
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_from_seed_vectors() {
        assert_eq!(
            hex::encode(generate_from_seed([0u8; 32], START_INDEX)),
            "02a40c85b6f28da08dfdbe0926c53fab2de6d28c10301f8f7c4073d5e42e3148"
        );
        assert_eq!(
            hex::encode(generate_from_seed([0xff; 32], START_INDEX)),
            "7cc854b54e3e0dcdb010d7a3fee464a9687be6e8db3be6854c475621e007a5dc"
        );
        assert_eq!(
            hex::encode(generate_from_seed([0xff; 32], 0xaaaaaaaaaaa)),
            "56f4008fb007ca9acf0e15b054d5c9fd12ee06cea347914ddbaed70d1c13a528"
        );
    }

    #[test]
    fn test_height_zero_uses_start_index() {
        let producer = RevocationProducer::new([0u8; 32]);
        let secret = producer.per_commitment_secret(0).expect("valid secret");

        assert_eq!(
            hex::encode(secret.secret_bytes()),
            "02a40c85b6f28da08dfdbe0926c53fab2de6d28c10301f8f7c4073d5e42e3148"
        );
        assert_eq!(
            producer.per_commitment_point(0).expect("valid point"),
            secret.public_key(SECP256K1)
        );
    }

    #[test]
    fn test_heights_beyond_48_bits_rejected() {
        let producer = RevocationProducer::new([0x01; 32]);

        assert!(producer.per_commitment_secret(START_INDEX).is_ok());
        assert!(matches!(
            producer.per_commitment_secret(START_INDEX + 1),
            Err(ScriptError::ShachainIndexOutOfRange(h)) if h == START_INDEX + 1
        ));
        assert!(matches!(
            producer.secret_at_index(1 << 48),
            Err(ScriptError::ShachainIndexOutOfRange(_))
        ));
    }

    #[test]
    fn test_ecdh_root_is_symmetric() {
        let root_key = SecretKey::from_slice(&[0x11; 32]).expect("valid key");
        let multisig_key = SecretKey::from_slice(&[0x22; 32]).expect("valid key");

        let from_root = RevocationProducer::from_ecdh(&root_key, &multisig_key.public_key(SECP256K1));
        let from_multisig =
            RevocationProducer::from_ecdh(&multisig_key, &root_key.public_key(SECP256K1));
        assert_eq!(from_root.root, from_multisig.root);

        let shared = SharedSecret::new(&multisig_key.public_key(SECP256K1), &root_key);
        assert_eq!(
            from_root.root,
            sha256::Hash::hash(&shared.secret_bytes()).to_byte_array()
        );
        assert_ne!(from_root.root, root_key.secret_bytes());
    }
}
