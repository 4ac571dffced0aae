//! Key derivation from a 32-byte HSM secret.
//!
//! Nodes that keep their keys in an `hsm_secret` file do not use BIP32 for channel keys:
//!
//! ```text
//! node key      = HKDF(ikm = secret, salt = 0u32 (LE), info = "nodeid")
//! channel base  = HKDF(ikm = secret, info = "peer seed")
//! channel seed  = HKDF(ikm = channel base, salt = peer_id || channel_index (u64 LE),
//!                      info = "per-peer seed")
//! channel keys  = HKDF(ikm = channel seed, info = "c-lightning")[role * 32..role * 32 + 32]
//! ```

use hkdf::Hkdf;
use lnrescue_primitives::keys::KeyFamily;
use secp256k1::{PublicKey, SecretKey};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::{DerivationError, DerivationResult};

const NODE_ID_INFO: &[u8] = b"nodeid";
const PEER_SEED_INFO: &[u8] = b"peer seed";
const PER_PEER_SEED_INFO: &[u8] = b"per-peer seed";
const CHANNEL_KEYS_INFO: &[u8] = b"c-lightning";

/// The per-channel key roles and their position in the expanded channel key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsmRole {
    /// The funding (multisig) key.
    Funding = 0,
    /// The revocation base point secret.
    Revocation = 1,
    /// The HTLC base point secret.
    Htlc = 2,
    /// The payment base point secret.
    Payment = 3,
    /// The delayed payment base point secret.
    Delay = 4,
    /// The seed of the per-commitment secrets.
    ShaSeed = 5,
}

const NUM_ROLES: usize = 6;

impl TryFrom<KeyFamily> for HsmRole {
    type Error = DerivationError;

    fn try_from(family: KeyFamily) -> Result<Self, Self::Error> {
        match family {
            KeyFamily::MultiSig => Ok(HsmRole::Funding),
            KeyFamily::RevocationBase => Ok(HsmRole::Revocation),
            KeyFamily::HtlcBase => Ok(HsmRole::Htlc),
            KeyFamily::PaymentBase => Ok(HsmRole::Payment),
            KeyFamily::DelayBase => Ok(HsmRole::Delay),
            KeyFamily::RevocationRoot => Ok(HsmRole::ShaSeed),
            other => Err(DerivationError::UnsupportedFamily(other)),
        }
    }
}

fn hkdf_sha256<const N: usize>(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> DerivationResult<[u8; N]> {
    let mut okm = [0u8; N];
    Hkdf::<Sha256>::new(salt, ikm)
        .expand(info, &mut okm)
        .map_err(|e| DerivationError::Hkdf(e.to_string()))?;

    Ok(okm)
}

/// A 32-byte HSM secret.
#[derive(Clone)]
pub struct HsmSecret([u8; 32]);

impl Drop for HsmSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for HsmSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HsmSecret(..)")
    }
}

impl HsmSecret {
    /// Wraps the raw secret, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> DerivationResult<Self> {
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| DerivationError::InvalidSecretLength(bytes.len()))?;

        Ok(Self(secret))
    }

    /// Derives the node identity key.
    ///
    /// The salt is a little-endian counter that is bumped until the output is a valid scalar.
    pub fn node_key(&self) -> DerivationResult<SecretKey> {
        let mut salt = 0u32;
        loop {
            let mut okm: [u8; 32] = hkdf_sha256(Some(&salt.to_le_bytes()[..]), &self.0, NODE_ID_INFO)?;
            let key = SecretKey::from_slice(&okm);
            okm.zeroize();

            if let Ok(key) = key {
                return Ok(key);
            }

            salt = salt
                .checked_add(1)
                .ok_or_else(|| DerivationError::Hkdf("node key salt exhausted".to_string()))?;
        }
    }

    fn channel_seed(&self, peer: &PublicKey, channel_index: u64) -> DerivationResult<[u8; 32]> {
        let mut channel_base: [u8; 32] = hkdf_sha256(None, &self.0, PEER_SEED_INFO)?;

        let mut salt = [0u8; 33 + 8];
        salt[..33].copy_from_slice(&peer.serialize());
        salt[33..].copy_from_slice(&channel_index.to_le_bytes());

        let seed = hkdf_sha256(Some(&salt[..]), &channel_base, PER_PEER_SEED_INFO);
        channel_base.zeroize();

        seed
    }

    /// Returns the raw 32-byte channel secret of `role` for the channel with `peer` at
    /// `channel_index`.
    pub fn channel_secret(
        &self,
        peer: &PublicKey,
        channel_index: u64,
        role: HsmRole,
    ) -> DerivationResult<[u8; 32]> {
        let mut seed = self.channel_seed(peer, channel_index)?;
        let keys = hkdf_sha256::<{ NUM_ROLES * 32 }>(None, &seed, CHANNEL_KEYS_INFO);
        seed.zeroize();
        let mut keys = keys?;

        let offset = role as usize * 32;
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&keys[offset..offset + 32]);
        keys.zeroize();

        Ok(secret)
    }

    /// Returns the channel key of `role` as a [`SecretKey`].
    pub fn channel_key(
        &self,
        peer: &PublicKey,
        channel_index: u64,
        role: HsmRole,
    ) -> DerivationResult<SecretKey> {
        let mut secret = self.channel_secret(peer, channel_index, role)?;
        let key = SecretKey::from_slice(&secret);
        secret.zeroize();

        Ok(key?)
    }
}
