//! A [`KeyDeriver`] bound to one network and, for HSM secrets, one peer.

use bitcoin::Network;
use lnrescue_primitives::keys::{KeyDescriptor, KeyFamily, KeyLocator};
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use tracing::{debug, warn};

use crate::{
    deriver::KeyDeriver,
    errors::{DerivationError, DerivationResult},
};

/// How many indices [`KeyRing::check_descriptor`] tries by default.
pub const DEFAULT_SCAN_LIMIT: u32 = 2_500;

/// Derives keys for one network.
#[derive(Debug, Clone)]
pub struct KeyRing {
    deriver: KeyDeriver,
    network: Network,
    peer: Option<PublicKey>,
    scan_limit: u32,
}

impl KeyRing {
    /// Creates a key ring with the default scan limit and no peer.
    pub const fn new(deriver: KeyDeriver, network: Network) -> Self {
        Self {
            deriver,
            network,
            peer: None,
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }

    /// Sets how many indices [`Self::check_descriptor`] tries.
    pub const fn with_scan_limit(mut self, scan_limit: u32) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    /// Returns a copy of this ring that derives channel keys relative to `peer`.
    pub fn with_peer(&self, peer: PublicKey) -> Self {
        Self {
            peer: Some(peer),
            ..self.clone()
        }
    }

    /// The network keys are derived for.
    pub const fn network(&self) -> Network {
        self.network
    }

    /// The configured scan limit.
    pub const fn scan_limit(&self) -> u32 {
        self.scan_limit
    }

    /// The underlying deriver.
    pub const fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// Derives the private key at `locator`.
    pub fn derive_priv_key(&self, locator: KeyLocator) -> DerivationResult<SecretKey> {
        self.deriver
            .derive(self.network, self.peer.as_ref(), locator)
    }

    /// Derives the descriptor, including the public key, of `locator`.
    pub fn derive_key_desc(&self, locator: KeyLocator) -> DerivationResult<KeyDescriptor> {
        let secret_key = self.derive_priv_key(locator)?;

        Ok(KeyDescriptor::new(locator, secret_key.public_key(SECP256K1)))
    }

    /// The node identity public key.
    pub fn node_pubkey(&self) -> DerivationResult<PublicKey> {
        Ok(self
            .derive_priv_key(KeyLocator::new(KeyFamily::NodeKey, 0))?
            .public_key(SECP256K1))
    }

    /// Scans indices `0..scan_limit` of `family` for the key whose public key is `pubkey`.
    pub fn check_descriptor(&self, pubkey: &PublicKey, family: KeyFamily) -> DerivationResult<KeyLocator> {
        let derive = self
            .deriver
            .family_deriver(self.network, self.peer.as_ref(), family)?;

        for index in 0..self.scan_limit {
            // Only an index that yields an invalid scalar is skipped; anything else fails the
            // whole scan.
            let candidate = match derive(index) {
                Ok(candidate) => candidate,
                Err(DerivationError::Secp(e)) => {
                    debug!(%family, %index, %e, "skipping index with invalid key");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if candidate.public_key(SECP256K1) == *pubkey {
                debug!(%family, %index, "found key");
                return Ok(KeyLocator::new(family, index));
            }
        }

        Err(DerivationError::CannotDerive {
            pubkey: *pubkey,
            family,
            scanned: self.scan_limit,
        })
    }

    /// Derives the private key of a descriptor.
    ///
    /// When the descriptor carries a public key that the locator does not reproduce, the family is
    /// scanned for the right index.
    pub fn priv_key_for_desc(&self, desc: &KeyDescriptor) -> DerivationResult<SecretKey> {
        let secret_key = self.derive_priv_key(desc.key_locator)?;

        let Some(expected) = desc.pub_key else {
            return Ok(secret_key);
        };

        if secret_key.public_key(SECP256K1) == expected {
            return Ok(secret_key);
        }

        warn!(locator = %desc.key_locator, "locator does not match public key, scanning family");
        let locator = self.check_descriptor(&expected, desc.key_locator.family)?;

        self.derive_priv_key(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bip32::Bip32Mode, hsm::HsmSecret, ExtendedKey};

    fn bip32_ring(mode: Bip32Mode) -> KeyRing {
        let root = ExtendedKey::new_master(Network::Regtest, &[1u8; 32]).expect("valid seed");
        KeyRing::new(KeyDeriver::bip32(root, mode), Network::Regtest).with_scan_limit(50)
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let locator = KeyLocator::new(KeyFamily::MultiSig, 7);

        let first = bip32_ring(Bip32Mode::LndCompat).derive_key_desc(locator).expect("derive");
        let second = bip32_ring(Bip32Mode::LndCompat).derive_key_desc(locator).expect("derive");

        assert_eq!(first, second);
        assert!(first.pub_key.is_some());
    }

    #[test]
    fn test_check_descriptor_finds_index() {
        for mode in [Bip32Mode::Standard, Bip32Mode::LndCompat] {
            let ring = bip32_ring(mode);
            let target = ring
                .derive_key_desc(KeyLocator::new(KeyFamily::DelayBase, 17))
                .expect("derive");

            let found = ring
                .check_descriptor(&target.pub_key.expect("has key"), KeyFamily::DelayBase)
                .expect("must find");
            assert_eq!(found, KeyLocator::new(KeyFamily::DelayBase, 17));
        }
    }

    #[test]
    fn test_check_descriptor_outside_range() {
        let ring = bip32_ring(Bip32Mode::LndCompat);
        let target = ring
            .derive_key_desc(KeyLocator::new(KeyFamily::MultiSig, 50))
            .expect("derive")
            .pub_key
            .expect("has key");

        assert!(matches!(
            ring.check_descriptor(&target, KeyFamily::MultiSig),
            Err(DerivationError::CannotDerive { scanned: 50, .. })
        ));
    }

    #[test]
    fn test_check_descriptor_reports_structural_errors() {
        let secret = HsmSecret::from_slice(&[5u8; 32]).expect("32 bytes");
        let ring = KeyRing::new(KeyDeriver::hsm(secret), Network::Bitcoin);
        let node_key = ring.node_pubkey().expect("node key");

        assert!(matches!(
            ring.check_descriptor(&node_key, KeyFamily::MultiSig),
            Err(DerivationError::MissingPeer)
        ));

        let peer_ring = ring.with_peer(node_key);
        assert!(matches!(
            peer_ring.check_descriptor(&node_key, KeyFamily::StaticBackup),
            Err(DerivationError::UnsupportedFamily(KeyFamily::StaticBackup))
        ));
    }

    #[test]
    fn test_priv_key_for_desc_repairs_wrong_index() {
        let ring = bip32_ring(Bip32Mode::LndCompat);
        let actual = ring
            .derive_key_desc(KeyLocator::new(KeyFamily::PaymentBase, 3))
            .expect("derive");
        let wrong = KeyDescriptor {
            key_locator: KeyLocator::new(KeyFamily::PaymentBase, 0),
            pub_key: actual.pub_key,
        };

        let secret_key = ring.priv_key_for_desc(&wrong).expect("must repair");
        assert_eq!(Some(secret_key.public_key(SECP256K1)), actual.pub_key);
    }

    #[test]
    fn test_hsm_ring_needs_peer() {
        let secret = HsmSecret::from_slice(&[5u8; 32]).expect("32 bytes");
        let ring = KeyRing::new(KeyDeriver::hsm(secret), Network::Bitcoin).with_scan_limit(10);

        assert!(ring.node_pubkey().is_ok());
        assert!(matches!(
            ring.derive_priv_key(KeyLocator::new(KeyFamily::MultiSig, 1)),
            Err(DerivationError::MissingPeer)
        ));

        let peer = ring.node_pubkey().expect("node key");
        let peer_ring = ring.with_peer(peer);
        let target = peer_ring
            .derive_key_desc(KeyLocator::new(KeyFamily::MultiSig, 4))
            .expect("derive");
        let found = peer_ring
            .check_descriptor(&target.pub_key.expect("has key"), KeyFamily::MultiSig)
            .expect("must find");
        assert_eq!(found.index, 4);
    }
}
