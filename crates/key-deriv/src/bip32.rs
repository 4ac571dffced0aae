//! BIP32 child derivation with selectable key padding.
//!
//! Some wallets derive hardened children from a private key that was stored without its leading
//! zero bytes, copying it *left-aligned* into the 33-byte key field of the HMAC input. Keys whose
//! big-endian encoding starts with a zero byte therefore derive different children than plain
//! BIP32 would. [`Bip32Mode::LndCompat`] reproduces this exactly, including the points where the
//! wallet happens to re-serialize intermediate keys to strings (which pads them again).

use std::{fmt, str::FromStr};

use bitcoin::{
    bip32::{ChainCode, ChildNumber, Fingerprint, Xpriv},
    hashes::{hash160, sha512, Hash, HashEngine, Hmac, HmacEngine},
    NetworkKind,
};
use secp256k1::{PublicKey, Scalar, SecretKey, SECP256K1};
use tracing::trace;
use zeroize::Zeroize;

use crate::{
    errors::{DerivationError, DerivationResult},
    paths::{DerivationPath, HARDENED_OFFSET},
};

const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;

/// How child keys are derived along a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bip32Mode {
    /// Plain BIP32.
    Standard,

    /// Legacy left-aligned key padding plus string round trips at depths 2 and 3, matching the
    /// wallet underlying `lnd`.
    #[default]
    LndCompat,
}

/// Where a short private key is placed inside the 33-byte key field of a hardened child's HMAC
/// input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPadding {
    /// Right-aligned, i.e. zero-padded to 32 bytes as BIP32 specifies.
    Standard,

    /// Left-aligned, followed by zero bytes.
    Legacy,
}

/// A private HD key node.
///
/// The private key is stored as big-endian bytes without leading zeros after a derivation step
/// and as exactly 32 bytes after parsing or creating a master key.
#[derive(Clone)]
pub struct ExtendedKey {
    network: NetworkKind,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: ChildNumber,
    chain_code: [u8; 32],
    key: Vec<u8>,
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("network", &self.network)
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .finish_non_exhaustive()
    }
}

impl ExtendedKey {
    /// Creates a master key from a seed of 16 to 64 bytes.
    pub fn new_master(network: impl Into<NetworkKind>, seed: &[u8]) -> DerivationResult<Self> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&seed.len()) {
            return Err(DerivationError::InvalidSeedLength(seed.len()));
        }

        let mut engine = HmacEngine::<sha512::Hash>::new(b"Bitcoin seed");
        engine.input(seed);
        let mut hmac = Hmac::<sha512::Hash>::from_engine(engine).to_byte_array();

        let result = Self::from_hmac(network.into(), 0, [0u8; 4], ChildNumber::from(0), &hmac, |il| {
            SecretKey::from_slice(il).map(|sk| sk.secret_bytes().to_vec())
        });
        hmac.zeroize();

        result
    }

    fn from_hmac(
        network: NetworkKind,
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_number: ChildNumber,
        hmac: &[u8; 64],
        make_key: impl FnOnce(&[u8]) -> Result<Vec<u8>, secp256k1::Error>,
    ) -> DerivationResult<Self> {
        let (il, ir) = hmac.split_at(32);
        let key = make_key(il)?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(ir);

        Ok(Self {
            network,
            depth,
            parent_fingerprint,
            child_number,
            chain_code,
            key,
        })
    }

    /// Creates an extended key from a parsed [`Xpriv`]. The key is always 32 bytes long.
    pub fn from_xpriv(xpriv: &Xpriv) -> Self {
        Self {
            network: xpriv.network,
            depth: xpriv.depth,
            parent_fingerprint: *xpriv.parent_fingerprint.as_bytes(),
            child_number: xpriv.child_number,
            chain_code: *xpriv.chain_code.as_bytes(),
            key: xpriv.private_key.secret_bytes().to_vec(),
        }
    }

    /// Converts to an [`Xpriv`], padding the key to 32 bytes.
    pub fn to_xpriv(&self) -> DerivationResult<Xpriv> {
        Ok(Xpriv {
            network: self.network,
            depth: self.depth,
            parent_fingerprint: Fingerprint::from(self.parent_fingerprint),
            child_number: self.child_number,
            private_key: self.secret_key()?,
            chain_code: ChainCode::from(self.chain_code),
        })
    }

    /// The depth of this node, `0` for a master key.
    pub const fn depth(&self) -> u8 {
        self.depth
    }

    /// The network kind this key serializes for.
    pub const fn network(&self) -> NetworkKind {
        self.network
    }

    /// The stored private key bytes, which may be shorter than 32 bytes.
    pub fn key_bytes(&self) -> &[u8] {
        &self.key
    }

    fn padded_key(&self) -> [u8; 32] {
        let mut padded = [0u8; 32];
        let len = self.key.len().min(32);
        padded[32 - len..].copy_from_slice(&self.key[self.key.len() - len..]);

        padded
    }

    /// The private key as a [`SecretKey`].
    pub fn secret_key(&self) -> DerivationResult<SecretKey> {
        let mut padded = self.padded_key();
        let secret_key = SecretKey::from_slice(&padded);
        padded.zeroize();

        Ok(secret_key?)
    }

    /// The compressed public key of this node.
    pub fn public_key(&self) -> DerivationResult<PublicKey> {
        Ok(self.secret_key()?.public_key(SECP256K1))
    }

    /// The first four bytes of `HASH160(public_key)`.
    pub fn fingerprint(&self) -> DerivationResult<[u8; 4]> {
        let hash = hash160::Hash::hash(&self.public_key()?.serialize());
        let mut fingerprint = [0u8; 4];
        fingerprint.copy_from_slice(&hash.as_byte_array()[..4]);

        Ok(fingerprint)
    }

    /// Derives the child at `index` (hardened when `index >= 2^31`).
    pub fn derive_child(&self, index: u32, padding: KeyPadding) -> DerivationResult<Self> {
        let depth = self.depth.checked_add(1).ok_or(DerivationError::DepthOverflow)?;
        let parent = self.secret_key()?;

        let mut data = [0u8; 37];
        if index >= HARDENED_OFFSET {
            let key = &self.key[..self.key.len().min(32)];
            match padding {
                KeyPadding::Standard => data[1..33].copy_from_slice(&self.padded_key()),
                KeyPadding::Legacy => data[1..1 + key.len()].copy_from_slice(key),
            }
        } else {
            data[..33].copy_from_slice(&parent.public_key(SECP256K1).serialize());
        }
        data[33..].copy_from_slice(&index.to_be_bytes());

        let mut engine = HmacEngine::<sha512::Hash>::new(&self.chain_code);
        engine.input(&data);
        data.zeroize();
        let mut hmac = Hmac::<sha512::Hash>::from_engine(engine).to_byte_array();

        let result = Self::from_hmac(
            self.network,
            depth,
            self.fingerprint()?,
            ChildNumber::from(index),
            &hmac,
            |il| {
                let mut tweak_bytes = [0u8; 32];
                tweak_bytes.copy_from_slice(il);
                let tweak = Scalar::from_be_bytes(tweak_bytes)
                    .map_err(|_| secp256k1::Error::InvalidTweak)?;

                let child = parent.add_tweak(&tweak)?;
                Ok(strip_leading_zeros(&child.secret_bytes()))
            },
        );
        hmac.zeroize();

        result
    }

    /// Serializes to an extended key string and parses it back, padding the key to 32 bytes.
    pub fn reserialize(&self) -> DerivationResult<Self> {
        let encoded = self.to_xpriv()?.to_string();

        Ok(Self::from_xpriv(&Xpriv::from_str(&encoded)?))
    }

    /// Derives the key at `path` relative to this node.
    pub fn derive_path(&self, path: &DerivationPath, mode: Bip32Mode) -> DerivationResult<Self> {
        let parts = path.to_u32_vec();
        let mut current = self.clone();

        for (idx, part) in parts.iter().enumerate() {
            let padding = match mode {
                Bip32Mode::Standard => KeyPadding::Standard,
                Bip32Mode::LndCompat => KeyPadding::Legacy,
            };
            let child = current.derive_child(*part, padding)?;

            current = match mode {
                Bip32Mode::Standard => child,
                Bip32Mode::LndCompat => {
                    let depth = child.depth;
                    let key_id = part.wrapping_sub(HARDENED_OFFSET);
                    let next_id = match parts.get(idx + 1) {
                        Some(next) if depth == 2 && parts.len() > 2 => {
                            next.wrapping_sub(HARDENED_OFFSET)
                        }
                        _ => 0,
                    };

                    if (depth == 2 && next_id != 0) || (depth == 3 && key_id != 0) {
                        trace!(depth, "re-serializing intermediate key");
                        child.reserialize()?
                    } else {
                        child
                    }
                }
            };
        }

        Ok(current)
    }
}

fn strip_leading_zeros(bytes: &[u8; 32]) -> Vec<u8> {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());

    bytes[first..].to_vec()
}

impl FromStr for ExtendedKey {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_xpriv(&Xpriv::from_str(s.trim())?))
    }
}

impl Drop for ExtendedKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl Zeroize for ExtendedKey {
    fn zeroize(&mut self) {
        self.key.zeroize();
        self.chain_code.zeroize();
        self.parent_fingerprint.zeroize();
        self.depth.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{hashes::sha256, Network};

    use super::*;

    fn lnd_key_path(family: u32, index: u32) -> DerivationPath {
        format!("m/1017'/1'/{family}'/0/{index}")
            .parse()
            .expect("valid path")
    }

    #[test]
    fn test_master_key_rejects_bad_seed_length() {
        assert!(matches!(
            ExtendedKey::new_master(Network::Regtest, &[0u8; 15]),
            Err(DerivationError::InvalidSeedLength(15))
        ));
        assert!(matches!(
            ExtendedKey::new_master(Network::Regtest, &[0u8; 65]),
            Err(DerivationError::InvalidSeedLength(65))
        ));
    }

    #[test]
    fn test_standard_mode_matches_rust_bitcoin() {
        let seed = [7u8; 32];
        let root = ExtendedKey::new_master(Network::Regtest, &seed).expect("valid seed");
        let xpriv = Xpriv::new_master(Network::Regtest, &seed).expect("valid seed");

        let path = lnd_key_path(3, 42);
        let ours = root.derive_path(&path, Bip32Mode::Standard).expect("must derive");
        let theirs = xpriv
            .derive_priv(SECP256K1, &path.as_ref().to_vec())
            .expect("must derive");

        assert_eq!(ours.secret_key().expect("valid"), theirs.private_key);
        assert_eq!(ours.to_xpriv().expect("valid").to_string(), theirs.to_string());
    }

    #[test]
    fn test_standard_mode_composes() {
        let root = ExtendedKey::new_master(Network::Bitcoin, &[9u8; 32]).expect("valid seed");

        let first: DerivationPath = "m/1017'/0'".parse().expect("valid");
        let second: DerivationPath = "m/2'/0/5".parse().expect("valid");
        let full: DerivationPath = "m/1017'/0'/2'/0/5".parse().expect("valid");

        let stepwise = root
            .derive_path(&first, Bip32Mode::Standard)
            .and_then(|key| key.derive_path(&second, Bip32Mode::Standard))
            .expect("must derive");
        let direct = root.derive_path(&full, Bip32Mode::Standard).expect("must derive");

        assert_eq!(
            stepwise.secret_key().expect("valid"),
            direct.secret_key().expect("valid")
        );
    }

    #[test]
    fn test_xpriv_round_trip_pads_key() {
        let root = ExtendedKey::new_master(Network::Regtest, &[3u8; 32]).expect("valid seed");
        let parsed: ExtendedKey = root
            .to_xpriv()
            .expect("valid")
            .to_string()
            .parse()
            .expect("must parse");

        assert_eq!(parsed.key_bytes().len(), 32);
        assert_eq!(parsed.key_bytes(), root.key_bytes());
    }

    /// Finds a seed whose `m/1017'/1'` key has a leading zero byte while `m/1017'` does not.
    fn seed_with_short_depth_two_key() -> (Vec<u8>, ExtendedKey) {
        let purpose = HARDENED_OFFSET + 1017;
        let coin = HARDENED_OFFSET + 1;

        for i in 0u32..50_000 {
            let seed = sha256::Hash::hash(&i.to_be_bytes()).to_byte_array().to_vec();
            let root = ExtendedKey::new_master(Network::Regtest, &seed).expect("valid seed");
            let depth_one = root.derive_child(purpose, KeyPadding::Legacy).expect("derive");
            if depth_one.key_bytes().len() != 32 {
                continue;
            }

            let depth_two = depth_one.derive_child(coin, KeyPadding::Legacy).expect("derive");
            if depth_two.key_bytes().len() < 32 {
                return (seed, depth_two);
            }
        }

        panic!("no seed with a short depth-two key found");
    }

    #[test]
    fn test_legacy_padding_changes_hardened_children() {
        let (_, short_key) = seed_with_short_depth_two_key();
        let index = HARDENED_OFFSET;

        let legacy = short_key.derive_child(index, KeyPadding::Legacy).expect("derive");
        let standard = short_key.derive_child(index, KeyPadding::Standard).expect("derive");
        assert_ne!(
            legacy.secret_key().expect("valid"),
            standard.secret_key().expect("valid")
        );

        let normal_legacy = short_key.derive_child(5, KeyPadding::Legacy).expect("derive");
        let normal_standard = short_key.derive_child(5, KeyPadding::Standard).expect("derive");
        assert_eq!(
            normal_legacy.secret_key().expect("valid"),
            normal_standard.secret_key().expect("valid")
        );
    }

    #[test]
    fn test_lnd_compat_reserializes_for_non_zero_families() {
        let (seed, _) = seed_with_short_depth_two_key();
        let root = ExtendedKey::new_master(Network::Regtest, &seed).expect("valid seed");

        for family in 1..=9 {
            let path = lnd_key_path(family, 0);
            let compat = root.derive_path(&path, Bip32Mode::LndCompat).expect("derive");
            let standard = root.derive_path(&path, Bip32Mode::Standard).expect("derive");

            assert_eq!(
                compat.secret_key().expect("valid"),
                standard.secret_key().expect("valid"),
                "family {family}"
            );
        }

        let path = lnd_key_path(0, 0);
        let compat = root.derive_path(&path, Bip32Mode::LndCompat).expect("derive");
        let standard = root.derive_path(&path, Bip32Mode::Standard).expect("derive");
        assert_ne!(
            compat.secret_key().expect("valid"),
            standard.secret_key().expect("valid")
        );
    }
}
