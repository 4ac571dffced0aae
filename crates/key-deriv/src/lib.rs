//! Key derivation for channel recovery.
//!
//! This crate re-derives the private keys of a Lightning node from either a BIP32 root key or a
//! hardware-security-module secret and exposes them through a [`KeyRing`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use bitcoin::Network;
//! use lnrescue_key_deriv::{Bip32Mode, ExtendedKey, KeyDeriver, KeyRing};
//! use lnrescue_primitives::keys::{KeyFamily, KeyLocator};
//!
//! let root = ExtendedKey::new_master(Network::Bitcoin, &seed)?;
//! let ring = KeyRing::new(KeyDeriver::bip32(root, Bip32Mode::LndCompat), Network::Bitcoin);
//!
//! let multisig_key = ring.derive_key_desc(KeyLocator::new(KeyFamily::MultiSig, 3))?;
//! let locator = ring.check_descriptor(&some_pubkey, KeyFamily::DelayBase)?;
//! ```
//!
//! # Key Hierarchy
//!
//! BIP32 roots derive every key at `m/1017'/<coin_type>'/<family>'/0/<index>`. HSM secrets
//! derive the node key directly and channel keys per peer and channel index, see [`hsm`].

pub mod address;
pub mod bip32;
pub mod descriptor;
pub mod deriver;
pub mod errors;
pub mod hsm;
pub mod keyring;
pub mod paths;

pub use bip32::{Bip32Mode, ExtendedKey};
pub use deriver::KeyDeriver;
pub use errors::{DerivationError, DerivationResult};
pub use hsm::HsmSecret;
pub use keyring::{KeyRing, DEFAULT_SCAN_LIMIT};
pub use paths::DerivationPath;
