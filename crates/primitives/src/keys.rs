//! Key locators and descriptors.
//!
//! A [`KeyLocator`] names a key by its role ([`KeyFamily`]) and its index within that role. A
//! [`KeyDescriptor`] pairs a locator with the public key it is expected to produce so that the
//! private half can be re-derived on demand.

use std::fmt;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// The role a key plays inside a node's key hierarchy.
///
/// The numeric values are part of the derivation path (`m/1017'/coin'/family'/0/index`) and must
/// never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum KeyFamily {
    /// Keys locking channel funding outputs.
    MultiSig,

    /// Base points for revocation keys.
    RevocationBase,

    /// Base points for HTLC keys.
    HtlcBase,

    /// Base points for the to-remote payment keys.
    PaymentBase,

    /// Base points for the CSV-delayed to-local keys.
    DelayBase,

    /// Roots of the per-channel revocation producers.
    RevocationRoot,

    /// The node identity key.
    NodeKey,

    /// The key encrypting static channel backups.
    StaticBackup,

    /// Watchtower session keys.
    TowerSession,

    /// The watchtower identity key.
    TowerId,
}

impl KeyFamily {
    /// All families in ascending numeric order.
    pub const ALL: [KeyFamily; 10] = [
        KeyFamily::MultiSig,
        KeyFamily::RevocationBase,
        KeyFamily::HtlcBase,
        KeyFamily::PaymentBase,
        KeyFamily::DelayBase,
        KeyFamily::RevocationRoot,
        KeyFamily::NodeKey,
        KeyFamily::StaticBackup,
        KeyFamily::TowerSession,
        KeyFamily::TowerId,
    ];

    /// The numeric value used in derivation paths.
    pub const fn as_u32(self) -> u32 {
        match self {
            KeyFamily::MultiSig => 0,
            KeyFamily::RevocationBase => 1,
            KeyFamily::HtlcBase => 2,
            KeyFamily::PaymentBase => 3,
            KeyFamily::DelayBase => 4,
            KeyFamily::RevocationRoot => 5,
            KeyFamily::NodeKey => 6,
            KeyFamily::StaticBackup => 7,
            KeyFamily::TowerSession => 8,
            KeyFamily::TowerId => 9,
        }
    }
}

impl From<KeyFamily> for u32 {
    fn from(family: KeyFamily) -> Self {
        family.as_u32()
    }
}

/// Error returned when a number does not name a known [`KeyFamily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown key family {0}")]
pub struct UnknownKeyFamily(pub u32);

impl TryFrom<u32> for KeyFamily {
    type Error = UnknownKeyFamily;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        KeyFamily::ALL
            .get(value as usize)
            .copied()
            .ok_or(UnknownKeyFamily(value))
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyFamily::MultiSig => "multisig",
            KeyFamily::RevocationBase => "revocation-base",
            KeyFamily::HtlcBase => "htlc-base",
            KeyFamily::PaymentBase => "payment-base",
            KeyFamily::DelayBase => "delay-base",
            KeyFamily::RevocationRoot => "revocation-root",
            KeyFamily::NodeKey => "node-key",
            KeyFamily::StaticBackup => "static-backup",
            KeyFamily::TowerSession => "tower-session",
            KeyFamily::TowerId => "tower-id",
        };

        write!(f, "{name}")
    }
}

/// Locates a key by its family and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyLocator {
    /// The role of the key.
    pub family: KeyFamily,

    /// The index of the key within its family.
    pub index: u32,
}

impl KeyLocator {
    /// Creates a new locator.
    pub const fn new(family: KeyFamily, index: u32) -> Self {
        Self { family, index }
    }
}

impl fmt::Display for KeyLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family, self.index)
    }
}

/// A located key plus, when known, its public value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    /// Where the key lives in the hierarchy.
    pub key_locator: KeyLocator,

    /// The public key. Backups sometimes omit it, in which case it has to be re-derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<PublicKey>,
}

impl KeyDescriptor {
    /// Creates a descriptor with a known public key.
    pub const fn new(key_locator: KeyLocator, pub_key: PublicKey) -> Self {
        Self {
            key_locator,
            pub_key: Some(pub_key),
        }
    }

    /// Creates a descriptor that only carries a locator.
    pub const fn from_locator(key_locator: KeyLocator) -> Self {
        Self {
            key_locator,
            pub_key: None,
        }
    }
}
