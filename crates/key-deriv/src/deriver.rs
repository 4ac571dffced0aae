//! The two interchangeable strategies that turn a [`KeyLocator`] into key material.

use bitcoin::Network;
use lnrescue_primitives::keys::{KeyFamily, KeyLocator};
use secp256k1::{PublicKey, SecretKey};

use crate::{
    bip32::{Bip32Mode, ExtendedKey, KeyPadding},
    errors::{DerivationError, DerivationResult},
    hsm::{HsmRole, HsmSecret},
    paths::DerivationPath,
};

/// Derives private keys from a root secret.
#[derive(Debug, Clone)]
pub enum KeyDeriver {
    /// BIP32 derivation along `m/1017'/<coin_type>'/<family>'/0/<index>`.
    Bip32 {
        /// The master key.
        root: ExtendedKey,

        /// How children are derived.
        mode: Bip32Mode,
    },

    /// HKDF derivation from an HSM secret.
    Hsm(HsmSecret),
}

impl KeyDeriver {
    /// Creates a BIP32 deriver.
    pub const fn bip32(root: ExtendedKey, mode: Bip32Mode) -> Self {
        Self::Bip32 { root, mode }
    }

    /// Creates an HSM deriver.
    pub const fn hsm(secret: HsmSecret) -> Self {
        Self::Hsm(secret)
    }

    /// Derives the private key at `locator`.
    ///
    /// HSM channel keys are relative to `peer`; BIP32 keys ignore it.
    pub fn derive(
        &self,
        network: Network,
        peer: Option<&PublicKey>,
        locator: KeyLocator,
    ) -> DerivationResult<SecretKey> {
        match self {
            KeyDeriver::Bip32 { root, mode } => {
                let path = DerivationPath::for_locator(network, locator)?;
                root.derive_path(&path, *mode)?.secret_key()
            }
            KeyDeriver::Hsm(secret) => {
                if locator.family == KeyFamily::NodeKey {
                    return secret.node_key();
                }

                let role = HsmRole::try_from(locator.family)?;
                let peer = peer.ok_or(DerivationError::MissingPeer)?;

                secret.channel_key(peer, u64::from(locator.index), role)
            }
        }
    }

    /// Returns a function that derives successive indices of one family cheaply.
    ///
    /// For BIP32 the family branch `m/1017'/<coin_type>'/<family>'/0` is derived once and every
    /// index is a single non-hardened step from there.
    pub fn family_deriver<'a>(
        &'a self,
        network: Network,
        peer: Option<&'a PublicKey>,
        family: KeyFamily,
    ) -> DerivationResult<Box<dyn Fn(u32) -> DerivationResult<SecretKey> + 'a>> {
        match self {
            KeyDeriver::Bip32 { root, mode } => {
                let branch_path = DerivationPath::family_branch(network, KeyLocator::new(family, 0))?;
                let branch = root.derive_path(&branch_path, *mode)?;

                Ok(Box::new(move |index| {
                    branch
                        .derive_child(index, KeyPadding::Standard)?
                        .secret_key()
                }))
            }
            KeyDeriver::Hsm(_) => Ok(Box::new(move |index| {
                self.derive(network, peer, KeyLocator::new(family, index))
            })),
        }
    }

    /// A short name of the strategy for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            KeyDeriver::Bip32 { .. } => "bip32",
            KeyDeriver::Hsm(_) => "hsm",
        }
    }
}
