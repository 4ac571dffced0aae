//! Derivation path parsing and the Lightning key hierarchy.
//!
//! # Key Hierarchy Overview
//!
//! ```text
//! Root key
//! └── m/1017'/<coin_type>'
//!     ├── <family>'/0/<index> ─── channel and node keys
//!     │   ├── 0'/0/i ──────────── multisig keys
//!     │   ├── 1'/0/i ──────────── revocation base points
//!     │   ├── ...
//!     │   └── 9'/0/i ──────────── watchtower identity
//! ```
//!
//! The coin type is `0` on mainnet and `1` on every other network.

use std::{fmt, str::FromStr};

use bitcoin::{bip32::ChildNumber, Network};
use lnrescue_primitives::keys::KeyLocator;

use crate::errors::{DerivationError, DerivationResult};

/// Purpose index of the Lightning key hierarchy.
pub const LIGHTNING_PURPOSE: u32 = 1017;

/// Offset of hardened indices.
pub const HARDENED_OFFSET: u32 = 1 << 31;

/// An ordered, immutable sequence of child indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// The path `m/1017'/<coin_type>'/<family>'/0/<index>` of a located key.
    pub fn for_locator(network: Network, locator: KeyLocator) -> DerivationResult<Self> {
        let mut path = Self::family_branch(network, locator)?.0;
        path.push(ChildNumber::from_normal_idx(locator.index)?);

        Ok(Self(path))
    }

    /// The path `m/1017'/<coin_type>'/<family>'/0` under which all keys of a family live.
    pub fn family_branch(network: Network, locator: KeyLocator) -> DerivationResult<Self> {
        Ok(Self(vec![
            ChildNumber::from_hardened_idx(LIGHTNING_PURPOSE)?,
            ChildNumber::from_hardened_idx(coin_type(network))?,
            ChildNumber::from_hardened_idx(locator.family.as_u32())?,
            ChildNumber::from_normal_idx(0)?,
        ]))
    }

    /// The raw indices, hardened ones offset by 2^31.
    pub fn to_u32_vec(&self) -> Vec<u32> {
        self.0.iter().map(|child| u32::from(*child)).collect()
    }

    /// The number of elements in the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the path is the root `m`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The BIP44-style coin type of a network.
pub fn coin_type(network: Network) -> u32 {
    match network {
        Network::Bitcoin => 0,
        _ => 1,
    }
}

impl AsRef<[ChildNumber]> for DerivationPath {
    fn as_ref(&self) -> &[ChildNumber] {
        &self.0
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(children: Vec<ChildNumber>) -> Self {
        Self(children)
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| DerivationError::InvalidPath {
            path: s.to_string(),
            reason,
        };

        let trimmed = s.trim();
        let rest = match trimmed.strip_prefix('m') {
            Some("") => return Ok(Self(Vec::new())),
            Some(rest) => rest.strip_prefix('/').ok_or_else(|| invalid("expected '/' after 'm'"))?,
            None => trimmed,
        };

        if rest.is_empty() {
            return Ok(Self(Vec::new()));
        }

        rest.split('/')
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix(['\'', 'h', 'H']) {
                    Some(digits) => (digits, true),
                    None => (part, false),
                };

                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("path elements must be decimal numbers"));
                }

                let index: u32 = digits
                    .parse()
                    .map_err(|_| invalid("path element out of range"))?;

                let child = if hardened {
                    ChildNumber::from_hardened_idx(index)
                } else {
                    ChildNumber::from_normal_idx(index)
                };

                child.map_err(|_| invalid("path element out of range"))
            })
            .collect::<DerivationResult<Vec<_>>>()
            .map(Self)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;

        for child in &self.0 {
            match child {
                ChildNumber::Normal { index } => write!(f, "/{index}")?,
                ChildNumber::Hardened { index } => write!(f, "/{index}'")?,
            }
        }

        Ok(())
    }
}
