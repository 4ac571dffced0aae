//! The channel data model reconstructed from a node's database or from a static channel backup.

use std::fmt;

use bitcoin::{Amount, Network, OutPoint, Transaction};
use secp256k1::{ecdsa::Signature, PublicKey};
use serde::{Deserialize, Serialize};

use crate::{keys::KeyDescriptor, serde_utils};

/// Feature bits describing how a channel's transactions and scripts are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelType(pub u64);

impl ChannelType {
    /// A channel funded by a single party. This is the empty flag set.
    pub const SINGLE_FUNDER: ChannelType = ChannelType(0);
    /// Both parties contributed to the funding output.
    pub const DUAL_FUNDER: ChannelType = ChannelType(1);
    /// The to-remote output pays the static, untweaked payment base point.
    pub const TWEAKLESS: ChannelType = ChannelType(2);
    /// The funding transaction is not known to the node.
    pub const NO_FUNDING_TX: ChannelType = ChannelType(4);
    /// Commitments carry anchor outputs and a CSV-encumbered to-remote output.
    pub const ANCHOR_OUTPUTS: ChannelType = ChannelType(8);
    /// The channel cannot be used for new payments.
    pub const FROZEN: ChannelType = ChannelType(16);
    /// Second-level HTLC transactions carry no fee.
    pub const ZERO_HTLC_TX_FEE: ChannelType = ChannelType(32);
    /// The initiator's outputs are locked until a lease expires.
    pub const LEASE_EXPIRATION: ChannelType = ChannelType(64);
    /// The channel was used before its funding transaction confirmed.
    pub const ZERO_CONF: ChannelType = ChannelType(128);
    /// The channel uses a short channel id alias.
    pub const SCID_ALIAS_CHAN: ChannelType = ChannelType(256);
    /// The scid alias feature bit was negotiated.
    pub const SCID_ALIAS_FEATURE: ChannelType = ChannelType(512);
    /// The funding output is a MuSig2 taproot output.
    pub const SIMPLE_TAPROOT: ChannelType = ChannelType(1024);
    /// The funding output commits to an auxiliary tapscript root.
    pub const TAPSCRIPT_ROOT: ChannelType = ChannelType(2048);

    const NAMES: [(ChannelType, &'static str); 12] = [
        (Self::DUAL_FUNDER, "dual-funder"),
        (Self::TWEAKLESS, "tweakless"),
        (Self::NO_FUNDING_TX, "no-funding-tx"),
        (Self::ANCHOR_OUTPUTS, "anchors"),
        (Self::FROZEN, "frozen"),
        (Self::ZERO_HTLC_TX_FEE, "zero-htlc-tx-fee"),
        (Self::LEASE_EXPIRATION, "lease-expiration"),
        (Self::ZERO_CONF, "zero-conf"),
        (Self::SCID_ALIAS_CHAN, "scid-alias-chan"),
        (Self::SCID_ALIAS_FEATURE, "scid-alias-feature"),
        (Self::SIMPLE_TAPROOT, "simple-taproot"),
        (Self::TAPSCRIPT_ROOT, "tapscript-root"),
    ];

    /// Returns `true` if every bit of `other` is set.
    pub const fn contains(self, other: ChannelType) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the to-remote output pays the static payment base point.
    pub const fn is_tweakless(self) -> bool {
        self.contains(Self::TWEAKLESS)
    }

    /// Whether the commitment carries anchor outputs.
    pub const fn has_anchors(self) -> bool {
        self.contains(Self::ANCHOR_OUTPUTS)
    }

    /// Whether the channel is a taproot channel.
    pub const fn is_taproot(self) -> bool {
        self.contains(Self::SIMPLE_TAPROOT)
    }

    /// Whether the channel carries a script-enforced lease.
    pub const fn has_lease_expiration(self) -> bool {
        self.contains(Self::LEASE_EXPIRATION)
    }
}

impl std::ops::BitOr for ChannelType {
    type Output = ChannelType;

    fn bitor(self, rhs: Self) -> Self::Output {
        ChannelType(self.0 | rhs.0)
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "single-funder");
        }

        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();

        write!(f, "{}", names.join("|"))
    }
}

/// Limits one side imposes on the other's commitment transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConstraints {
    /// Relative delay on the to-local output of the commitment this config belongs to.
    pub csv_delay: u16,

    /// Outputs below this value are trimmed from commitments.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub dust_limit: Amount,

    /// Balance that must stay in the channel.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub chan_reserve: Amount,
}

/// The keys and constraints of one side of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// The key locking the funding output.
    pub multisig_key: KeyDescriptor,

    /// Base point for revocation keys handed to the counterparty.
    pub revocation_base_point: KeyDescriptor,

    /// Base point for the to-remote payment key.
    pub payment_base_point: KeyDescriptor,

    /// Base point for the CSV-delayed to-local key.
    pub delay_base_point: KeyDescriptor,

    /// Base point for HTLC keys.
    pub htlc_base_point: KeyDescriptor,

    /// Limits for this side.
    pub constraints: ChannelConstraints,
}

/// The latest commitment transaction of the local node together with the remote's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCommitment {
    /// The unsigned commitment transaction.
    #[serde(with = "serde_utils::hex_tx")]
    pub commit_tx: Transaction,

    /// The counterparty's signature for the funding input.
    #[serde(with = "serde_utils::hex_der_sig")]
    pub commit_sig: Signature,

    /// The commitment number.
    pub commit_height: u64,
}

/// The state of an open channel as stored by the node that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChannelState {
    /// The funding output.
    pub funding_outpoint: OutPoint,

    /// The chain the channel lives on, as identified by its chain hash.
    pub chain: Network,

    /// The channel's feature bits.
    pub chan_type: ChannelType,

    /// The value of the funding output.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub capacity: Amount,

    /// The confirmed location of the funding output.
    #[serde(default)]
    pub short_channel_id: u64,

    /// Whether the local node opened the channel.
    #[serde(default)]
    pub is_initiator: bool,

    /// The counterparty's node key. Required when channel keys are derived per peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_node_pub: Option<PublicKey>,

    /// Local keys and constraints.
    pub local_chan_cfg: ChannelConfig,

    /// Remote keys and constraints.
    pub remote_chan_cfg: ChannelConfig,

    /// The latest local commitment, if the node ever received one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_commitment: Option<LocalCommitment>,

    /// Root of the local revocation producer.
    #[serde(with = "serde_utils::hex_bytes32")]
    pub revocation_root: [u8; 32],
}

/// Commitment data that newer static channel backups carry.
pub type CloseTxInputs = LocalCommitment;

/// A decrypted static channel backup entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBackupSingle {
    /// Backup format version. Determines the channel type.
    pub version: u8,

    /// Whether the local node opened the channel.
    pub is_initiator: bool,

    /// The chain the channel lives on.
    pub chain: Network,

    /// The funding output.
    pub funding_outpoint: OutPoint,

    /// The confirmed location of the funding output.
    #[serde(default)]
    pub short_channel_id: u64,

    /// The counterparty's node key.
    pub remote_node_pub: PublicKey,

    /// The value of the funding output.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub capacity: Amount,

    /// Local keys and constraints.
    pub local_chan_cfg: ChannelConfig,

    /// Remote keys and constraints.
    pub remote_chan_cfg: ChannelConfig,

    /// Locates the key whose secret is the revocation producer root.
    pub sha_chain_root_desc: KeyDescriptor,

    /// Present only in backups that carry the latest commitment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_tx_inputs: Option<CloseTxInputs>,
}

impl ChannelBackupSingle {
    /// Maps the backup version to the channel type it encodes.
    ///
    /// Returns `None` for versions this tool does not know.
    pub const fn chan_type(&self) -> Option<ChannelType> {
        let tweakless = ChannelType::TWEAKLESS.0;
        let anchors = tweakless | ChannelType::ANCHOR_OUTPUTS.0;
        let zero_fee = anchors | ChannelType::ZERO_HTLC_TX_FEE.0;
        let taproot = zero_fee | ChannelType::SIMPLE_TAPROOT.0;

        let bits = match self.version {
            0 => 0,
            1 => tweakless,
            2 => anchors,
            3 => zero_fee,
            4 => zero_fee | ChannelType::LEASE_EXPIRATION.0,
            5 => taproot,
            6 => taproot | ChannelType::TAPSCRIPT_ROOT.0,
            _ => return None,
        };

        Some(ChannelType(bits))
    }
}
