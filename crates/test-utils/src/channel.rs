//! A fully signed, deterministic channel between two BIP32 nodes.
//!
//! The local node owns the channel state; the remote node provides the signature on the local
//! commitment transaction, exactly as it would during normal channel operation.

use bitcoin::{
    absolute::LockTime,
    hashes::{sha256, Hash},
    transaction, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
};
use lnrescue_key_deriv::{Bip32Mode, ExtendedKey, KeyDeriver, KeyRing};
use lnrescue_primitives::{
    channel::{
        ChannelBackupSingle, ChannelConfig, ChannelConstraints, ChannelType, LocalCommitment,
        OpenChannelState,
    },
    keys::{KeyDescriptor, KeyFamily, KeyLocator},
    scripts::{
        commitment::{anchor_script, to_local_script, to_remote_output, CommitmentKeys},
        funding::funding_output,
    },
    shachain::{ecdh_root, RevocationProducer},
};
use lnrescue_signer::{
    descriptor::funding_sign_desc, witness::verify_multisig_witness, RawSignature, Signer,
};

/// The network all fixtures live on.
pub const FIXTURE_NETWORK: Network = Network::Regtest;

/// The CSV delay of the local to-local output.
pub const FIXTURE_CSV_DELAY: u16 = 144;

/// The commitment height of the fixture's latest local commitment.
pub const FIXTURE_COMMIT_HEIGHT: u64 = 5;

/// The channel capacity.
pub const FIXTURE_CAPACITY: Amount = Amount::from_sat(1_000_000);

/// The local balance on the commitment, before anchors.
pub const FIXTURE_TO_LOCAL: Amount = Amount::from_sat(600_000);

/// The remote balance on the commitment.
pub const FIXTURE_TO_REMOTE: Amount = Amount::from_sat(390_000);

const ANCHOR_VALUE: Amount = Amount::from_sat(330);

/// Creates a BIP32 key ring from a seed filled with `seed_byte`.
pub fn bip32_keyring(seed_byte: u8) -> KeyRing {
    let root = ExtendedKey::new_master(FIXTURE_NETWORK, &[seed_byte; 32]).expect("valid seed");

    KeyRing::new(KeyDeriver::bip32(root, Bip32Mode::LndCompat), FIXTURE_NETWORK).with_scan_limit(20)
}

/// Derives a channel config from keys at `index` of every base point family.
pub fn channel_config(ring: &KeyRing, index: u32) -> ChannelConfig {
    let desc = |family| {
        ring.derive_key_desc(KeyLocator::new(family, index))
            .expect("must derive")
    };

    ChannelConfig {
        multisig_key: desc(KeyFamily::MultiSig),
        revocation_base_point: desc(KeyFamily::RevocationBase),
        payment_base_point: desc(KeyFamily::PaymentBase),
        delay_base_point: desc(KeyFamily::DelayBase),
        htlc_base_point: desc(KeyFamily::HtlcBase),
        constraints: ChannelConstraints {
            csv_delay: FIXTURE_CSV_DELAY,
            dust_limit: Amount::from_sat(354),
            chan_reserve: Amount::from_sat(10_000),
        },
    }
}

fn backup_version(chan_type: ChannelType) -> u8 {
    match chan_type.0 {
        0 => 0,
        2 => 1,
        10 => 2,
        42 => 3,
        other => panic!("no backup version for channel type {other}"),
    }
}

/// How the fixture seeds the local shachain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootScheme {
    /// The raw revocation root key. The backup omits the local multisig key.
    Legacy,

    /// ECDH of the revocation root key and the local multisig key, which the backup carries.
    Ecdh,
}

/// A channel whose local commitment is signed by the remote party.
#[derive(Debug, Clone)]
pub struct ChannelFixture {
    /// The key ring of the node that owns the channel state.
    pub local_ring: KeyRing,

    /// The key ring of the counterparty.
    pub remote_ring: KeyRing,

    /// The channel type.
    pub chan_type: ChannelType,

    /// The funding outpoint.
    pub funding_outpoint: OutPoint,

    /// The funding output.
    pub funding_output: TxOut,

    /// The 2-of-2 witness script of the funding output.
    pub funding_script: ScriptBuf,

    /// The keys of the latest local commitment.
    pub commit_keys: CommitmentKeys,

    /// The witness script of the to-local output.
    pub to_local_script: ScriptBuf,

    /// The channel as stored by the local node.
    pub local_state: OpenChannelState,

    /// The static backup of the channel, including the latest commitment.
    pub backup: ChannelBackupSingle,
}

impl Default for ChannelFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelFixture {
    /// A tweakless channel.
    pub fn new() -> Self {
        Self::with_chan_type(ChannelType::TWEAKLESS)
    }

    /// A channel of the given type, which must be a segwit v0 type without a lease.
    pub fn with_chan_type(chan_type: ChannelType) -> Self {
        Self::build(chan_type, RootScheme::Legacy)
    }

    /// A tweakless channel whose shachain is seeded by ECDH with the local multisig key.
    pub fn with_ecdh_root() -> Self {
        Self::build(ChannelType::TWEAKLESS, RootScheme::Ecdh)
    }

    fn build(chan_type: ChannelType, scheme: RootScheme) -> Self {
        let local_ring = bip32_keyring(1);
        let remote_ring = bip32_keyring(2);

        let local_cfg = channel_config(&local_ring, 0);
        let remote_cfg = channel_config(&remote_ring, 0);
        let local_funding_key = local_cfg.multisig_key.pub_key.expect("derived");
        let remote_funding_key = remote_cfg.multisig_key.pub_key.expect("derived");

        let funding_txid =
            Txid::from_byte_array(sha256::Hash::hash(b"fixture funding").to_byte_array());
        let funding_outpoint = OutPoint::new(funding_txid, 0);
        let funding = funding_output(
            chan_type,
            &local_funding_key,
            &remote_funding_key,
            FIXTURE_CAPACITY,
        )
        .expect("segwit funding output");
        let funding_script = funding.witness_script.clone().expect("p2wsh funding");

        let root_key = local_ring
            .derive_priv_key(KeyLocator::new(KeyFamily::RevocationRoot, 0))
            .expect("must derive");
        let revocation_root = match scheme {
            RootScheme::Legacy => root_key.secret_bytes(),
            RootScheme::Ecdh => ecdh_root(&root_key, &local_funding_key),
        };
        let commit_point = RevocationProducer::new(revocation_root)
            .per_commitment_point(FIXTURE_COMMIT_HEIGHT)
            .expect("valid point");
        let commit_keys =
            CommitmentKeys::for_local_commitment(chan_type, &local_cfg, &remote_cfg, commit_point)
                .expect("valid keys");

        let to_local_script = to_local_script(
            &commit_keys.revocation_key,
            &commit_keys.to_local_key,
            FIXTURE_CSV_DELAY,
        );
        let to_remote = to_remote_output(chan_type, &commit_keys.to_remote_key);

        let mut outputs = Vec::new();
        let mut to_local_value = FIXTURE_TO_LOCAL;
        if chan_type.has_anchors() {
            to_local_value = to_local_value - ANCHOR_VALUE - ANCHOR_VALUE;
            for key in [local_funding_key, remote_funding_key] {
                outputs.push(TxOut {
                    value: ANCHOR_VALUE,
                    script_pubkey: anchor_script(&key).to_p2wsh(),
                });
            }
        }
        outputs.push(TxOut {
            value: FIXTURE_TO_REMOTE,
            script_pubkey: to_remote.script_pubkey,
        });
        outputs.push(TxOut {
            value: to_local_value,
            script_pubkey: to_local_script.to_p2wsh(),
        });

        let commit_tx = Transaction {
            version: transaction::Version::TWO,
            lock_time: LockTime::from_consensus(0x2000_0005),
            input: vec![TxIn {
                previous_output: funding_outpoint,
                script_sig: ScriptBuf::new(),
                sequence: Sequence(0x8000_0000),
                witness: Witness::new(),
            }],
            output: outputs,
        };

        let remote_desc = funding_sign_desc(
            chan_type,
            remote_cfg.multisig_key,
            &remote_funding_key,
            &local_funding_key,
            FIXTURE_CAPACITY,
            0,
        )
        .expect("segwit funding");
        let commit_sig = Signer::new(&remote_ring)
            .sign_output_raw(&commit_tx, &remote_desc, &[funding.tx_out.clone()])
            .and_then(RawSignature::ecdsa)
            .expect("remote must sign");

        let local_commitment = LocalCommitment {
            commit_tx,
            commit_sig,
            commit_height: FIXTURE_COMMIT_HEIGHT,
        };
        let remote_node_pub = remote_ring.node_pubkey().expect("node key");

        let local_state = OpenChannelState {
            funding_outpoint,
            chain: FIXTURE_NETWORK,
            chan_type,
            capacity: FIXTURE_CAPACITY,
            short_channel_id: (700_000 << 40) | (1 << 16),
            is_initiator: true,
            remote_node_pub: Some(remote_node_pub),
            local_chan_cfg: local_cfg,
            remote_chan_cfg: remote_cfg,
            local_commitment: Some(local_commitment.clone()),
            revocation_root,
        };

        let mut backup_local_cfg = local_cfg;
        if scheme == RootScheme::Legacy {
            backup_local_cfg.multisig_key =
                KeyDescriptor::from_locator(local_cfg.multisig_key.key_locator);
        }

        let backup = ChannelBackupSingle {
            version: backup_version(chan_type),
            is_initiator: true,
            chain: FIXTURE_NETWORK,
            funding_outpoint,
            short_channel_id: local_state.short_channel_id,
            remote_node_pub,
            capacity: FIXTURE_CAPACITY,
            local_chan_cfg: backup_local_cfg,
            remote_chan_cfg: remote_cfg,
            sha_chain_root_desc: KeyDescriptor::from_locator(KeyLocator::new(
                KeyFamily::RevocationRoot,
                0,
            )),
            close_tx_inputs: Some(local_commitment),
        };

        Self {
            local_ring,
            remote_ring,
            chan_type,
            funding_outpoint,
            funding_output: funding.tx_out,
            funding_script,
            commit_keys,
            to_local_script,
            local_state,
            backup,
        }
    }

    /// Panics unless input 0 of `tx` carries a valid 2-of-2 witness for the funding output.
    pub fn assert_funding_witness(&self, tx: &Transaction) {
        verify_multisig_witness(tx, 0, &self.funding_output).expect("funding witness must verify");
    }
}
