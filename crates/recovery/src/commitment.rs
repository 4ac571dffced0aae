//! The signing core shared by force closes from live state and from backups.

use bitcoin::{consensus::encode::serialize_hex, Amount, OutPoint, Transaction};
use lnrescue_key_deriv::KeyRing;
use lnrescue_primitives::{
    channel::{ChannelConfig, ChannelType, LocalCommitment},
    errors::ScriptError,
    keys::KeyDescriptor,
    scripts::commitment::{find_output, to_local_script, to_remote_output, CommitmentKeys},
    shachain::RevocationProducer,
};
use lnrescue_signer::{
    descriptor::funding_sign_desc,
    witness::{verify_segwit_v0_signature, CommitmentTxBuilder},
    SignDescriptor, Signer,
};
use secp256k1::{PublicKey, SECP256K1};
use tracing::debug;

use crate::{
    errors::{RecoveryError, RecoveryResult},
    summary::{ForceCloseSummary, OutputSummary},
};

/// The channel fields needed to sign a local commitment transaction.
#[derive(Debug, Clone, Copy)]
pub struct CommitmentSource<'a> {
    /// The funding outpoint.
    pub funding_outpoint: OutPoint,

    /// The channel type.
    pub chan_type: ChannelType,

    /// The channel capacity.
    pub capacity: Amount,

    /// The counterparty's node key.
    pub remote_node_pub: Option<PublicKey>,

    /// The local channel config.
    pub local_cfg: &'a ChannelConfig,

    /// The remote channel config.
    pub remote_cfg: &'a ChannelConfig,

    /// The commitment transaction and the remote signature on it.
    pub commitment: &'a LocalCommitment,

    /// The shachain root of the local revocation producer.
    pub revocation_root: [u8; 32],
}

/// A fully signed commitment transaction.
#[derive(Debug, Clone)]
pub struct SignedCommitment {
    /// The transaction, ready for broadcast.
    pub tx: Transaction,

    /// The keys of the commitment.
    pub keys: CommitmentKeys,

    /// The record of the commitment.
    pub summary: ForceCloseSummary,
}

/// Returns `ring` bound to the channel's peer, if the peer is known.
pub fn channel_ring(ring: &KeyRing, remote_node_pub: Option<PublicKey>) -> KeyRing {
    match remote_node_pub {
        Some(peer) => ring.with_peer(peer),
        None => ring.clone(),
    }
}

fn resolve_key(ring: &KeyRing, desc: KeyDescriptor) -> RecoveryResult<(KeyDescriptor, PublicKey)> {
    if let Some(pub_key) = desc.pub_key {
        return Ok((desc, pub_key));
    }

    debug!(locator = %desc.key_locator, "re-deriving missing public key");
    let pub_key = ring.derive_priv_key(desc.key_locator)?.public_key(SECP256K1);

    Ok((KeyDescriptor::new(desc.key_locator, pub_key), pub_key))
}

fn required(key: Option<PublicKey>, which: &'static str) -> RecoveryResult<PublicKey> {
    Ok(key.ok_or(ScriptError::MissingBasePoint(which))?)
}

/// Adds the local signature to the commitment in `source` and records its outputs.
///
/// `ring` must already be bound to the channel's peer where the deriver needs one.
pub fn sign_commitment(
    ring: &KeyRing,
    source: &CommitmentSource<'_>,
) -> RecoveryResult<SignedCommitment> {
    let chan_point = source.funding_outpoint;
    let chan_type = source.chan_type;
    if chan_type.is_taproot() || chan_type.has_lease_expiration() {
        return Err(RecoveryError::UnsupportedChannelType {
            chan_point,
            chan_type,
        });
    }

    let (local_multisig, local_key) = resolve_key(ring, source.local_cfg.multisig_key)?;
    let remote_key = required(source.remote_cfg.multisig_key.pub_key, "remote multisig")?;

    let tx = source.commitment.commit_tx.clone();
    let desc = funding_sign_desc(
        chan_type,
        local_multisig,
        &local_key,
        &remote_key,
        source.capacity,
        0,
    )?;
    let builder = CommitmentTxBuilder::new(chan_point, desc.witness_script.clone());
    let desc = SignDescriptor {
        input_index: builder.funding_input_index(&tx)?,
        ..desc
    };

    verify_segwit_v0_signature(
        &tx,
        desc.input_index,
        &desc.output,
        &desc.witness_script,
        &remote_key,
        &source.commitment.commit_sig,
    )?;

    let prevouts = vec![desc.output.clone(); tx.input.len()];
    let local_sig = Signer::new(ring)
        .sign_output_raw(&tx, &desc, &prevouts)?
        .ecdsa()?;

    let tx = builder.assemble(
        tx,
        (local_key, local_sig),
        (remote_key, source.commitment.commit_sig),
    )?;

    let commit_point = RevocationProducer::new(source.revocation_root)
        .per_commitment_point(source.commitment.commit_height)?;
    let keys = CommitmentKeys::for_local_commitment(
        chan_type,
        source.local_cfg,
        source.remote_cfg,
        commit_point,
    )?;

    let csv_delay = source.local_cfg.constraints.csv_delay;
    let to_local_script = to_local_script(&keys.revocation_key, &keys.to_local_key, csv_delay);
    let to_local_spk = to_local_script.to_p2wsh();
    let to_local = find_output(&tx, &to_local_spk).map(|vout| OutputSummary {
        vout,
        value: tx.output[vout as usize].value,
        script_pubkey: to_local_spk,
        witness_script: Some(to_local_script),
    });

    let to_remote_script = to_remote_output(chan_type, &keys.to_remote_key);
    let to_remote = find_output(&tx, &to_remote_script.script_pubkey).map(|vout| OutputSummary {
        vout,
        value: tx.output[vout as usize].value,
        script_pubkey: to_remote_script.script_pubkey,
        witness_script: to_remote_script.witness_script,
    });

    let txid = tx.compute_txid();
    debug!(%chan_point, %txid, height = source.commitment.commit_height, "signed commitment");

    let summary = ForceCloseSummary {
        chan_point,
        chan_type,
        remote_node_pub: source.remote_node_pub,
        txid,
        serialized: serialize_hex(&tx),
        csv_delay,
        delay_base_point: required(source.local_cfg.delay_base_point.pub_key, "local delay")?,
        remote_revocation_base_point: required(
            source.remote_cfg.revocation_base_point.pub_key,
            "remote revocation",
        )?,
        commit_point,
        to_local,
        to_remote,
    };

    Ok(SignedCommitment { tx, keys, summary })
}
