//! Sign descriptors and the factory functions that build them for channel outputs.

use bitcoin::{
    taproot::TaprootSpendInfo, Amount, EcdsaSighashType, ScriptBuf, TapNodeHash, TxOut,
};
use lnrescue_primitives::{
    channel::ChannelType,
    keys::KeyDescriptor,
    scripts::{funding::funding_output, taproot},
    tweak::single_tweak_bytes,
};
use secp256k1::{PublicKey, SecretKey};

use crate::errors::{SignerError, SignerResult};

/// How the spent output is unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMethod {
    /// Segwit v0 ECDSA over the BIP-143 sighash.
    WitnessV0,

    /// Taproot key spend over the BIP-341 key sighash.
    TaprootKeySpend,

    /// Taproot script spend over the BIP-341 leaf sighash.
    TaprootScriptSpend,
}

/// A tweak applied to the derived base key before signing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Tweak {
    /// `k + tweak`, with `tweak = SHA256(per_commitment_point || base_point)`.
    Single([u8; 32]),

    /// The revocation tweak, keyed by the revealed per-commitment secret.
    Double(SecretKey),
}

impl std::fmt::Debug for Tweak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tweak::Single(_) => f.write_str("Tweak::Single(..)"),
            Tweak::Double(_) => f.write_str("Tweak::Double(..)"),
        }
    }
}

/// Everything needed to sign one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignDescriptor {
    /// The key to sign with.
    pub key_desc: KeyDescriptor,

    /// The tweak to apply to the key, if any.
    pub tweak: Option<Tweak>,

    /// The witness script (segwit v0) or the leaf script (taproot script spend).
    pub witness_script: ScriptBuf,

    /// The merkle root the output key commits to, for taproot key spends.
    pub tap_tweak: Option<TapNodeHash>,

    /// The output being spent. Must match the actual previous output exactly.
    pub output: TxOut,

    /// The sighash flag of segwit v0 signatures. Taproot signatures use `SIGHASH_DEFAULT`.
    pub hash_type: EcdsaSighashType,

    /// How the output is unlocked.
    pub sign_method: SignMethod,

    /// The index of the input spending [`Self::output`].
    pub input_index: usize,
}

/// Builds the descriptor for the local funding key of a segwit v0 channel.
///
/// Taproot funding outputs need a MuSig2 session with the counterparty and are rejected.
pub fn funding_sign_desc(
    chan_type: ChannelType,
    local_multisig: KeyDescriptor,
    local_key: &PublicKey,
    remote_key: &PublicKey,
    capacity: Amount,
    input_index: usize,
) -> SignerResult<SignDescriptor> {
    if chan_type.is_taproot() {
        return Err(SignerError::UnsupportedChannelType(chan_type));
    }

    let funding = funding_output(chan_type, local_key, remote_key, capacity)?;
    let witness_script = funding
        .witness_script
        .ok_or(SignerError::UnsupportedChannelType(chan_type))?;

    Ok(SignDescriptor {
        key_desc: local_multisig,
        tweak: None,
        witness_script,
        tap_tweak: None,
        output: funding.tx_out,
        hash_type: EcdsaSighashType::All,
        sign_method: SignMethod::WitnessV0,
        input_index,
    })
}

/// Builds the descriptor that sweeps a segwit v0 to-local output after its delay.
pub fn to_local_sweep_desc(
    delay_base: KeyDescriptor,
    delay_base_point: &PublicKey,
    commit_point: &PublicKey,
    witness_script: ScriptBuf,
    value: Amount,
    input_index: usize,
) -> SignDescriptor {
    let output = TxOut {
        value,
        script_pubkey: witness_script.to_p2wsh(),
    };

    SignDescriptor {
        key_desc: delay_base,
        tweak: Some(Tweak::Single(single_tweak_bytes(commit_point, delay_base_point))),
        witness_script,
        tap_tweak: None,
        output,
        hash_type: EcdsaSighashType::All,
        sign_method: SignMethod::WitnessV0,
        input_index,
    }
}

/// Builds the descriptor that sweeps a taproot to-local output through its delay leaf.
pub fn taproot_to_local_sweep_desc(
    delay_base: KeyDescriptor,
    delay_base_point: &PublicKey,
    commit_point: &PublicKey,
    spend_info: &TaprootSpendInfo,
    delay_leaf: ScriptBuf,
    value: Amount,
    input_index: usize,
) -> SignDescriptor {
    let output = TxOut {
        value,
        script_pubkey: ScriptBuf::new_p2tr_tweaked(spend_info.output_key()),
    };

    SignDescriptor {
        key_desc: delay_base,
        tweak: Some(Tweak::Single(single_tweak_bytes(commit_point, delay_base_point))),
        witness_script: delay_leaf,
        tap_tweak: None,
        output,
        hash_type: EcdsaSighashType::All,
        sign_method: SignMethod::TaprootScriptSpend,
        input_index,
    }
}

/// Builds a descriptor for a key-path spend of a taproot output with the given merkle root.
pub fn taproot_key_spend_desc(
    key_desc: KeyDescriptor,
    output: TxOut,
    tap_tweak: Option<TapNodeHash>,
    input_index: usize,
) -> SignDescriptor {
    SignDescriptor {
        key_desc,
        tweak: None,
        witness_script: ScriptBuf::new(),
        tap_tweak,
        output,
        hash_type: EcdsaSighashType::All,
        sign_method: SignMethod::TaprootKeySpend,
        input_index,
    }
}

/// Returns the control block for the leaf of a taproot script-spend descriptor.
pub fn leaf_control_block(
    spend_info: &TaprootSpendInfo,
    desc: &SignDescriptor,
) -> SignerResult<bitcoin::taproot::ControlBlock> {
    Ok(taproot::control_block(spend_info, &desc.witness_script)?)
}
