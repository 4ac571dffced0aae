//! Funding output scripts.
//!
//! Segwit v0 channels lock the funding output in a P2WSH 2-of-2 multisig. Taproot channels use
//! the MuSig2 aggregate of both funding keys with a BIP-86 tweak, i.e. a key-spend-only P2TR
//! output.
//!
//! No recovery engine spends a taproot funding output: force closes and backup closes reject
//! taproot channel types before building their funding descriptor, and zombie matches only
//! accept P2WSH addresses. The P2TR branch exists so that taproot funding outputs can be
//! recognised and is only exercised by tests. Spending one needs an interactive MuSig2 session
//! between both parties.

use bitcoin::{
    opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_2},
    script::{Builder, Instruction},
    Amount, ScriptBuf, TxOut,
};
use musig2::KeyAggContext;
use secp256k1::{PublicKey, XOnlyPublicKey, SECP256K1};

use crate::{
    channel::ChannelType,
    errors::{ScriptError, ScriptResult},
};

/// Orders two keys ascending by their compressed serialization.
pub fn sort_keys(a: PublicKey, b: PublicKey) -> (PublicKey, PublicKey) {
    if a.serialize() <= b.serialize() {
        (a, b)
    } else {
        (b, a)
    }
}

/// Creates `OP_2 <low> <high> OP_2 OP_CHECKMULTISIG`.
pub fn multisig_script(a: &PublicKey, b: &PublicKey) -> ScriptBuf {
    let (low, high) = sort_keys(*a, *b);

    Builder::new()
        .push_opcode(OP_PUSHNUM_2)
        .push_key(&bitcoin::PublicKey::new(low))
        .push_key(&bitcoin::PublicKey::new(high))
        .push_opcode(OP_PUSHNUM_2)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

/// Extracts the two keys of a canonical 2-of-2 multisig script, in script order.
pub fn parse_multisig_script(script: &ScriptBuf) -> ScriptResult<(PublicKey, PublicKey)> {
    let instructions = script
        .instructions()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| ScriptError::NotMultiSig)?;

    let [Instruction::Op(two), Instruction::PushBytes(first), Instruction::PushBytes(second), Instruction::Op(two_again), Instruction::Op(check)] =
        instructions.as_slice()
    else {
        return Err(ScriptError::NotMultiSig);
    };

    if *two != OP_PUSHNUM_2 || *two_again != OP_PUSHNUM_2 || *check != OP_CHECKMULTISIG {
        return Err(ScriptError::NotMultiSig);
    }

    let first = PublicKey::from_slice(first.as_bytes()).map_err(|_| ScriptError::NotMultiSig)?;
    let second = PublicKey::from_slice(second.as_bytes()).map_err(|_| ScriptError::NotMultiSig)?;

    Ok((first, second))
}

/// Aggregates the two funding keys with MuSig2 after sorting them.
///
/// The result is the *internal* key of the funding output; the BIP-86 tweak is applied when the
/// output script is created.
pub fn musig2_funding_key(a: &PublicKey, b: &PublicKey) -> ScriptResult<XOnlyPublicKey> {
    let (low, high) = sort_keys(*a, *b);
    let key_agg_ctx =
        KeyAggContext::new([low, high]).map_err(|e| ScriptError::KeyAgg(e.to_string()))?;

    let aggregated_pubkey: PublicKey = key_agg_ctx.aggregated_pubkey();

    Ok(aggregated_pubkey.x_only_public_key().0)
}

/// A funding output together with the script needed to spend it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingOutput {
    /// The witness script for P2WSH funding outputs. Taproot outputs have none.
    pub witness_script: Option<ScriptBuf>,

    /// The output being spent.
    pub tx_out: TxOut,
}

/// Builds the funding output for the given channel type and keys.
pub fn funding_output(
    chan_type: ChannelType,
    local_key: &PublicKey,
    remote_key: &PublicKey,
    capacity: Amount,
) -> ScriptResult<FundingOutput> {
    if chan_type.is_taproot() {
        let internal_key = musig2_funding_key(local_key, remote_key)?;

        return Ok(FundingOutput {
            witness_script: None,
            tx_out: TxOut {
                value: capacity,
                script_pubkey: ScriptBuf::new_p2tr(SECP256K1, internal_key, None),
            },
        });
    }

    let witness_script = multisig_script(local_key, remote_key);
    let script_pubkey = witness_script.to_p2wsh();

    Ok(FundingOutput {
        witness_script: Some(witness_script),
        tx_out: TxOut {
            value: capacity,
            script_pubkey,
        },
    })
}
