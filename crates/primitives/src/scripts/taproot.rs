//! Taproot commitment outputs.
//!
//! Both commitment outputs of taproot channels use an unspendable internal key so that they can
//! only be spent through one of their script leaves.

use std::sync::LazyLock;

use bitcoin::{
    key::UntweakedPublicKey,
    opcodes::all::{OP_CHECKSIG, OP_CSV, OP_DROP, OP_PUSHNUM_1},
    script::Builder,
    taproot::{ControlBlock, LeafVersion, TaprootBuilder, TaprootSpendInfo},
    ScriptBuf,
};
use secp256k1::{PublicKey, XOnlyPublicKey, SECP256K1};

use crate::errors::{ScriptError, ScriptResult};

/// The compressed NUMS point used as the internal key of taproot commitment outputs.
pub const NUMS_KEY_HEX: &str =
    "02dca094751109d0bd055d03565874e8276dd53e926b44e3bd1bb6bf4bc130a279";

/// An internal key nobody knows the discrete log of.
pub static NUMS_INTERNAL_KEY: LazyLock<XOnlyPublicKey> = LazyLock::new(|| {
    let bytes: [u8; 33] = [
        0x02, 0xdc, 0xa0, 0x94, 0x75, 0x11, 0x09, 0xd0, 0xbd, 0x05, 0x5d, 0x03, 0x56, 0x58, 0x74,
        0xe8, 0x27, 0x6d, 0xd5, 0x3e, 0x92, 0x6b, 0x44, 0xe3, 0xbd, 0x1b, 0xb6, 0xbf, 0x4b, 0xc1,
        0x30, 0xa2, 0x79,
    ];

    PublicKey::from_slice(&bytes)
        .expect("NUMS point is on the curve")
        .x_only_public_key()
        .0
});

fn xonly(key: &PublicKey) -> XOnlyPublicKey {
    key.x_only_public_key().0
}

/// Constructs the taptree for the given scripts.
///
/// Scripts are placed as leaves of the shallowest tree that fits them all. When the number of
/// scripts is not a power of two, the surplus leaves sit one level above the deepest level.
pub fn build_taptree(
    internal_key: UntweakedPublicKey,
    scripts: &[ScriptBuf],
) -> ScriptResult<TaprootSpendInfo> {
    let mut taproot_builder = TaprootBuilder::new();

    let num_scripts = scripts.len();
    let max_depth = if num_scripts > 1 {
        (num_scripts - 1).ilog2() + 1
    } else {
        0
    };

    let max_num_scripts = 2usize.pow(max_depth);
    let num_penultimate_scripts = max_num_scripts.saturating_sub(num_scripts);
    let num_deepest_scripts = num_scripts.saturating_sub(num_penultimate_scripts);

    for (script_idx, script) in scripts.iter().enumerate() {
        let depth = if script_idx < num_deepest_scripts {
            max_depth as u8
        } else {
            (max_depth - 1) as u8
        };

        taproot_builder = taproot_builder
            .add_leaf(depth, script.clone())
            .map_err(|e| ScriptError::Taproot(e.to_string()))?;
    }

    taproot_builder
        .finalize(SECP256K1, internal_key)
        .map_err(|_| ScriptError::Taproot("incomplete tree".to_string()))
}

/// Returns the control block proving `script` is a leaf of `spend_info`.
pub fn control_block(spend_info: &TaprootSpendInfo, script: &ScriptBuf) -> ScriptResult<ControlBlock> {
    spend_info
        .control_block(&(script.clone(), LeafVersion::TapScript))
        .ok_or_else(|| ScriptError::Taproot("leaf not in tree".to_string()))
}

/// A script-path-only taproot output.
#[derive(Debug, Clone)]
pub struct TaprootScriptOutput {
    /// The tree the output commits to.
    pub spend_info: TaprootSpendInfo,

    /// The output's script pubkey.
    pub script_pubkey: ScriptBuf,
}

impl TaprootScriptOutput {
    fn with_nums_key(scripts: &[ScriptBuf]) -> ScriptResult<Self> {
        let spend_info = build_taptree(*NUMS_INTERNAL_KEY, scripts)?;
        let script_pubkey = ScriptBuf::new_p2tr_tweaked(spend_info.output_key());

        Ok(Self {
            spend_info,
            script_pubkey,
        })
    }
}

/// Creates the delay leaf `<delayed_key> OP_CHECKSIG <csv_delay> OP_CSV OP_DROP`.
pub fn to_local_delay_leaf(delayed_key: &PublicKey, csv_delay: u16) -> ScriptBuf {
    Builder::new()
        .push_x_only_key(&xonly(delayed_key))
        .push_opcode(OP_CHECKSIG)
        .push_int(i64::from(csv_delay))
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .into_script()
}

/// Creates the revocation leaf `<delayed_key> OP_DROP <revocation_key> OP_CHECKSIG`.
pub fn to_local_revoke_leaf(delayed_key: &PublicKey, revocation_key: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_x_only_key(&xonly(delayed_key))
        .push_opcode(OP_DROP)
        .push_x_only_key(&xonly(revocation_key))
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Creates the single to-remote leaf `<remote_key> OP_CHECKSIG OP_1 OP_CSV OP_DROP`.
pub fn to_remote_leaf(remote_key: &PublicKey) -> ScriptBuf {
    Builder::new()
        .push_x_only_key(&xonly(remote_key))
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_PUSHNUM_1)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .into_script()
}

/// The taproot to-local output.
#[derive(Debug, Clone)]
pub struct TaprootToLocal {
    /// The output and its tree.
    pub output: TaprootScriptOutput,

    /// The leaf spendable by the owner after the delay.
    pub delay_leaf: ScriptBuf,

    /// The leaf spendable by the counterparty with the revocation key.
    pub revoke_leaf: ScriptBuf,
}

/// Builds the taproot to-local output.
pub fn taproot_to_local(
    delayed_key: &PublicKey,
    revocation_key: &PublicKey,
    csv_delay: u16,
) -> ScriptResult<TaprootToLocal> {
    let delay_leaf = to_local_delay_leaf(delayed_key, csv_delay);
    let revoke_leaf = to_local_revoke_leaf(delayed_key, revocation_key);
    let output = TaprootScriptOutput::with_nums_key(&[delay_leaf.clone(), revoke_leaf.clone()])?;

    Ok(TaprootToLocal {
        output,
        delay_leaf,
        revoke_leaf,
    })
}

/// Builds the taproot to-remote output, returning it with its only leaf.
pub fn taproot_to_remote(remote_key: &PublicKey) -> ScriptResult<(TaprootScriptOutput, ScriptBuf)> {
    let leaf = to_remote_leaf(remote_key);
    let output = TaprootScriptOutput::with_nums_key(std::slice::from_ref(&leaf))?;

    Ok((output, leaf))
}
