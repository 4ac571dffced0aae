//! Sighash messages for the spend paths a [`SignDescriptor`](crate::SignDescriptor) describes.

use bitcoin::{
    hashes::Hash,
    sighash::{Prevouts, SighashCache},
    taproot::{LeafVersion, TapLeafHash},
    EcdsaSighashType, ScriptBuf, TapSighashType, Transaction, TxOut,
};
use secp256k1::Message;

use crate::errors::{SignerError, SignerResult};

fn sighash_err(e: impl std::fmt::Display) -> SignerError {
    SignerError::Sighash(e.to_string())
}

/// Generate the BIP-143 sighash message for a segwit v0 input.
///
/// P2WPKH outputs are hashed with their implied P2PKH script code, everything else with
/// `witness_script`.
pub fn create_segwit_v0_hash(
    sighash_cache: &mut SighashCache<&Transaction>,
    prevout: &TxOut,
    witness_script: &ScriptBuf,
    sighash_type: EcdsaSighashType,
    input_index: usize,
) -> SignerResult<Message> {
    let sighash = if prevout.script_pubkey.is_p2wpkh() {
        sighash_cache
            .p2wpkh_signature_hash(input_index, &prevout.script_pubkey, prevout.value, sighash_type)
            .map_err(sighash_err)?
    } else {
        sighash_cache
            .p2wsh_signature_hash(input_index, witness_script, prevout.value, sighash_type)
            .map_err(sighash_err)?
    };

    Ok(Message::from_digest(sighash.to_byte_array()))
}

/// Generate a sighash message for a taproot `key` spending path at the `input_index` of
/// all `prevouts`.
pub fn create_key_spend_hash(
    sighash_cache: &mut SighashCache<&Transaction>,
    prevouts: &[TxOut],
    sighash_type: TapSighashType,
    input_index: usize,
) -> SignerResult<Message> {
    let sighash = sighash_cache
        .taproot_key_spend_signature_hash(input_index, &Prevouts::All(prevouts), sighash_type)
        .map_err(sighash_err)?;

    Ok(Message::from_digest(sighash.to_byte_array()))
}

/// Generate a sighash message for spending `script` through the script path.
pub fn create_script_spend_hash(
    sighash_cache: &mut SighashCache<&Transaction>,
    script: &ScriptBuf,
    prevouts: &[TxOut],
    sighash_type: TapSighashType,
    input_index: usize,
) -> SignerResult<Message> {
    let leaf_hash = TapLeafHash::from_script(script, LeafVersion::TapScript);

    let sighash = sighash_cache
        .taproot_script_spend_signature_hash(
            input_index,
            &Prevouts::All(prevouts),
            leaf_hash,
            sighash_type,
        )
        .map_err(sighash_err)?;

    Ok(Message::from_digest(sighash.to_byte_array()))
}
