//! Witness assembly and verification.
//!
//! [`CommitmentTxBuilder`] places the two funding signatures onto a commitment or closing
//! transaction. The remaining helpers build the witnesses of the sweep transactions.

use bitcoin::{
    ecdsa, sighash::SighashCache, taproot::ControlBlock, EcdsaSighashType, OutPoint, ScriptBuf,
    TapSighashType, Transaction, TxOut, Witness,
};
use lnrescue_primitives::scripts::{
    funding::{parse_multisig_script, sort_keys},
    general::build_witness,
};
use secp256k1::{schnorr, PublicKey, SECP256K1};

use crate::{
    errors::{SignerError, SignerResult},
    sighash::create_segwit_v0_hash,
};

fn with_flag(signature: secp256k1::ecdsa::Signature) -> Vec<u8> {
    ecdsa::Signature {
        signature,
        sighash_type: EcdsaSighashType::All,
    }
    .to_vec()
}

/// Builds the witness spending a 2-of-2 funding output:
/// `[<empty>, sig_low||ALL, sig_high||ALL, witness_script]`, ordered by ascending public key.
pub fn multisig_witness(
    witness_script: &ScriptBuf,
    first: (PublicKey, secp256k1::ecdsa::Signature),
    second: (PublicKey, secp256k1::ecdsa::Signature),
) -> Witness {
    let (low, high) = sort_keys(first.0, second.0);
    let (sig_low, sig_high) = if low == first.0 && high == second.0 {
        (first.1, second.1)
    } else {
        (second.1, first.1)
    };

    build_witness([
        Vec::new(),
        with_flag(sig_low),
        with_flag(sig_high),
        witness_script.to_bytes(),
    ])
}

/// Builds the witness sweeping a to-local output after its delay: `[sig||ALL, <empty>, script]`.
pub fn to_local_sweep_witness(
    signature: secp256k1::ecdsa::Signature,
    witness_script: &ScriptBuf,
) -> Witness {
    build_witness([with_flag(signature), Vec::new(), witness_script.to_bytes()])
}

/// Builds a taproot script-path witness `[sig, leaf, control_block]`.
pub fn taproot_script_witness(
    signature: schnorr::Signature,
    leaf: &ScriptBuf,
    control_block: &ControlBlock,
) -> Witness {
    let signature = bitcoin::taproot::Signature {
        signature,
        sighash_type: TapSighashType::Default,
    };

    build_witness([signature.to_vec(), leaf.to_bytes(), control_block.serialize()])
}

/// Assembles the funding input witness of a commitment transaction.
#[derive(Debug, Clone)]
pub struct CommitmentTxBuilder {
    funding_outpoint: OutPoint,
    witness_script: ScriptBuf,
}

impl CommitmentTxBuilder {
    /// Creates a builder for transactions spending `funding_outpoint` locked by `witness_script`.
    pub const fn new(funding_outpoint: OutPoint, witness_script: ScriptBuf) -> Self {
        Self {
            funding_outpoint,
            witness_script,
        }
    }

    /// The index of the funding input in `tx`.
    pub fn funding_input_index(&self, tx: &Transaction) -> SignerResult<usize> {
        tx.input
            .iter()
            .position(|txin| txin.previous_output == self.funding_outpoint)
            .ok_or(SignerError::InputOutOfRange(tx.input.len()))
    }

    /// Returns `tx` with the funding input's witness filled in.
    pub fn assemble(
        &self,
        mut tx: Transaction,
        local: (PublicKey, secp256k1::ecdsa::Signature),
        remote: (PublicKey, secp256k1::ecdsa::Signature),
    ) -> SignerResult<Transaction> {
        let index = self.funding_input_index(&tx)?;
        tx.input[index].witness = multisig_witness(&self.witness_script, local, remote);

        Ok(tx)
    }
}

/// Verifies an ECDSA signature of `pubkey` over input `input_index` spending `prevout`.
pub fn verify_segwit_v0_signature(
    tx: &Transaction,
    input_index: usize,
    prevout: &TxOut,
    witness_script: &ScriptBuf,
    pubkey: &PublicKey,
    signature: &secp256k1::ecdsa::Signature,
) -> SignerResult<()> {
    let message = create_segwit_v0_hash(
        &mut SighashCache::new(tx),
        prevout,
        witness_script,
        EcdsaSighashType::All,
        input_index,
    )?;

    SECP256K1
        .verify_ecdsa(&message, signature, pubkey)
        .map_err(|e| SignerError::InvalidSignature(format!("input {input_index}: {e}")))
}

/// Verifies a fully assembled 2-of-2 witness on input `input_index` against `prevout`.
///
/// Checks the element layout, that the witness script hashes to the prevout's script, and that
/// both signatures verify for the keys in script order.
pub fn verify_multisig_witness(
    tx: &Transaction,
    input_index: usize,
    prevout: &TxOut,
) -> SignerResult<()> {
    let invalid =
        |reason: &str| SignerError::InvalidSignature(format!("input {input_index}: {reason}"));

    let witness = &tx
        .input
        .get(input_index)
        .ok_or(SignerError::InputOutOfRange(input_index))?
        .witness;

    let elements: Vec<&[u8]> = witness.iter().collect();
    let [empty, sig_low, sig_high, script] = elements.as_slice() else {
        return Err(invalid("expected four witness elements"));
    };
    if !empty.is_empty() {
        return Err(invalid("first element must be empty"));
    }

    let witness_script = ScriptBuf::from_bytes(script.to_vec());
    if witness_script.to_p2wsh() != prevout.script_pubkey {
        return Err(invalid("witness script does not match the output"));
    }

    let (key_low, key_high) = parse_multisig_script(&witness_script)?;

    for (sig, key) in [(sig_low, key_low), (sig_high, key_high)] {
        let sig = ecdsa::Signature::from_slice(sig).map_err(|e| invalid(&e.to_string()))?;
        if sig.sighash_type != EcdsaSighashType::All {
            return Err(invalid("signatures must use SIGHASH_ALL"));
        }

        verify_segwit_v0_signature(
            tx,
            input_index,
            prevout,
            &witness_script,
            &key,
            &sig.signature,
        )?;
    }

    Ok(())
}
