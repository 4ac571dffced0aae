//! Standalone helpers to assemble transactions and finalize PSBT inputs.

use std::collections::BTreeMap;

use bitcoin::{
    absolute::LockTime, psbt::Input, transaction, Amount, OutPoint, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Witness,
};

/// Create a version 2 [`Transaction`] with no lock time for the given inputs and outputs.
pub fn create_tx(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>) -> Transaction {
    Transaction {
        version: transaction::Version::TWO,
        lock_time: LockTime::ZERO,
        input: tx_ins,
        output: tx_outs,
    }
}

/// Create a list of [`TxIn`]'s from pairs of [`OutPoint`]'s and the sequence each must carry.
///
/// Script sigs and witnesses are left empty.
pub fn create_tx_ins(utxos: impl IntoIterator<Item = (OutPoint, Sequence)>) -> Vec<TxIn> {
    utxos
        .into_iter()
        .map(|(previous_output, sequence)| TxIn {
            previous_output,
            sequence,
            script_sig: ScriptBuf::default(),
            witness: Witness::new(),
        })
        .collect()
}

/// Create a list of [`TxOut`]'s based on pairs of scripts and corresponding amounts.
pub fn create_tx_outs(
    scripts_and_amounts: impl IntoIterator<Item = (ScriptBuf, Amount)>,
) -> Vec<TxOut> {
    scripts_and_amounts
        .into_iter()
        .map(|(script_pubkey, value)| TxOut {
            script_pubkey,
            value,
        })
        .collect()
}

/// Builds a witness from its stack elements.
pub fn build_witness<D>(elements: impl IntoIterator<Item = D>) -> Witness
where
    D: AsRef<[u8]>,
{
    let mut witness = Witness::new();
    elements.into_iter().for_each(|element| witness.push(element));

    witness
}

/// Finalizes a [`bitcoin::Psbt`] input with the given witness stack.
///
/// All fields that only matter before finalization are cleared as BIP-174 requires.
pub fn finalize_input<D>(input: &mut Input, witnesses: impl IntoIterator<Item = D>)
where
    D: AsRef<[u8]>,
{
    input.final_script_witness = Some(build_witness(witnesses));

    input.partial_sigs = BTreeMap::new();
    input.sighash_type = None;
    input.redeem_script = None;
    input.witness_script = None;
    input.bip32_derivation = BTreeMap::new();
}
