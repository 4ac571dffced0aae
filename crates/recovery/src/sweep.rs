//! Sweeps the time-locked to-local outputs of published force closes.
//!
//! The inputs come from [`ForceCloseSummary`] records. Every to-local output that is on chain,
//! unspent, and whose delay key this wallet controls is spent in a single transaction paying
//! the sweep address.

use bitcoin::{
    taproot::ControlBlock, Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxOut,
    Txid, Witness,
};
use lnrescue_chain::{ChainClient, ChainError};
use lnrescue_key_deriv::KeyRing;
use lnrescue_primitives::{
    keys::{KeyDescriptor, KeyFamily},
    scripts::{
        commitment::to_local_script,
        general::{build_witness, create_tx, create_tx_ins, create_tx_outs},
        taproot::taproot_to_local,
    },
    tweak::{derive_revocation_pub_key, tweak_pub_key},
};
use lnrescue_signer::{
    descriptor::{leaf_control_block, taproot_to_local_sweep_desc, to_local_sweep_desc},
    witness::{taproot_script_witness, to_local_sweep_witness},
    SignDescriptor, Signer,
};
use tracing::{debug, info, warn};

use crate::{
    commitment::channel_ring,
    errors::{RecoveryError, RecoveryResult},
    force_close::SkippedChannel,
    summary::{ForceCloseSummary, OutputSummary},
};

/// Size of the placeholder ECDSA signature used for fee estimation, flag included.
const MAX_ECDSA_SIG_LEN: usize = 73;

/// Size of a BIP-340 signature with the default sighash.
const SCHNORR_SIG_LEN: usize = 64;

/// Where the swept funds go and what they pay for it.
#[derive(Debug, Clone)]
pub struct SweepParams {
    /// The address receiving the funds.
    pub sweep_addr: Address,

    /// The fee rate in sat/vB.
    pub fee_rate: u64,
}

#[derive(Debug, Clone)]
enum SpendPath {
    WitnessV0,
    Taproot(ControlBlock),
}

#[derive(Debug, Clone)]
struct SweepInput {
    outpoint: OutPoint,
    csv_delay: u16,
    ring: KeyRing,
    desc: SignDescriptor,
    path: SpendPath,
}

impl SweepInput {
    fn witness(&self, signature: Vec<u8>) -> Witness {
        match &self.path {
            SpendPath::WitnessV0 => build_witness([
                signature,
                Vec::new(),
                self.desc.witness_script.to_bytes(),
            ]),
            SpendPath::Taproot(control_block) => build_witness([
                signature,
                self.desc.witness_script.to_bytes(),
                control_block.serialize(),
            ]),
        }
    }

    fn placeholder_witness(&self) -> Witness {
        let len = match self.path {
            SpendPath::WitnessV0 => MAX_ECDSA_SIG_LEN,
            SpendPath::Taproot(_) => SCHNORR_SIG_LEN,
        };

        self.witness(vec![0; len])
    }
}

/// The signed sweep transaction.
#[derive(Debug, Clone)]
pub struct SweepResult {
    /// The transaction, ready for broadcast.
    pub tx: Transaction,

    /// The to-local outputs it spends.
    pub swept: Vec<OutPoint>,

    /// Channels whose to-local output could not be swept.
    pub skipped: Vec<SkippedChannel>,

    /// The sum of the swept outputs.
    pub total_in: Amount,

    /// The fee paid.
    pub fee: Amount,
}

/// Builds sweep transactions for to-local outputs.
#[derive(Debug, Clone, Copy)]
pub struct SweepEngine<'a> {
    keyring: &'a KeyRing,
    chain: &'a dyn ChainClient,
}

impl<'a> SweepEngine<'a> {
    /// Creates an engine deriving keys from `keyring` and querying `chain`.
    pub const fn new(keyring: &'a KeyRing, chain: &'a dyn ChainClient) -> Self {
        Self { keyring, chain }
    }

    fn prepare_input(
        &self,
        summary: &ForceCloseSummary,
        to_local: &OutputSummary,
        input_index: usize,
    ) -> RecoveryResult<Option<SweepInput>> {
        let chan_point = summary.chan_point;
        let outpoint = OutPoint::new(summary.txid, to_local.vout);

        let chain_tx = match self.chain.fetch_transaction(&summary.txid) {
            Ok(chain_tx) => chain_tx,
            Err(ChainError::NotFound(_)) => {
                info!(%chan_point, txid = %summary.txid, "commitment not published, skipping");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        if chain_tx
            .spend_status(to_local.vout)
            .is_some_and(|status| status.is_spent())
        {
            info!(%chan_point, %outpoint, "to-local output already spent, skipping");
            return Ok(None);
        }

        let on_chain = chain_tx.outputs().get(to_local.vout as usize);
        if on_chain.map(|out| (&out.script_pubkey, out.value))
            != Some((&to_local.script_pubkey, to_local.value))
        {
            return Err(RecoveryError::OutputMismatch {
                chan_point,
                vout: to_local.vout,
            });
        }

        let ring = channel_ring(self.keyring, summary.remote_node_pub);
        let locator = ring.check_descriptor(&summary.delay_base_point, KeyFamily::DelayBase)?;
        let delay_base = KeyDescriptor::new(locator, summary.delay_base_point);

        let delayed_key = tweak_pub_key(&summary.delay_base_point, &summary.commit_point)?;
        let revocation_key =
            derive_revocation_pub_key(&summary.remote_revocation_base_point, &summary.commit_point)?;

        let (desc, path) = if summary.chan_type.is_taproot() {
            let tree = taproot_to_local(&delayed_key, &revocation_key, summary.csv_delay)?;
            let desc = taproot_to_local_sweep_desc(
                delay_base,
                &summary.delay_base_point,
                &summary.commit_point,
                &tree.output.spend_info,
                tree.delay_leaf,
                to_local.value,
                input_index,
            );
            let control_block = leaf_control_block(&tree.output.spend_info, &desc)?;

            (desc, SpendPath::Taproot(control_block))
        } else {
            let script = to_local_script(&revocation_key, &delayed_key, summary.csv_delay);
            let desc = to_local_sweep_desc(
                delay_base,
                &summary.delay_base_point,
                &summary.commit_point,
                script,
                to_local.value,
                input_index,
            );

            (desc, SpendPath::WitnessV0)
        };

        if desc.output.script_pubkey != to_local.script_pubkey {
            return Err(RecoveryError::OutputMismatch {
                chan_point,
                vout: to_local.vout,
            });
        }

        debug!(%chan_point, %outpoint, %locator, "prepared to-local input");

        Ok(Some(SweepInput {
            outpoint,
            csv_delay: summary.csv_delay,
            ring,
            desc,
            path,
        }))
    }

    /// Builds and signs a transaction sweeping every eligible to-local output in `summaries`.
    pub fn build(
        &self,
        summaries: &[ForceCloseSummary],
        params: &SweepParams,
    ) -> RecoveryResult<SweepResult> {
        let mut inputs = Vec::new();
        let mut skipped = Vec::new();

        for summary in summaries {
            let Some(to_local) = &summary.to_local else {
                debug!(chan_point = %summary.chan_point, "no to-local output");
                continue;
            };

            match self.prepare_input(summary, to_local, inputs.len()) {
                Ok(Some(input)) => inputs.push(input),
                Ok(None) => {}
                Err(err) if err.is_item_error() => {
                    warn!(chan_point = %summary.chan_point, %err, "cannot sweep to-local output");
                    skipped.push(SkippedChannel {
                        chan_point: summary.chan_point,
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        if inputs.is_empty() {
            return Err(RecoveryError::NothingToDo(
                "no unspent to-local outputs".to_string(),
            ));
        }

        let total_in = inputs
            .iter()
            .map(|input| input.desc.output.value)
            .sum::<Amount>();
        let sweep_script = params.sweep_addr.script_pubkey();

        let mut tx = create_tx(
            create_tx_ins(inputs.iter().map(|input| {
                (input.outpoint, Sequence::from_height(input.csv_delay))
            })),
            create_tx_outs([(sweep_script.clone(), total_in)]),
        );

        let fee = estimate_fee(&tx, &inputs, params.fee_rate)?;
        tx.output[0].value = checked_output(total_in, fee, &sweep_script)?;

        let prevouts: Vec<TxOut> = inputs.iter().map(|input| input.desc.output.clone()).collect();
        let mut witnesses = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let signature = Signer::new(&input.ring).sign_output_raw(&tx, &input.desc, &prevouts)?;
            let witness = match input.path {
                SpendPath::WitnessV0 => {
                    to_local_sweep_witness(signature.ecdsa()?, &input.desc.witness_script)
                }
                SpendPath::Taproot(ref control_block) => taproot_script_witness(
                    signature.schnorr()?,
                    &input.desc.witness_script,
                    control_block,
                ),
            };
            witnesses.push(witness);
        }
        for (txin, witness) in tx.input.iter_mut().zip(witnesses) {
            txin.witness = witness;
        }

        info!(inputs = inputs.len(), %total_in, %fee, txid = %tx.compute_txid(), "built sweep");

        Ok(SweepResult {
            swept: inputs.iter().map(|input| input.outpoint).collect(),
            tx,
            skipped,
            total_in,
            fee,
        })
    }

    /// Broadcasts a sweep transaction.
    pub fn publish(&self, tx: &Transaction) -> RecoveryResult<Txid> {
        Ok(self.chain.broadcast(tx)?)
    }
}

/// `fee_rate` times the virtual size of `tx` once every input carries its largest witness.
fn estimate_fee(tx: &Transaction, inputs: &[SweepInput], fee_rate: u64) -> RecoveryResult<Amount> {
    let mut sized = tx.clone();
    for (txin, input) in sized.input.iter_mut().zip(inputs) {
        txin.witness = input.placeholder_witness();
    }

    fee_for_vsize(fee_rate, sized.weight().to_vbytes_ceil())
}

/// `fee_rate` sat/vB over `vsize` virtual bytes.
pub(crate) fn fee_for_vsize(fee_rate: u64, vsize: u64) -> RecoveryResult<Amount> {
    fee_rate
        .checked_mul(vsize)
        .map(Amount::from_sat)
        .ok_or(RecoveryError::FeeOverflow { fee_rate, vsize })
}

/// `total - fee`, if that is spendable by `script`.
pub(crate) fn checked_output(
    total: Amount,
    fee: Amount,
    script: &ScriptBuf,
) -> RecoveryResult<Amount> {
    let value = total
        .checked_sub(fee)
        .ok_or_else(|| RecoveryError::InsufficientFunds(format!("{total} cannot pay fee {fee}")))?;

    let limit = script.minimal_non_dust();
    if value < limit {
        return Err(RecoveryError::Dust {
            amount: value,
            limit,
        });
    }

    Ok(value)
}
