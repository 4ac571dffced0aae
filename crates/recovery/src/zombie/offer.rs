//! Steps two and three of the protocol: making and signing the offer.

use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine};
use bitcoin::{ecdsa, psbt::Psbt, Amount, EcdsaSighashType, Sequence, Transaction, Weight};
use lnrescue_key_deriv::KeyRing;
use lnrescue_primitives::scripts::general::{
    create_tx, create_tx_ins, create_tx_outs, finalize_input,
};
use lnrescue_signer::{
    witness::{multisig_witness, verify_multisig_witness, verify_segwit_v0_signature},
    SignDescriptor, SignMethod, Signer,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    files::NodeRole,
    keys::{resolve_channel, PreparedKeys, ResolvedChannel},
};
use crate::{
    errors::{RecoveryError, RecoveryResult},
    sweep::{checked_output, fee_for_vsize},
};

/// Weight of the segwit marker and flag plus the finished 2-of-2 witness:
/// item count, empty element, two signatures of at most 73 bytes and the 71 byte script, each
/// with its length prefix.
const MULTISIG_WITNESS_WEIGHT: u64 = 2 + 1 + 1 + (1 + 73) * 2 + 1 + 71;

/// Who pays the fee of the closing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeePayer {
    /// The party making the offer.
    Maker,

    /// The party signing the offer.
    Taker,

    /// Both, with the odd satoshi paid by the maker.
    Even,
}

impl fmt::Display for FeePayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeePayer::Maker => "maker",
            FeePayer::Taker => "taker",
            FeePayer::Even => "even",
        })
    }
}

impl FromStr for FeePayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maker" => Ok(FeePayer::Maker),
            "taker" => Ok(FeePayer::Taker),
            "even" => Ok(FeePayer::Even),
            other => Err(format!("unknown fee payer {other}, expected maker, taker or even")),
        }
    }
}

/// What both parties agreed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferTerms {
    /// The maker's balance before fees. The taker gets the rest of the capacity.
    pub maker_amount: Amount,

    /// The fee rate in sat/vB.
    pub fee_rate: u64,

    /// Who pays the fee.
    pub fee_payer: FeePayer,
}

/// How far along an offer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferState {
    /// No signatures.
    Unsigned,

    /// The maker's signature only.
    PartiallySigned,

    /// The input is finalized.
    FullySigned,
}

/// A closing transaction in the making, exchanged as a base64 PSBT.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    psbt: Psbt,
}

impl Offer {
    /// Wraps a PSBT.
    pub const fn from_psbt(psbt: Psbt) -> Self {
        Self { psbt }
    }

    /// The underlying PSBT.
    pub const fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    /// The state of the single input.
    pub fn state(&self) -> OfferState {
        match self.psbt.inputs.first() {
            Some(input) if input.final_script_witness.is_some() => OfferState::FullySigned,
            Some(input) if !input.partial_sigs.is_empty() => OfferState::PartiallySigned,
            _ => OfferState::Unsigned,
        }
    }

    /// The standard base64 encoding of the PSBT.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.psbt.serialize())
    }

    /// Decodes a base64 PSBT.
    pub fn from_base64(encoded: &str) -> RecoveryResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| RecoveryError::Psbt(e.to_string()))?;
        let psbt = Psbt::deserialize(&bytes).map_err(|e| RecoveryError::Psbt(e.to_string()))?;

        Ok(Self { psbt })
    }

    /// The signed transaction of a fully signed offer.
    pub fn extract_tx(&self) -> RecoveryResult<Transaction> {
        if self.state() != OfferState::FullySigned {
            return Err(RecoveryError::Psbt("offer is not fully signed".to_string()));
        }

        self.psbt
            .clone()
            .extract_tx()
            .map_err(|e| RecoveryError::Psbt(e.to_string()))
    }
}

/// Builds the unsigned closing transaction. Both parties build the same one.
fn build_unsigned(
    resolved: &ResolvedChannel,
    maker: NodeRole,
    terms: &OfferTerms,
) -> RecoveryResult<Transaction> {
    let capacity = resolved.channel.capacity;
    let taker_amount = capacity.checked_sub(terms.maker_amount).ok_or_else(|| {
        RecoveryError::InsufficientFunds(format!(
            "maker amount {} exceeds capacity {capacity}",
            terms.maker_amount
        ))
    })?;

    let [node1_spk, node2_spk] = resolved.payout_scripts.clone();
    let mut tx = create_tx(
        create_tx_ins([(resolved.chan_point(), Sequence::MAX)]),
        create_tx_outs([(node1_spk, Amount::ZERO), (node2_spk, Amount::ZERO)]),
    );

    let vsize = (tx.weight() + Weight::from_wu(MULTISIG_WITNESS_WEIGHT)).to_vbytes_ceil();
    let fee = fee_for_vsize(terms.fee_rate, vsize)?;
    let (maker_fee, taker_fee) = match terms.fee_payer {
        FeePayer::Maker => (fee, Amount::ZERO),
        FeePayer::Taker => (Amount::ZERO, fee),
        FeePayer::Even => {
            let half = Amount::from_sat(fee.to_sat() / 2);
            (fee - half, half)
        }
    };

    let (maker_vout, taker_vout) = match maker {
        NodeRole::Node1 => (0, 1),
        NodeRole::Node2 => (1, 0),
    };
    tx.output[maker_vout].value = checked_output(
        terms.maker_amount,
        maker_fee,
        &tx.output[maker_vout].script_pubkey,
    )?;
    tx.output[taker_vout].value =
        checked_output(taker_amount, taker_fee, &tx.output[taker_vout].script_pubkey)?;

    Ok(tx)
}

fn funding_desc(resolved: &ResolvedChannel) -> SignDescriptor {
    SignDescriptor {
        key_desc: resolved.our_key,
        tweak: None,
        witness_script: resolved.witness_script.clone(),
        tap_tweak: None,
        output: resolved.funding_output(),
        hash_type: EcdsaSighashType::All,
        sign_method: SignMethod::WitnessV0,
        input_index: 0,
    }
}

fn sign_funding(
    resolved: &ResolvedChannel,
    tx: &Transaction,
) -> RecoveryResult<secp256k1::ecdsa::Signature> {
    let desc = funding_desc(resolved);

    Ok(Signer::new(&resolved.ring)
        .sign_output_raw(tx, &desc, &[desc.output.clone()])?
        .ecdsa()?)
}

/// Builds the closing transaction for the match both files refer to and signs it.
pub fn make_offer(
    ring: &KeyRing,
    ours: &PreparedKeys,
    theirs: &PreparedKeys,
    terms: &OfferTerms,
) -> RecoveryResult<Offer> {
    let resolved = resolve_channel(ring, ours, theirs)?;
    let tx = build_unsigned(&resolved, resolved.role, terms)?;

    let signature = sign_funding(&resolved, &tx)?;

    let mut psbt = Psbt::from_unsigned_tx(tx).map_err(|e| RecoveryError::Psbt(e.to_string()))?;
    let input = &mut psbt.inputs[0];
    input.witness_utxo = Some(resolved.funding_output());
    input.witness_script = Some(resolved.witness_script.clone());
    input.sighash_type = Some(EcdsaSighashType::All.into());
    input.partial_sigs.insert(
        bitcoin::PublicKey::new(resolved.our_key_pub()),
        ecdsa::Signature {
            signature,
            sighash_type: EcdsaSighashType::All,
        },
    );

    info!(chan_point = %resolved.chan_point(), fee_payer = %terms.fee_payer, "made offer");

    Ok(Offer { psbt })
}

fn invalid(reason: impl Into<String>) -> RecoveryError {
    RecoveryError::InvalidOffer(reason.into())
}

/// Checks an offer against what this node expects, countersigns and finalizes it.
///
/// Nothing is signed unless the offer pays exactly what `terms` say to the addresses in the
/// prepared keys files and carries a valid signature of the maker.
pub fn sign_offer(
    ring: &KeyRing,
    ours: &PreparedKeys,
    theirs: &PreparedKeys,
    offer: &Offer,
    terms: &OfferTerms,
) -> RecoveryResult<Offer> {
    if offer.state() != OfferState::PartiallySigned {
        return Err(invalid(format!("expected a partially signed offer, got {:?}", offer.state())));
    }

    let resolved = resolve_channel(ring, ours, theirs)?;
    let expected = build_unsigned(&resolved, resolved.role.other(), terms)?;
    let mut psbt = offer.psbt.clone();
    let tx = &psbt.unsigned_tx;

    if tx.input.len() != 1 || tx.input[0].previous_output != resolved.chan_point() {
        return Err(invalid("offer must spend only the funding outpoint"));
    }
    if tx.output.len() != expected.output.len() {
        return Err(invalid(format!("offer has {} outputs, expected 2", tx.output.len())));
    }
    for (vout, (got, want)) in tx.output.iter().zip(&expected.output).enumerate() {
        if got.script_pubkey != want.script_pubkey {
            return Err(invalid(format!("output {vout} pays the wrong address")));
        }
        if got.value != want.value {
            return Err(invalid(format!(
                "output {vout} pays {}, expected {}",
                got.value, want.value
            )));
        }
    }
    if *tx != expected {
        return Err(invalid("offer transaction differs from the expected one"));
    }

    let funding = resolved.funding_output();
    let input = &psbt.inputs[0];
    if input.witness_utxo.as_ref() != Some(&funding) {
        return Err(invalid("offer spends a different funding output"));
    }

    let their_sig = input
        .partial_sigs
        .get(&bitcoin::PublicKey::new(resolved.their_key))
        .ok_or_else(|| invalid("offer lacks the maker's signature"))?;
    if their_sig.sighash_type != EcdsaSighashType::All {
        return Err(invalid("maker's signature must use SIGHASH_ALL"));
    }
    let their_sig = their_sig.signature;
    verify_segwit_v0_signature(
        &expected,
        0,
        &funding,
        &resolved.witness_script,
        &resolved.their_key,
        &their_sig,
    )?;

    let our_sig = sign_funding(&resolved, &expected)?;
    let witness = multisig_witness(
        &resolved.witness_script,
        (resolved.our_key_pub(), our_sig),
        (resolved.their_key, their_sig),
    );

    let mut signed = expected;
    signed.input[0].witness = witness.clone();
    verify_multisig_witness(&signed, 0, &funding)?;

    finalize_input(&mut psbt.inputs[0], witness.iter());

    info!(chan_point = %resolved.chan_point(), txid = %signed.compute_txid(), "signed offer");

    Ok(Offer { psbt })
}

#[cfg(test)]
mod tests {
    use bitcoin::Network;
    use lnrescue_key_deriv::address::parse_address;

    use super::*;
    use crate::zombie::test_fixtures::{ZombiePair, CAPACITY};

    fn terms(fee_payer: FeePayer) -> OfferTerms {
        OfferTerms {
            maker_amount: Amount::from_sat(600_000),
            fee_rate: 5,
            fee_payer,
        }
    }

    /// The fee of `offer` at rate 5 once both signatures take their maximum 73 bytes.
    fn worst_case_fee(offer: &Offer) -> Amount {
        let witness_script = offer.psbt().inputs[0]
            .witness_script
            .as_ref()
            .expect("offer carries the funding script");
        let mut sized = offer.psbt().unsigned_tx.clone();
        sized.input[0].witness = bitcoin::Witness::from_slice(&[
            Vec::new(),
            vec![0u8; 73],
            vec![0u8; 73],
            witness_script.to_bytes(),
        ]);

        Amount::from_sat(5 * sized.weight().to_vbytes_ceil())
    }

    fn script_of(address: &str) -> bitcoin::ScriptBuf {
        parse_address(address, Network::Regtest)
            .expect("valid address")
            .script_pubkey()
    }

    #[test]
    fn test_end_to_end_recovery() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();
        let terms = terms(FeePayer::Even);

        let offer = make_offer(&pair.ring1, &keys1, &keys2, &terms).expect("make offer");
        assert_eq!(offer.state(), OfferState::PartiallySigned);

        let received = Offer::from_base64(&offer.to_base64()).expect("decode");
        assert_eq!(received, offer);

        let signed = sign_offer(&pair.ring2, &keys2, &keys1, &received, &terms).expect("sign");
        assert_eq!(signed.state(), OfferState::FullySigned);

        let tx = signed.extract_tx().expect("extract");
        verify_multisig_witness(&tx, 0, &pair.funding).expect("valid witness");

        let fee = worst_case_fee(&offer);
        let total: Amount = tx.output.iter().map(|out| out.value).sum();
        assert_eq!(CAPACITY - total, fee);
        assert!(fee.to_sat() >= 5 * tx.weight().to_vbytes_ceil());
        assert_eq!(tx.output[0].script_pubkey, script_of(&pair.addr1));
        assert_eq!(tx.output[1].script_pubkey, script_of(&pair.addr2));
    }

    #[test]
    fn test_fee_split_per_payer() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();
        let maker_amount = Amount::from_sat(600_000);
        let taker_amount = Amount::from_sat(400_000);

        for fee_payer in [FeePayer::Maker, FeePayer::Taker, FeePayer::Even] {
            let offer = make_offer(&pair.ring1, &keys1, &keys2, &terms(fee_payer)).expect("make");
            let fee = worst_case_fee(&offer);
            let outputs = &offer.psbt().unsigned_tx.output;

            let (maker_pays, taker_pays) = match fee_payer {
                FeePayer::Maker => (fee, Amount::ZERO),
                FeePayer::Taker => (Amount::ZERO, fee),
                FeePayer::Even => {
                    let taker_half = Amount::from_sat(fee.to_sat() / 2);
                    (fee - taker_half, taker_half)
                }
            };
            assert_eq!(outputs[0].value, maker_amount - maker_pays, "{fee_payer}");
            assert_eq!(outputs[1].value, taker_amount - taker_pays, "{fee_payer}");
        }
    }

    #[test]
    fn test_even_split_gives_odd_satoshi_to_maker() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();

        for fee_rate in [1, 2, 3] {
            let terms = OfferTerms {
                fee_rate,
                ..terms(FeePayer::Even)
            };
            let outputs = make_offer(&pair.ring1, &keys1, &keys2, &terms)
                .expect("make")
                .psbt()
                .unsigned_tx
                .output
                .clone();

            let maker_pays = Amount::from_sat(600_000) - outputs[0].value;
            let taker_pays = Amount::from_sat(400_000) - outputs[1].value;
            assert!(maker_pays == taker_pays || maker_pays == taker_pays + Amount::from_sat(1));
        }
    }

    #[test]
    fn test_fee_rate_overflow_rejected() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();
        let terms = OfferTerms {
            fee_rate: u64::MAX / 100,
            ..terms(FeePayer::Even)
        };

        let err = make_offer(&pair.ring1, &keys1, &keys2, &terms).expect_err("overflow");
        assert!(matches!(err, RecoveryError::FeeOverflow { .. }));

        let terms = OfferTerms {
            fee_rate: 10_000,
            ..terms
        };
        let err = make_offer(&pair.ring1, &keys1, &keys2, &terms).expect_err("fee above funds");
        assert!(matches!(err, RecoveryError::InsufficientFunds(_)));
    }

    #[test]
    fn test_node2_can_make_offer_and_outputs_keep_order() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();
        let terms = terms(FeePayer::Maker);

        let offer = make_offer(&pair.ring2, &keys2, &keys1, &terms).expect("make offer");
        let tx = sign_offer(&pair.ring1, &keys1, &keys2, &offer, &terms)
            .and_then(|signed| signed.extract_tx())
            .expect("sign");

        assert_eq!(tx.output[0].script_pubkey, script_of(&pair.addr1));
        assert_eq!(tx.output[0].value, Amount::from_sat(400_000));
        assert!(tx.output[1].value < Amount::from_sat(600_000));
    }

    #[test]
    fn test_make_offer_is_deterministic() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();
        let terms = terms(FeePayer::Taker);

        let first = make_offer(&pair.ring1, &keys1, &keys2, &terms).expect("make offer");
        let second = make_offer(&pair.ring1, &keys1, &keys2, &terms).expect("make offer");

        assert_eq!(first.psbt().unsigned_tx, second.psbt().unsigned_tx);
        assert_eq!(first.psbt().unsigned_tx.version, bitcoin::transaction::Version::TWO);
        assert_eq!(first.psbt().unsigned_tx.input[0].sequence, Sequence::MAX);
    }

    #[test]
    fn test_taker_rejects_different_split() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();

        let offer = make_offer(&pair.ring1, &keys1, &keys2, &terms(FeePayer::Even)).expect("make");
        let expected = OfferTerms {
            maker_amount: Amount::from_sat(500_000),
            ..terms(FeePayer::Even)
        };

        let err = sign_offer(&pair.ring2, &keys2, &keys1, &offer, &expected).expect_err("reject");
        assert!(matches!(err, RecoveryError::InvalidOffer(_)));
    }

    #[test]
    fn test_taker_rejects_redirected_output() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();
        let terms = terms(FeePayer::Even);

        let offer = make_offer(&pair.ring1, &keys1, &keys2, &terms).expect("make");
        let mut psbt = offer.psbt().clone();
        psbt.unsigned_tx.output[1].script_pubkey = script_of(&pair.addr1);
        let tampered = Offer::from_psbt(psbt);

        let err = sign_offer(&pair.ring2, &keys2, &keys1, &tampered, &terms).expect_err("reject");
        assert!(matches!(err, RecoveryError::InvalidOffer(reason) if reason.contains("wrong address")));
    }

    #[test]
    fn test_taker_rejects_unsigned_offer() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();
        let terms = terms(FeePayer::Even);

        let offer = make_offer(&pair.ring1, &keys1, &keys2, &terms).expect("make");
        let mut psbt = offer.psbt().clone();
        psbt.inputs[0].partial_sigs.clear();
        let unsigned = Offer::from_psbt(psbt);
        assert_eq!(unsigned.state(), OfferState::Unsigned);

        let err = sign_offer(&pair.ring2, &keys2, &keys1, &unsigned, &terms).expect_err("reject");
        assert!(matches!(err, RecoveryError::InvalidOffer(_)));
    }

    #[test]
    fn test_dust_output_rejected() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();
        let terms = OfferTerms {
            maker_amount: CAPACITY - Amount::from_sat(100),
            fee_rate: 1,
            fee_payer: FeePayer::Maker,
        };

        let err = make_offer(&pair.ring1, &keys1, &keys2, &terms).expect_err("dust");
        assert!(matches!(err, RecoveryError::Dust { .. }));
    }

    #[test]
    fn test_fee_payer_parsing() {
        assert_eq!("even".parse::<FeePayer>(), Ok(FeePayer::Even));
        assert_eq!(FeePayer::Taker.to_string(), "taker");
        assert!("both".parse::<FeePayer>().is_err());
    }
}
