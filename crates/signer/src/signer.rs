//! Produces signatures for [`SignDescriptor`]s.

use bitcoin::{key::TapTweak, sighash::SighashCache, TapSighashType, Transaction, TxOut};
use lnrescue_key_deriv::KeyRing;
use lnrescue_primitives::tweak::{derive_revocation_priv_key, tweak_priv_key};
use secp256k1::{ecdsa, schnorr, Keypair, PublicKey, SecretKey, SECP256K1};
use tracing::debug;

use crate::{
    descriptor::{SignDescriptor, SignMethod, Tweak},
    errors::{SignerError, SignerResult},
    sighash::{create_key_spend_hash, create_script_spend_hash, create_segwit_v0_hash},
};

/// A signature without its sighash flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSignature {
    /// An ECDSA signature for a segwit v0 input.
    Ecdsa(ecdsa::Signature),

    /// A BIP-340 signature for a taproot input.
    Schnorr(schnorr::Signature),
}

impl RawSignature {
    /// Returns the ECDSA signature or an error for Schnorr signatures.
    pub fn ecdsa(self) -> SignerResult<ecdsa::Signature> {
        match self {
            RawSignature::Ecdsa(sig) => Ok(sig),
            RawSignature::Schnorr(_) => Err(SignerError::WrongSignatureKind { expected: "ecdsa" }),
        }
    }

    /// Returns the Schnorr signature or an error for ECDSA signatures.
    pub fn schnorr(self) -> SignerResult<schnorr::Signature> {
        match self {
            RawSignature::Schnorr(sig) => Ok(sig),
            RawSignature::Ecdsa(_) => Err(SignerError::WrongSignatureKind { expected: "schnorr" }),
        }
    }
}

/// Signs inputs with keys derived from a [`KeyRing`].
#[derive(Debug, Clone, Copy)]
pub struct Signer<'a> {
    keyring: &'a KeyRing,
}

impl<'a> Signer<'a> {
    /// Creates a signer backed by `keyring`.
    pub const fn new(keyring: &'a KeyRing) -> Self {
        Self { keyring }
    }

    /// Derives the private key of the descriptor and applies its tweak.
    pub fn signing_key(&self, desc: &SignDescriptor) -> SignerResult<SecretKey> {
        let base = self.keyring.priv_key_for_desc(&desc.key_desc)?;

        let key = match &desc.tweak {
            None => base,
            Some(Tweak::Single(tweak)) => tweak_priv_key(&base, tweak)?,
            Some(Tweak::Double(per_commitment_secret)) => {
                derive_revocation_priv_key(&base, per_commitment_secret)?
            }
        };

        Ok(key)
    }

    /// Returns the public key the descriptor signs for, after tweaking.
    pub fn signing_pubkey(&self, desc: &SignDescriptor) -> SignerResult<PublicKey> {
        Ok(self.signing_key(desc)?.public_key(SECP256K1))
    }

    /// Signs input `desc.input_index` of `tx`.
    ///
    /// `prevouts` are the outputs spent by *all* inputs of `tx`, in input order. The entry at
    /// `desc.input_index` must equal `desc.output`.
    pub fn sign_output_raw(
        &self,
        tx: &Transaction,
        desc: &SignDescriptor,
        prevouts: &[TxOut],
    ) -> SignerResult<RawSignature> {
        let input_index = desc.input_index;
        if input_index >= tx.input.len() {
            return Err(SignerError::InputOutOfRange(input_index));
        }
        if prevouts.len() != tx.input.len() || prevouts[input_index] != desc.output {
            return Err(SignerError::PrevOutMismatch(input_index));
        }

        if desc.sign_method == SignMethod::TaprootKeySpend && desc.tweak.is_some() {
            return Err(SignerError::TweakWithKeySpend);
        }

        let secret_key = self.signing_key(desc)?;
        let mut sighash_cache = SighashCache::new(tx);

        debug!(locator = %desc.key_desc.key_locator, input_index, method = ?desc.sign_method, "signing input");

        let signature = match desc.sign_method {
            SignMethod::WitnessV0 => {
                let message = create_segwit_v0_hash(
                    &mut sighash_cache,
                    &desc.output,
                    &desc.witness_script,
                    desc.hash_type,
                    input_index,
                )?;

                RawSignature::Ecdsa(SECP256K1.sign_ecdsa(&message, &secret_key))
            }
            SignMethod::TaprootKeySpend => {
                let message = create_key_spend_hash(
                    &mut sighash_cache,
                    prevouts,
                    TapSighashType::Default,
                    input_index,
                )?;
                let keypair = Keypair::from_secret_key(SECP256K1, &secret_key)
                    .tap_tweak(SECP256K1, desc.tap_tweak)
                    .to_keypair();

                RawSignature::Schnorr(SECP256K1.sign_schnorr(&message, &keypair))
            }
            SignMethod::TaprootScriptSpend => {
                let message = create_script_spend_hash(
                    &mut sighash_cache,
                    &desc.witness_script,
                    prevouts,
                    TapSighashType::Default,
                    input_index,
                )?;
                let keypair = Keypair::from_secret_key(SECP256K1, &secret_key);

                RawSignature::Schnorr(SECP256K1.sign_schnorr(&message, &keypair))
            }
        };

        Ok(signature)
    }
}
