//! Segwit v0 commitment output scripts and the keys they commit to.

use bitcoin::{
    opcodes::all::{
        OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_CSV, OP_DROP, OP_ELSE, OP_ENDIF, OP_IF, OP_IFDUP,
        OP_NOTIF, OP_PUSHNUM_1, OP_PUSHNUM_16,
    },
    script::Builder,
    CompressedPublicKey, ScriptBuf, Transaction,
};
use secp256k1::PublicKey;

use crate::{
    channel::{ChannelConfig, ChannelType},
    errors::{ScriptError, ScriptResult},
    tweak::{derive_revocation_pub_key, tweak_pub_key},
};

fn push_key(builder: Builder, key: &PublicKey) -> Builder {
    builder.push_key(&bitcoin::PublicKey::new(*key))
}

/// Creates the to-local script of a commitment transaction:
///
/// ```text
/// OP_IF
///     <revocation_key>
/// OP_ELSE
///     <csv_delay> OP_CSV OP_DROP
///     <delayed_key>
/// OP_ENDIF
/// OP_CHECKSIG
/// ```
pub fn to_local_script(revocation_key: &PublicKey, delayed_key: &PublicKey, csv_delay: u16) -> ScriptBuf {
    let builder = push_key(Builder::new().push_opcode(OP_IF), revocation_key)
        .push_opcode(OP_ELSE)
        .push_int(i64::from(csv_delay))
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP);

    push_key(builder, delayed_key)
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Creates the anchors to-remote script `<key> OP_CHECKSIGVERIFY OP_1 OP_CSV`.
pub fn to_remote_anchor_script(remote_key: &PublicKey) -> ScriptBuf {
    push_key(Builder::new(), remote_key)
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_opcode(OP_PUSHNUM_1)
        .push_opcode(OP_CSV)
        .into_script()
}

/// Creates the anchor output script
/// `<funding_key> OP_CHECKSIG OP_IFDUP OP_NOTIF OP_16 OP_CSV OP_ENDIF`.
pub fn anchor_script(funding_key: &PublicKey) -> ScriptBuf {
    push_key(Builder::new(), funding_key)
        .push_opcode(OP_CHECKSIG)
        .push_opcode(OP_IFDUP)
        .push_opcode(OP_NOTIF)
        .push_opcode(OP_PUSHNUM_16)
        .push_opcode(OP_CSV)
        .push_opcode(OP_ENDIF)
        .into_script()
}

/// The script of a commitment output and, for P2WSH outputs, its witness script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutputScript {
    /// The script needed to spend a P2WSH output.
    pub witness_script: Option<ScriptBuf>,

    /// The output's script pubkey.
    pub script_pubkey: ScriptBuf,
}

impl CommitOutputScript {
    /// Wraps a witness script into its P2WSH output.
    pub fn p2wsh(witness_script: ScriptBuf) -> Self {
        Self {
            script_pubkey: witness_script.to_p2wsh(),
            witness_script: Some(witness_script),
        }
    }

    /// Creates a P2WPKH output paying `key`.
    pub fn p2wpkh(key: &PublicKey) -> Self {
        Self {
            witness_script: None,
            script_pubkey: ScriptBuf::new_p2wpkh(&CompressedPublicKey(*key).wpubkey_hash()),
        }
    }
}

/// Builds the to-remote output for the given channel type.
pub fn to_remote_output(chan_type: ChannelType, remote_key: &PublicKey) -> CommitOutputScript {
    if chan_type.has_anchors() {
        CommitOutputScript::p2wsh(to_remote_anchor_script(remote_key))
    } else {
        CommitOutputScript::p2wpkh(remote_key)
    }
}

/// The keys of the local commitment transaction at one commitment height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitmentKeys {
    /// The per-commitment point of this commitment.
    pub commit_point: PublicKey,

    /// Key that can sweep the to-local output after the CSV delay.
    pub to_local_key: PublicKey,

    /// Key that can sweep the to-local output immediately if this commitment was revoked.
    pub revocation_key: PublicKey,

    /// Key paid by the to-remote output.
    pub to_remote_key: PublicKey,
}

impl CommitmentKeys {
    /// Derives the keys of the local commitment with per-commitment point `commit_point`.
    pub fn for_local_commitment(
        chan_type: ChannelType,
        local_cfg: &ChannelConfig,
        remote_cfg: &ChannelConfig,
        commit_point: PublicKey,
    ) -> ScriptResult<Self> {
        let local_delay_base = required_key(local_cfg.delay_base_point.pub_key, "local delay")?;
        let remote_revocation_base =
            required_key(remote_cfg.revocation_base_point.pub_key, "remote revocation")?;
        let remote_payment_base =
            required_key(remote_cfg.payment_base_point.pub_key, "remote payment")?;

        let to_remote_key = if chan_type.is_tweakless() {
            remote_payment_base
        } else {
            tweak_pub_key(&remote_payment_base, &commit_point)?
        };

        Ok(Self {
            commit_point,
            to_local_key: tweak_pub_key(&local_delay_base, &commit_point)?,
            revocation_key: derive_revocation_pub_key(&remote_revocation_base, &commit_point)?,
            to_remote_key,
        })
    }
}

fn required_key(key: Option<PublicKey>, which: &'static str) -> ScriptResult<PublicKey> {
    key.ok_or(ScriptError::MissingBasePoint(which))
}

/// Returns the index of the first output paying `script_pubkey`.
pub fn find_output(tx: &Transaction, script_pubkey: &ScriptBuf) -> Option<u32> {
    tx.output
        .iter()
        .position(|out| &out.script_pubkey == script_pubkey)
        .and_then(|vout| u32::try_from(vout).ok())
}

#[cfg(test)]
mod tests {
    use secp256k1::{SecretKey, SECP256K1};

    use super::*;

    fn key(byte: u8) -> PublicKey {
        SecretKey::from_slice(&[byte; 32])
            .expect("valid secret")
            .public_key(SECP256K1)
    }

    #[test]
    fn test_to_local_script_layout() {
        let script = to_local_script(&key(1), &key(2), 144);
        let bytes = script.as_bytes();

        assert_eq!(bytes.len(), 1 + 34 + 1 + 3 + 2 + 34 + 2);
        assert_eq!(bytes[0], OP_IF.to_u8());
        assert_eq!(&bytes[1..35], &[&[33u8][..], &key(1).serialize()[..]].concat()[..]);
        // 144 needs a sign byte as a script number.
        assert_eq!(&bytes[35..41], &[OP_ELSE.to_u8(), 0x02, 0x90, 0x00, OP_CSV.to_u8(), OP_DROP.to_u8()]);
        assert_eq!(&bytes[75..], &[OP_ENDIF.to_u8(), OP_CHECKSIG.to_u8()]);
    }

    #[test]
    fn test_to_remote_output_variants() {
        let remote = key(3);

        let legacy = to_remote_output(ChannelType::TWEAKLESS, &remote);
        assert!(legacy.script_pubkey.is_p2wpkh());
        assert!(legacy.witness_script.is_none());

        let anchors = to_remote_output(ChannelType::TWEAKLESS | ChannelType::ANCHOR_OUTPUTS, &remote);
        assert!(anchors.script_pubkey.is_p2wsh());
        assert_eq!(
            anchors.witness_script.expect("anchors use p2wsh"),
            to_remote_anchor_script(&remote)
        );
    }

    #[test]
    fn test_anchor_script_layout() {
        let script = anchor_script(&key(4));

        assert_eq!(
            &script.as_bytes()[34..],
            &[
                OP_CHECKSIG.to_u8(),
                OP_IFDUP.to_u8(),
                OP_NOTIF.to_u8(),
                OP_PUSHNUM_16.to_u8(),
                OP_CSV.to_u8(),
                OP_ENDIF.to_u8()
            ]
        );
    }
}
