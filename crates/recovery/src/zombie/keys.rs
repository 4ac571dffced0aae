//! Step one of the protocol: publishing candidate multisig keys.

use bitcoin::{OutPoint, ScriptBuf, TxOut};
use lnrescue_key_deriv::{address::parse_address, KeyRing};
use lnrescue_primitives::{
    keys::{KeyDescriptor, KeyFamily, KeyLocator},
    scripts::funding::multisig_script,
};
use secp256k1::{PublicKey, SECP256K1};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::files::{NodeRole, ZombieChannel, ZombieMatch};
use crate::errors::{RecoveryError, RecoveryResult};

/// How many multisig keys a party publishes unless told otherwise.
pub const DEFAULT_MULTISIG_KEY_COUNT: u32 = 2_500;

/// One party's candidate funding keys and payout address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedKeys {
    /// The match the keys were prepared for.
    #[serde(rename = "match")]
    pub zombie_match: ZombieMatch,

    /// The preparing node's identity key.
    pub node_pubkey: PublicKey,

    /// The public keys at indices `0..N` of the multisig family.
    pub multisig_keys: Vec<PublicKey>,

    /// Where the preparing node wants its share paid.
    pub payout_addr: String,
}

/// Derives the multisig key window of this node for `zombie_match`.
///
/// Running it twice with the same inputs produces the same keys.
pub fn prepare_keys(
    ring: &KeyRing,
    zombie_match: &ZombieMatch,
    payout_addr: &str,
    key_count: u32,
) -> RecoveryResult<PreparedKeys> {
    let node_pubkey = ring.node_pubkey()?;
    let role = zombie_match.role_of(&node_pubkey)?;
    let peer = zombie_match.node(role.other()).pubkey;

    let payout_addr = parse_address(payout_addr, ring.network())?;

    let channel_ring = ring.with_peer(peer);
    let multisig_keys = (0..key_count)
        .map(|index| {
            channel_ring
                .derive_priv_key(KeyLocator::new(KeyFamily::MultiSig, index))
                .map(|secret_key| secret_key.public_key(SECP256K1))
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!(%node_pubkey, ?role, keys = multisig_keys.len(), "prepared keys");

    Ok(PreparedKeys {
        zombie_match: zombie_match.clone(),
        node_pubkey,
        multisig_keys,
        payout_addr: payout_addr.to_string(),
    })
}

/// Both parties' view of the channel being closed.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedChannel {
    /// This node's side of the match.
    pub(crate) role: NodeRole,

    /// The channel.
    pub(crate) channel: ZombieChannel,

    /// This node's ring, bound to the peer.
    pub(crate) ring: KeyRing,

    /// This node's funding key.
    pub(crate) our_key: KeyDescriptor,

    /// The public half of [`Self::our_key`].
    pub(crate) our_pubkey: PublicKey,

    /// The peer's funding key.
    pub(crate) their_key: PublicKey,

    /// The 2-of-2 funding script.
    pub(crate) witness_script: ScriptBuf,

    /// The payout address of node1 and node2, in that order.
    pub(crate) payout_scripts: [ScriptBuf; 2],
}

impl ResolvedChannel {
    pub(crate) fn chan_point(&self) -> OutPoint {
        self.channel.chan_point
    }

    pub(crate) fn our_key_pub(&self) -> PublicKey {
        self.our_pubkey
    }

    pub(crate) fn funding_output(&self) -> TxOut {
        TxOut {
            value: self.channel.capacity,
            script_pubkey: self.witness_script.to_p2wsh(),
        }
    }
}

/// Checks both prepared key files against each other and finds the keys behind the channel.
pub(crate) fn resolve_channel(
    ring: &KeyRing,
    ours: &PreparedKeys,
    theirs: &PreparedKeys,
) -> RecoveryResult<ResolvedChannel> {
    let network = ring.network();
    if ours.zombie_match != theirs.zombie_match {
        return Err(RecoveryError::InconsistentMatch(
            "prepared keys refer to different matches".to_string(),
        ));
    }

    let node_pubkey = ring.node_pubkey()?;
    if ours.node_pubkey != node_pubkey {
        return Err(RecoveryError::InconsistentMatch(
            "own prepared keys belong to another node".to_string(),
        ));
    }

    let zombie_match = &ours.zombie_match;
    let role = zombie_match.role_of(&node_pubkey)?;
    if zombie_match.role_of(&theirs.node_pubkey)? != role.other() {
        return Err(RecoveryError::InconsistentMatch(
            "both prepared keys belong to the same node".to_string(),
        ));
    }

    let channel = zombie_match.single_channel()?.clone();
    let funding_spk = parse_address(&channel.address, network)?.script_pubkey();
    if !funding_spk.is_p2wsh() {
        return Err(RecoveryError::NoMatchingKeys {
            chan_point: channel.chan_point,
            address: channel.address,
        });
    }

    let (our_key, their_key, witness_script) = ours
        .multisig_keys
        .iter()
        .find_map(|ours| {
            theirs.multisig_keys.iter().find_map(|theirs| {
                let script = multisig_script(ours, theirs);
                (script.to_p2wsh() == funding_spk).then_some((*ours, *theirs, script))
            })
        })
        .ok_or_else(|| RecoveryError::NoMatchingKeys {
            chan_point: channel.chan_point,
            address: channel.address.clone(),
        })?;

    let ring = ring.with_peer(theirs.node_pubkey);
    let locator = ring.check_descriptor(&our_key, KeyFamily::MultiSig)?;
    debug!(chan_point = %channel.chan_point, %locator, "found funding keys");

    let address_script = |prepared: &PreparedKeys| -> RecoveryResult<ScriptBuf> {
        Ok(parse_address(&prepared.payout_addr, network)?.script_pubkey())
    };
    let (ours_spk, theirs_spk) = (address_script(ours)?, address_script(theirs)?);
    let payout_scripts = match role {
        NodeRole::Node1 => [ours_spk, theirs_spk],
        NodeRole::Node2 => [theirs_spk, ours_spk],
    };

    Ok(ResolvedChannel {
        role,
        channel,
        ring,
        our_key: KeyDescriptor::new(locator, our_key),
        our_pubkey: our_key,
        their_key,
        witness_script,
        payout_scripts,
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::Network;
    use lnrescue_test_utils::{bitcoin::generate_address, channel::bip32_keyring};

    use super::*;
    use crate::zombie::test_fixtures::{ZombiePair, KEY_COUNT};

    #[test]
    fn test_prepare_keys_is_deterministic() {
        let pair = ZombiePair::new();

        let first = prepare_keys(&pair.ring1, &pair.zombie_match, &pair.addr1, KEY_COUNT)
            .expect("prepare");
        let second = prepare_keys(&pair.ring1, &pair.zombie_match, &pair.addr1, KEY_COUNT)
            .expect("prepare");

        assert_eq!(first.multisig_keys.len(), KEY_COUNT as usize);
        assert_eq!(first.node_pubkey, pair.zombie_match.node1.pubkey);
        assert_eq!(
            serde_json::to_string(&first).expect("serialize"),
            serde_json::to_string(&second).expect("serialize")
        );
    }

    #[test]
    fn test_prepared_keys_file_format() {
        let pair = ZombiePair::new();
        let (keys1, _) = pair.prepared();

        let json = serde_json::to_value(&keys1).expect("serialize");
        assert!(json.get("match").is_some());
        assert_eq!(
            json["multisig_keys"][0],
            serde_json::Value::String(keys1.multisig_keys[0].to_string())
        );
        assert_eq!(json["payout_addr"], serde_json::Value::String(pair.addr1.clone()));
    }

    #[test]
    fn test_outsider_cannot_prepare() {
        let pair = ZombiePair::new();
        let outsider = bip32_keyring(3);

        let err = prepare_keys(&outsider, &pair.zombie_match, &pair.addr1, KEY_COUNT)
            .expect_err("not in match");
        assert!(matches!(err, RecoveryError::NotInMatch(_)));
    }

    #[test]
    fn test_payout_address_must_match_network() {
        let pair = ZombiePair::new();
        let mainnet = generate_address(Network::Bitcoin).to_string();

        let err = prepare_keys(&pair.ring1, &pair.zombie_match, &mainnet, KEY_COUNT)
            .expect_err("wrong network");
        assert!(matches!(err, RecoveryError::Derivation(_)));
    }

    #[test]
    fn test_resolve_finds_funding_keys() {
        let pair = ZombiePair::new();
        let (keys1, keys2) = pair.prepared();

        let resolved = resolve_channel(&pair.ring1, &keys1, &keys2).expect("resolve");
        assert_eq!(resolved.role, NodeRole::Node1);
        assert_eq!(resolved.our_key.key_locator, KeyLocator::new(KeyFamily::MultiSig, 3));
        assert_eq!(resolved.their_key, keys2.multisig_keys[5]);
        assert_eq!(resolved.funding_output(), pair.funding);

        let resolved = resolve_channel(&pair.ring2, &keys2, &keys1).expect("resolve");
        assert_eq!(resolved.role, NodeRole::Node2);
        assert_eq!(resolved.our_key.key_locator, KeyLocator::new(KeyFamily::MultiSig, 5));
    }

    #[test]
    fn test_resolve_rejects_unknown_address() {
        let pair = ZombiePair::new();
        let (mut keys1, mut keys2) = pair.prepared();
        let other = generate_address(Network::Regtest).to_string();
        keys1.zombie_match.channels[0].address = other.clone();
        keys2.zombie_match.channels[0].address = other;

        let err = resolve_channel(&pair.ring1, &keys1, &keys2).expect_err("no keys");
        assert!(matches!(err, RecoveryError::NoMatchingKeys { .. }));
    }

    #[test]
    fn test_resolve_rejects_different_matches() {
        let pair = ZombiePair::new();
        let (keys1, mut keys2) = pair.prepared();
        keys2.zombie_match.node1.contact = "someone else".to_string();

        let err = resolve_channel(&pair.ring1, &keys1, &keys2).expect_err("different matches");
        assert!(matches!(err, RecoveryError::InconsistentMatch(_)));
    }
}
