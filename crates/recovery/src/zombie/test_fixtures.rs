//! Two nodes sharing one zombie channel.

use bitcoin::{Address, Amount, Network, TxOut};
use lnrescue_key_deriv::KeyRing;
use lnrescue_primitives::{
    keys::{KeyFamily, KeyLocator},
    scripts::funding::multisig_script,
};
use lnrescue_test_utils::{
    bitcoin::{generate_address, generate_outpoint},
    channel::bip32_keyring,
};

use super::{files::ZombieChannel, prepare_keys, PreparedKeys, ZombieMatch, ZombieNode};

pub(super) const KEY_COUNT: u32 = 8;

pub(super) const CAPACITY: Amount = Amount::from_sat(1_000_000);

pub(super) struct ZombiePair {
    pub(super) ring1: KeyRing,
    pub(super) ring2: KeyRing,
    pub(super) zombie_match: ZombieMatch,
    pub(super) funding: TxOut,
    pub(super) addr1: String,
    pub(super) addr2: String,
}

impl ZombiePair {
    pub(super) fn new() -> Self {
        let ring1 = bip32_keyring(1);
        let ring2 = bip32_keyring(2);
        let node1 = ring1.node_pubkey().expect("node key");
        let node2 = ring2.node_pubkey().expect("node key");

        let funding_key = |ring: &KeyRing, peer, index| {
            ring.with_peer(peer)
                .derive_key_desc(KeyLocator::new(KeyFamily::MultiSig, index))
                .expect("derive")
                .pub_key
                .expect("derived key")
        };
        let script = multisig_script(&funding_key(&ring1, node2, 3), &funding_key(&ring2, node1, 5));
        let address = Address::p2wsh(&script, Network::Regtest);

        let zombie_match = ZombieMatch {
            node1: ZombieNode {
                pubkey: node1,
                contact: "node1@example.com".to_string(),
            },
            node2: ZombieNode {
                pubkey: node2,
                contact: "node2@example.com".to_string(),
            },
            channels: vec![ZombieChannel {
                short_channel_id: 750_000 << 40,
                chan_point: generate_outpoint(),
                address: address.to_string(),
                capacity: CAPACITY,
            }],
        };

        Self {
            ring1,
            ring2,
            zombie_match,
            funding: TxOut {
                value: CAPACITY,
                script_pubkey: script.to_p2wsh(),
            },
            addr1: generate_address(Network::Regtest).to_string(),
            addr2: generate_address(Network::Regtest).to_string(),
        }
    }

    pub(super) fn prepared(&self) -> (PreparedKeys, PreparedKeys) {
        (
            prepare_keys(&self.ring1, &self.zombie_match, &self.addr1, KEY_COUNT).expect("node1 keys"),
            prepare_keys(&self.ring2, &self.zombie_match, &self.addr2, KEY_COUNT).expect("node2 keys"),
        )
    }
}
