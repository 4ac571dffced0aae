//! The match file and JSON helpers for the files the parties exchange.

use std::{fs, path::Path, str::FromStr};

use bitcoin::{Amount, OutPoint};
use secp256k1::PublicKey;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::{RecoveryError, RecoveryResult};

/// One party of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZombieNode {
    /// The node identity key.
    pub pubkey: PublicKey,

    /// How to reach the node's operator.
    #[serde(default)]
    pub contact: String,
}

/// A channel between the two parties of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZombieChannel {
    /// The short channel id as announced in gossip.
    pub short_channel_id: u64,

    /// The funding outpoint.
    pub chan_point: OutPoint,

    /// The funding output's address.
    pub address: String,

    /// The channel capacity.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub capacity: Amount,
}

/// Two nodes that share channels neither of them can close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZombieMatch {
    /// The first node.
    pub node1: ZombieNode,

    /// The second node.
    pub node2: ZombieNode,

    /// Their shared channels.
    pub channels: Vec<ZombieChannel>,
}

/// Which side of a match a node is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// [`ZombieMatch::node1`].
    Node1,

    /// [`ZombieMatch::node2`].
    Node2,
}

impl NodeRole {
    /// The role of the other party.
    pub const fn other(self) -> Self {
        match self {
            NodeRole::Node1 => NodeRole::Node2,
            NodeRole::Node2 => NodeRole::Node1,
        }
    }
}

impl ZombieMatch {
    /// Finds the role of `node` in this match.
    pub fn role_of(&self, node: &PublicKey) -> RecoveryResult<NodeRole> {
        if self.node1.pubkey == self.node2.pubkey {
            return Err(RecoveryError::InconsistentMatch(
                "both nodes have the same key".to_string(),
            ));
        }

        if *node == self.node1.pubkey {
            Ok(NodeRole::Node1)
        } else if *node == self.node2.pubkey {
            Ok(NodeRole::Node2)
        } else {
            Err(RecoveryError::NotInMatch(*node))
        }
    }

    /// The node with `role`.
    pub const fn node(&self, role: NodeRole) -> &ZombieNode {
        match role {
            NodeRole::Node1 => &self.node1,
            NodeRole::Node2 => &self.node2,
        }
    }

    /// The only channel of the match. Offers close one channel at a time.
    pub fn single_channel(&self) -> RecoveryResult<&ZombieChannel> {
        match self.channels.as_slice() {
            [channel] => Ok(channel),
            channels => Err(RecoveryError::InconsistentMatch(format!(
                "expected exactly one channel, found {}",
                channels.len()
            ))),
        }
    }
}

impl FromStr for ZombieMatch {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Reads a JSON file.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> RecoveryResult<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| RecoveryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| RecoveryError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `value` as pretty JSON.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> RecoveryResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value).map_err(|source| RecoveryError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, json).map_err(|source| RecoveryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use lnrescue_test_utils::bitcoin::generate_keypair;

    use super::*;

    #[test]
    fn test_match_file_format() {
        let (_, node1) = generate_keypair();
        let (_, node2) = generate_keypair();
        let raw = format!(
            r#"{{
                "node1": {{"pubkey": "{node1}", "contact": "alice@example.com"}},
                "node2": {{"pubkey": "{node2}"}},
                "channels": [{{
                    "short_channel_id": 769652079079636992,
                    "chan_point": "0101010101010101010101010101010101010101010101010101010101010101:1",
                    "address": "bcrt1qexample",
                    "capacity": 250000
                }}]
            }}"#
        );

        let zombie: ZombieMatch = raw.parse().expect("valid match file");
        assert_eq!(zombie.node2.contact, "");
        assert_eq!(zombie.role_of(&node2).expect("member"), NodeRole::Node2);
        assert_eq!(zombie.node(NodeRole::Node2.other()).pubkey, node1);

        let channel = zombie.single_channel().expect("one channel");
        assert_eq!(channel.capacity, Amount::from_sat(250_000));
        assert_eq!(channel.chan_point.vout, 1);
    }

    #[test]
    fn test_stranger_not_in_match() {
        let (_, node1) = generate_keypair();
        let (_, node2) = generate_keypair();
        let (_, stranger) = generate_keypair();
        let zombie = ZombieMatch {
            node1: ZombieNode {
                pubkey: node1,
                contact: String::new(),
            },
            node2: ZombieNode {
                pubkey: node2,
                contact: String::new(),
            },
            channels: Vec::new(),
        };

        assert!(matches!(
            zombie.role_of(&stranger),
            Err(RecoveryError::NotInMatch(key)) if key == stranger
        ));
        assert!(zombie.single_channel().is_err());
    }
}
