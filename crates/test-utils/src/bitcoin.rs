//! Module to generate arbitrary values for testing.

use bitcoin::{hashes::Hash, Address, CompressedPublicKey, Network, OutPoint, Txid};
use rand::{thread_rng, Rng};
use secp256k1::{PublicKey, SecretKey, SECP256K1};

/// Generates a random transaction ID.
pub fn generate_txid() -> Txid {
    let mut txid = [0u8; 32];
    thread_rng().fill(&mut txid);

    Txid::from_byte_array(txid)
}

/// Generates a random outpoint.
pub fn generate_outpoint() -> OutPoint {
    OutPoint {
        txid: generate_txid(),
        vout: thread_rng().gen_range(0..4),
    }
}

/// Generates a random key pair.
pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let secret_key = SecretKey::new(&mut thread_rng());

    (secret_key, secret_key.public_key(SECP256K1))
}

/// Generates a random P2WPKH address on `network`.
pub fn generate_address(network: Network) -> Address {
    let (_, pubkey) = generate_keypair();

    Address::p2wpkh(&CompressedPublicKey(pubkey), network)
}
