//! Address and key export helpers.

use std::str::FromStr;

use bitcoin::{Address, CompressedPublicKey, Network, PrivateKey};
use secp256k1::{PublicKey, SecretKey};

use crate::{
    descriptor::add_checksum,
    errors::{DerivationError, DerivationResult},
};

/// Generate a P2WPKH address paying `pubkey`.
#[must_use]
pub fn p2wpkh_address(pubkey: &PublicKey, network: Network) -> Address {
    Address::p2wpkh(&CompressedPublicKey(*pubkey), network)
}

/// Parses an address and checks that it belongs to `network`.
pub fn parse_address(address: &str, network: Network) -> DerivationResult<Address> {
    let invalid = |reason: String| DerivationError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    Address::from_str(address.trim())
        .map_err(|e| invalid(e.to_string()))?
        .require_network(network)
        .map_err(|e| invalid(e.to_string()))
}

/// Encodes a private key in wallet import format.
pub fn to_wif(secret_key: SecretKey, network: Network) -> String {
    PrivateKey::new(secret_key, network).to_wif()
}

/// The importable `wpkh(<wif>)#<checksum>` descriptor of a private key.
pub fn wpkh_descriptor(secret_key: SecretKey, network: Network) -> DerivationResult<String> {
    add_checksum(&format!("wpkh({})", to_wif(secret_key, network)))
}

#[cfg(test)]
mod tests {
    use secp256k1::SECP256K1;

    use super::*;
    use crate::descriptor::verify_checksum;

    #[test]
    fn test_parse_address_checks_network() {
        let pubkey = SecretKey::from_slice(&[1u8; 32])
            .expect("valid")
            .public_key(SECP256K1);
        let address = p2wpkh_address(&pubkey, Network::Regtest).to_string();

        assert!(parse_address(&address, Network::Regtest).is_ok());
        assert!(matches!(
            parse_address(&address, Network::Bitcoin),
            Err(DerivationError::InvalidAddress { .. })
        ));
        assert!(parse_address("not-an-address", Network::Regtest).is_err());
    }

    #[test]
    fn test_wpkh_descriptor_has_valid_checksum() {
        let secret_key = SecretKey::from_slice(&[2u8; 32]).expect("valid");
        let descriptor = wpkh_descriptor(secret_key, Network::Testnet).expect("valid");

        let inner = verify_checksum(&descriptor).expect("checksum must verify");
        assert!(inner.starts_with("wpkh(c"));
    }
}
