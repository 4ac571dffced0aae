//! Serde helpers for fields that travel as hex strings in channel dumps and result files.

/// Hex-encoded consensus serialization of a [`bitcoin::Transaction`].
pub mod hex_tx {
    use bitcoin::{consensus, Transaction};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Serializes a transaction as consensus-encoded hex.
    pub fn serialize<S: Serializer>(tx: &Transaction, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&consensus::encode::serialize_hex(tx))
    }

    /// Deserializes a transaction from consensus-encoded hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Transaction, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        let bytes = hex::decode(hex_str).map_err(D::Error::custom)?;

        consensus::deserialize(&bytes).map_err(D::Error::custom)
    }
}

/// Hex-encoded DER serialization of an ECDSA signature without a sighash flag.
pub mod hex_der_sig {
    use secp256k1::ecdsa::Signature;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Serializes a signature as DER hex.
    pub fn serialize<S: Serializer>(sig: &Signature, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(sig.serialize_der()))
    }

    /// Deserializes a signature from DER hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Signature, D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        let bytes = hex::decode(hex_str).map_err(D::Error::custom)?;

        Signature::from_der(&bytes).map_err(D::Error::custom)
    }
}

/// Hex encoding for 32-byte values such as shachain roots.
pub mod hex_bytes32 {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    /// Serializes the bytes as lowercase hex.
    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserializes exactly 32 bytes from hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let hex_str = String::deserialize(deserializer)?;
        let mut out = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut out).map_err(D::Error::custom)?;

        Ok(out)
    }
}
