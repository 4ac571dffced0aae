//! Per-commitment key tweaks.
//!
//! Every commitment transaction uses keys derived from a static base point and the
//! per-commitment point of that commitment:
//!
//! * single tweak: `k' = k + SHA256(per_commitment_point || base_point)`,
//! * revocation (double) tweak:
//!   `k' = k_rb * SHA256(R || P) + k_pc * SHA256(P || R)` where `R` is the revocation base point
//!   and `P` the per-commitment point.

use bitcoin::hashes::{sha256, Hash, HashEngine};
use secp256k1::{PublicKey, Scalar, SecretKey, SECP256K1};

use crate::errors::{ScriptError, ScriptResult};

fn hash_points(first: &PublicKey, second: &PublicKey) -> [u8; 32] {
    let mut engine = sha256::Hash::engine();
    engine.input(&first.serialize());
    engine.input(&second.serialize());

    sha256::Hash::from_engine(engine).to_byte_array()
}

fn to_scalar(bytes: [u8; 32]) -> ScriptResult<Scalar> {
    Scalar::from_be_bytes(bytes).map_err(|_| ScriptError::Tweak(secp256k1::Error::InvalidTweak))
}

/// Computes the single-tweak scalar `SHA256(per_commitment_point || base_point)`.
pub fn single_tweak_bytes(per_commitment_point: &PublicKey, base_point: &PublicKey) -> [u8; 32] {
    hash_points(per_commitment_point, base_point)
}

/// Tweaks a base point: `base_point + SHA256(per_commitment_point || base_point) * G`.
pub fn tweak_pub_key(base_point: &PublicKey, per_commitment_point: &PublicKey) -> ScriptResult<PublicKey> {
    let tweak = to_scalar(single_tweak_bytes(per_commitment_point, base_point))?;

    Ok(base_point.add_exp_tweak(SECP256K1, &tweak)?)
}

/// Tweaks a base secret with a precomputed single tweak.
pub fn tweak_priv_key(base_secret: &SecretKey, single_tweak: &[u8; 32]) -> ScriptResult<SecretKey> {
    let tweak = to_scalar(*single_tweak)?;

    Ok(base_secret.add_tweak(&tweak)?)
}

/// Computes the public revocation key from the remote revocation base point and the local
/// per-commitment point.
pub fn derive_revocation_pub_key(
    revocation_base_point: &PublicKey,
    per_commitment_point: &PublicKey,
) -> ScriptResult<PublicKey> {
    let rb_tweak = to_scalar(hash_points(revocation_base_point, per_commitment_point))?;
    let pc_tweak = to_scalar(hash_points(per_commitment_point, revocation_base_point))?;

    let rb_part = revocation_base_point.mul_tweak(SECP256K1, &rb_tweak)?;
    let pc_part = per_commitment_point.mul_tweak(SECP256K1, &pc_tweak)?;

    Ok(rb_part.combine(&pc_part)?)
}

/// Computes the revocation private key once the per-commitment secret has been revealed.
pub fn derive_revocation_priv_key(
    revocation_base_secret: &SecretKey,
    per_commitment_secret: &SecretKey,
) -> ScriptResult<SecretKey> {
    let revocation_base_point = revocation_base_secret.public_key(SECP256K1);
    let per_commitment_point = per_commitment_secret.public_key(SECP256K1);

    let rb_tweak = to_scalar(hash_points(&revocation_base_point, &per_commitment_point))?;
    let pc_tweak = to_scalar(hash_points(&per_commitment_point, &revocation_base_point))?;

    let rb_part = revocation_base_secret.mul_tweak(&rb_tweak)?;
    let pc_part = per_commitment_secret.mul_tweak(&pc_tweak)?;

    Ok(rb_part.add_tweak(&Scalar::from(pc_part))?)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn base_secret() -> SecretKey {
        let bytes: Vec<u8> = (0u8..32).collect();
        SecretKey::from_slice(&bytes).expect("valid secret")
    }

    fn per_commitment_secret() -> SecretKey {
        let bytes: Vec<u8> = (0u8..32).rev().collect();
        SecretKey::from_slice(&bytes).expect("valid secret")
    }

    #[test]
    fn test_single_tweak_bolt3_vectors() {
        let base_point = base_secret().public_key(SECP256K1);
        let per_commitment_point = per_commitment_secret().public_key(SECP256K1);

        assert_eq!(
            base_point.to_string(),
            "036d6caac248af96f6afa7f904f550253a0f3ef3f5aa2fe6838a95b216691468e2"
        );
        assert_eq!(
            per_commitment_point.to_string(),
            "025f7117a78150fe2ef97db7cfc83bd57b2e2c0d0dd25eaf467a4a1c2a45ce1486"
        );

        let local_pubkey = tweak_pub_key(&base_point, &per_commitment_point).expect("must tweak");
        assert_eq!(
            local_pubkey,
            PublicKey::from_str(
                "0235f2dbfaa89b57ec7b055afe29849ef7ddfeb1cefdb9ebdc43f5494984db29e5"
            )
            .expect("valid key")
        );

        let tweak = single_tweak_bytes(&per_commitment_point, &base_point);
        let local_privkey = tweak_priv_key(&base_secret(), &tweak).expect("must tweak");
        assert_eq!(
            hex::encode(local_privkey.secret_bytes()),
            "cbced912d3b21bf196a766651e436aff192362621ce317704ea2f75d87e7be0f"
        );
        assert_eq!(local_privkey.public_key(SECP256K1), local_pubkey);
    }

    #[test]
    fn test_revocation_bolt3_vectors() {
        let revocation_base_point = base_secret().public_key(SECP256K1);
        let per_commitment_point = per_commitment_secret().public_key(SECP256K1);

        let revocation_pubkey =
            derive_revocation_pub_key(&revocation_base_point, &per_commitment_point)
                .expect("must derive");
        assert_eq!(
            revocation_pubkey.to_string(),
            "02916e326636d19c33f13e8c0c3a03dd157f332f3e99c317c141dd865eb01f8ff0"
        );

        let revocation_privkey =
            derive_revocation_priv_key(&base_secret(), &per_commitment_secret())
                .expect("must derive");
        assert_eq!(
            hex::encode(revocation_privkey.secret_bytes()),
            "d09ffff62ddb2297ab000cc85bcb4283fdeb6aa052affbc9dddcf33b61078110"
        );
        assert_eq!(revocation_privkey.public_key(SECP256K1), revocation_pubkey);
    }
}
