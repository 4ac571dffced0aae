//! BIP-380 output descriptor checksums.

use crate::errors::{DerivationError, DerivationResult};

const INPUT_CHARSET: &str =
    "0123456789()[],'/*abcdefgh@:$%{}IJKLMNOPQRSTUVWXYZ&+-.;<=>?!^_|~ijklmnopqrstuvwxyzABCDEFGH`#\"\\ ";
const CHECKSUM_CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

fn poly_mod(mut c: u64, val: u64) -> u64 {
    let c0 = c >> 35;
    c = ((c & 0x7_ffff_ffff) << 5) ^ val;

    for (bit, generator) in [
        0xf5_dee5_1989,
        0xa9_fdca_3312,
        0x1b_ab10_e32d,
        0x37_06b1_677a,
        0x64_4d62_6ffd,
    ]
    .into_iter()
    .enumerate()
    {
        if c0 & (1 << bit) != 0 {
            c ^= generator;
        }
    }

    c
}

/// Computes the 8-character checksum of a descriptor without its `#checksum` suffix.
pub fn descriptor_checksum(desc: &str) -> DerivationResult<String> {
    let mut c = 1u64;
    let mut cls = 0u64;
    let mut cls_count = 0;

    for ch in desc.chars() {
        let pos = INPUT_CHARSET
            .find(ch)
            .ok_or_else(|| DerivationError::InvalidChecksum(format!("invalid character '{ch}'")))?
            as u64;

        c = poly_mod(c, pos & 31);
        cls = cls * 3 + (pos >> 5);
        cls_count += 1;
        if cls_count == 3 {
            c = poly_mod(c, cls);
            cls = 0;
            cls_count = 0;
        }
    }

    if cls_count > 0 {
        c = poly_mod(c, cls);
    }
    for _ in 0..8 {
        c = poly_mod(c, 0);
    }
    c ^= 1;

    Ok((0..8)
        .map(|j| CHECKSUM_CHARSET[((c >> (5 * (7 - j))) & 31) as usize] as char)
        .collect())
}

/// Appends `#<checksum>` to a descriptor.
pub fn add_checksum(desc: &str) -> DerivationResult<String> {
    Ok(format!("{desc}#{}", descriptor_checksum(desc)?))
}

/// Verifies a `desc#checksum` string and returns the descriptor part.
pub fn verify_checksum(desc_with_checksum: &str) -> DerivationResult<&str> {
    let (desc, checksum) = desc_with_checksum
        .rsplit_once('#')
        .ok_or_else(|| DerivationError::InvalidChecksum("missing checksum".to_string()))?;

    if checksum.len() != 8 {
        return Err(DerivationError::InvalidChecksum(format!(
            "checksum '{checksum}' must be 8 characters"
        )));
    }

    let expected = descriptor_checksum(desc)?;
    if expected != checksum {
        return Err(DerivationError::InvalidChecksum(format!(
            "expected {expected}, got {checksum}"
        )));
    }

    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_vectors() {
        assert_eq!(
            descriptor_checksum("addr(mkmZxiEcEd8ZqjQWVZuC6so5dFMKEFpN2j)").expect("valid"),
            "02wpgw69"
        );
        assert_eq!(
            descriptor_checksum("tr(cRhCT5vC5NdnSrQ2Jrah6NPCcth41uT8DWFmA6uD8R4x2ufucnYX)")
                .expect("valid"),
            "gwfmkgga"
        );
    }

    #[test]
    fn test_verify_checksum() {
        let desc = "addr(mkmZxiEcEd8ZqjQWVZuC6so5dFMKEFpN2j)";
        let with_checksum = add_checksum(desc).expect("valid");

        assert_eq!(verify_checksum(&with_checksum).expect("valid"), desc);

        let tampered = format!("{desc}#02wpgw68");
        assert!(verify_checksum(&tampered).is_err());
        assert!(verify_checksum(desc).is_err());
    }

    #[test]
    fn test_rejects_characters_outside_charset() {
        assert!(descriptor_checksum("addr(\u{e9})").is_err());
    }
}
