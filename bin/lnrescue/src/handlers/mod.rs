//! Handlers of the subcommands.

pub(crate) mod derive_key;
pub(crate) mod force_close;
pub(crate) mod scb_close;
pub(crate) mod sweep;
pub(crate) mod zombie;

use anyhow::{bail, Context};
use lnrescue_chain::EsploraChainClient;
use lnrescue_key_deriv::{Bip32Mode, ExtendedKey, HsmSecret, KeyDeriver, KeyRing};
use tracing::info;
use zeroize::Zeroizing;

use crate::{cli::SecretArgs, config::Config};

fn decode_secret_hex(name: &str, hex_str: &str) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    hex::decode(hex_str.trim())
        .map(Zeroizing::new)
        .with_context(|| format!("{name} is not valid hex"))
}

/// Builds the key deriver for the secret given on the command line.
pub(crate) fn key_deriver(secret: &SecretArgs, config: &Config) -> anyhow::Result<KeyDeriver> {
    let source = &secret.source;
    let mode: Bip32Mode = secret.bip32_mode.into();

    if let Some(root_key) = &source.root_key {
        let root = root_key
            .parse::<ExtendedKey>()
            .context("invalid extended root key")?;

        return Ok(KeyDeriver::bip32(root, mode));
    }

    if let Some(seed_hex) = &source.seed_hex {
        let seed = decode_secret_hex("seed", seed_hex)?;
        let root = ExtendedKey::new_master(config.network, &seed)
            .context("could not create a root key from the seed")?;

        return Ok(KeyDeriver::bip32(root, mode));
    }

    if let Some(hsm_secret) = &source.hsm_secret {
        let bytes = decode_secret_hex("HSM secret", hsm_secret)?;
        let secret = HsmSecret::from_slice(&bytes).context("invalid HSM secret")?;

        return Ok(KeyDeriver::hsm(secret));
    }

    bail!("one of --root-key, --seed-hex or --hsm-secret is required")
}

/// Builds the key ring for the secret given on the command line.
pub(crate) fn keyring(secret: &SecretArgs, config: &Config) -> anyhow::Result<KeyRing> {
    let deriver = key_deriver(secret, config)?;
    info!(kind = deriver.kind(), network = %config.network, "using key deriver");

    Ok(KeyRing::new(deriver, config.network).with_scan_limit(config.key_scan_limit))
}

/// Connects to the configured esplora API.
pub(crate) fn chain_client(config: &Config) -> anyhow::Result<EsploraChainClient> {
    let url = config.require_esplora_url()?;
    info!(%url, "using esplora");

    Ok(EsploraChainClient::new(url))
}

#[cfg(test)]
mod tests {
    use bitcoin::Network;
    use lnrescue_primitives::keys::KeyFamily;

    use super::*;
    use crate::cli::{Bip32ModeArg, SecretSource};

    fn secret_args(source: SecretSource) -> SecretArgs {
        SecretArgs {
            source,
            bip32_mode: Bip32ModeArg::Lnd,
        }
    }

    fn regtest() -> Config {
        Config {
            network: Network::Regtest,
            ..Default::default()
        }
    }

    #[test]
    fn test_seed_and_root_key_agree() {
        let seed = [7u8; 32];
        let config = regtest();

        let from_seed = keyring(
            &secret_args(SecretSource {
                root_key: None,
                seed_hex: Some(hex::encode(seed)),
                hsm_secret: None,
            }),
            &config,
        )
        .unwrap();

        let root = ExtendedKey::new_master(Network::Regtest, &seed).unwrap();
        let xpriv = root.to_xpriv().unwrap().to_string();
        let from_root = keyring(
            &secret_args(SecretSource {
                root_key: Some(xpriv),
                seed_hex: None,
                hsm_secret: None,
            }),
            &config,
        )
        .unwrap();

        assert_eq!(
            from_seed.node_pubkey().unwrap(),
            from_root.node_pubkey().unwrap()
        );
        assert_eq!(from_seed.deriver().kind(), "bip32");
    }

    #[test]
    fn test_hsm_secret_must_be_32_bytes() {
        let config = regtest();
        let short = secret_args(SecretSource {
            root_key: None,
            seed_hex: None,
            hsm_secret: Some("00ff".to_string()),
        });
        assert!(keyring(&short, &config).is_err());

        let valid = secret_args(SecretSource {
            root_key: None,
            seed_hex: None,
            hsm_secret: Some(hex::encode([9u8; 32])),
        });
        let ring = keyring(&valid, &config).unwrap();
        assert_eq!(ring.deriver().kind(), "hsm");
        assert!(ring
            .derive_priv_key(lnrescue_primitives::keys::KeyLocator::new(KeyFamily::NodeKey, 0))
            .is_ok());
    }

    #[test]
    fn test_bad_hex_is_rejected() {
        let args = secret_args(SecretSource {
            root_key: None,
            seed_hex: Some("zz".to_string()),
            hsm_secret: None,
        });

        assert!(keyring(&args, &regtest()).is_err());
    }
}
