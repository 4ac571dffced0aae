use anyhow::{bail, Context};
use lnrescue_key_deriv::{
    address::{p2wpkh_address, to_wif, wpkh_descriptor},
    KeyDeriver,
};
use lnrescue_primitives::keys::KeyLocator;
use secp256k1::{SecretKey, SECP256K1};
use serde::Serialize;

use crate::{cli::DeriveKeyArgs, config::Config, handlers::keyring};

#[derive(Debug, Serialize)]
struct DerivedKey {
    source: String,
    pubkey: String,
    address: String,
    wif: String,
    descriptor: String,
}

pub(crate) fn handle_derive_key(args: DeriveKeyArgs, config: &Config) -> anyhow::Result<()> {
    let ring = keyring(&args.secret, config)?;
    let ring = match args.peer {
        Some(peer) => ring.with_peer(peer),
        None => ring,
    };

    let (source, secret_key): (String, SecretKey) = match (&args.path, args.family) {
        (Some(path), _) => {
            let KeyDeriver::Bip32 { root, mode } = ring.deriver() else {
                bail!("--path needs a BIP32 root key or seed");
            };
            let key = root
                .derive_path(path, *mode)
                .and_then(|child| child.secret_key())
                .with_context(|| format!("could not derive {path}"))?;

            (path.to_string(), key)
        }
        (None, Some(family)) => {
            let locator = KeyLocator::new(family, args.index);
            let key = ring
                .derive_priv_key(locator)
                .with_context(|| format!("could not derive {locator}"))?;

            (locator.to_string(), key)
        }
        (None, None) => bail!("either --path or --family is required"),
    };

    let network = config.network;
    let derived = DerivedKey {
        source,
        pubkey: secret_key.public_key(SECP256K1).to_string(),
        address: p2wpkh_address(&secret_key.public_key(SECP256K1), network).to_string(),
        wif: to_wif(secret_key, network),
        descriptor: wpkh_descriptor(secret_key, network)?,
    };

    println!("{}", serde_json::to_string_pretty(&derived)?);

    Ok(())
}
