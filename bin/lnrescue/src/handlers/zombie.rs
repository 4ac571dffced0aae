use anyhow::Context;
use bitcoin::{consensus::encode::serialize_hex, Amount};
use lnrescue_chain::ChainClient;
use lnrescue_recovery::zombie::{
    make_offer, prepare_keys, read_json, sign_offer, write_json, Offer, OfferTerms, PreparedKeys,
    ZombieMatch,
};
use tracing::info;

use crate::{
    cli::{MakeOfferArgs, PrepareKeysArgs, SignOfferArgs, TermsArgs},
    config::Config,
    handlers::{chain_client, keyring},
};

impl From<&TermsArgs> for OfferTerms {
    fn from(args: &TermsArgs) -> Self {
        Self {
            maker_amount: Amount::from_sat(args.maker_amount),
            fee_rate: args.fee_rate,
            fee_payer: args.fee_payer,
        }
    }
}

fn read_keys(path: &std::path::Path) -> anyhow::Result<PreparedKeys> {
    read_json(path).with_context(|| format!("failed to read keys file {}", path.display()))
}

pub(crate) fn handle_prepare_keys(args: PrepareKeysArgs, config: &Config) -> anyhow::Result<()> {
    let ring = keyring(&args.secret, config)?;
    let zombie_match: ZombieMatch = read_json(&args.match_file)
        .with_context(|| format!("failed to read match file {}", args.match_file.display()))?;

    let key_count = args.num_keys.unwrap_or(config.multisig_key_count);
    let prepared = prepare_keys(&ring, &zombie_match, &args.payout_addr, key_count)?;

    write_json(&args.output, &prepared)?;
    info!(
        keys = prepared.multisig_keys.len(),
        output = %args.output.display(),
        "wrote prepared keys, send this file to the other node"
    );

    Ok(())
}

pub(crate) fn handle_make_offer(args: MakeOfferArgs, config: &Config) -> anyhow::Result<()> {
    let ring = keyring(&args.secret, config)?;
    let ours = read_keys(&args.our_keys)?;
    let theirs = read_keys(&args.their_keys)?;

    let offer = make_offer(&ring, &ours, &theirs, &OfferTerms::from(&args.terms))?;

    info!("send this offer to the other node");
    println!("{}", offer.to_base64());

    Ok(())
}

pub(crate) fn handle_sign_offer(args: SignOfferArgs, config: &Config) -> anyhow::Result<()> {
    let ring = keyring(&args.secret, config)?;
    let ours = read_keys(&args.our_keys)?;
    let theirs = read_keys(&args.their_keys)?;
    let offer = Offer::from_base64(&args.offer).context("invalid offer")?;

    let signed = sign_offer(&ring, &ours, &theirs, &offer, &OfferTerms::from(&args.terms))?;
    let tx = signed.extract_tx()?;

    println!("{}", serialize_hex(&tx));

    if args.publish {
        let chain = chain_client(config)?;
        let txid = chain.broadcast(&tx)?;
        info!(%txid, "published closing transaction");
    }

    Ok(())
}
