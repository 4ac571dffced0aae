use anyhow::{bail, Context};
use bitcoin::consensus::encode::serialize_hex;
use lnrescue_key_deriv::address::parse_address;
use lnrescue_recovery::{
    summary::ResultsFile,
    sweep::{SweepEngine, SweepParams},
};
use tracing::{info, warn};

use crate::{
    cli::SweepTimeLockArgs,
    config::Config,
    handlers::{chain_client, keyring},
};

pub(crate) fn handle_sweep_time_lock(
    args: SweepTimeLockArgs,
    config: &Config,
) -> anyhow::Result<()> {
    let ring = keyring(&args.secret, config)?;
    let chain = chain_client(config)?;

    let sweep_addr = parse_address(&args.sweep_addr, config.network)
        .with_context(|| format!("invalid sweep address {}", args.sweep_addr))?;
    if args.fee_rate == 0 {
        bail!("the fee rate must be at least 1 sat/vB");
    }

    let mut summaries = Vec::new();
    for path in &args.results {
        let loaded = ResultsFile::new(path)
            .load()
            .with_context(|| format!("failed to load {}", path.display()))?;
        info!(path = %path.display(), entries = loaded.len(), "loaded force close results");
        summaries.extend(loaded);
    }

    let engine = SweepEngine::new(&ring, &chain);
    let result = engine.build(
        &summaries,
        &SweepParams {
            sweep_addr,
            fee_rate: args.fee_rate,
        },
    )?;

    for skipped in &result.skipped {
        warn!(chan_point = %skipped.chan_point, reason = %skipped.reason, "output not swept");
    }
    info!(
        inputs = result.swept.len(),
        total_in = %result.total_in,
        fee = %result.fee,
        txid = %result.tx.compute_txid(),
        "built sweep transaction"
    );

    println!("{}", serialize_hex(&result.tx));

    if args.publish {
        let txid = engine.publish(&result.tx)?;
        info!(%txid, "published sweep transaction");
    }

    Ok(())
}
