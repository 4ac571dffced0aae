use anyhow::Context;
use lnrescue_db::JsonChannelStore;
use lnrescue_recovery::{
    force_close::{CloseReport, ForceCloseEngine},
    summary::ResultsFile,
};
use tracing::{info, warn};

use crate::{
    cli::ForceCloseArgs,
    config::Config,
    handlers::{chain_client, keyring},
};

/// Writes the summaries of a run and logs what was skipped.
pub(crate) fn record_report(
    report: &CloseReport,
    config: &Config,
    prefix: &str,
) -> anyhow::Result<()> {
    for skipped in &report.skipped {
        warn!(chan_point = %skipped.chan_point, reason = %skipped.reason, "channel skipped");
    }

    if report.summaries.is_empty() {
        info!("no commitments signed");
        return Ok(());
    }

    let results = ResultsFile::timestamped(&config.results_dir, prefix);
    results
        .append(&report.summaries)
        .with_context(|| format!("failed to write {}", results.path().display()))?;

    for summary in &report.summaries {
        println!("{} {}", summary.chan_point, summary.serialized);
    }

    info!(
        signed = report.summaries.len(),
        skipped = report.skipped.len(),
        published = report.published.len(),
        results = %results.path().display(),
        "force close done"
    );

    Ok(())
}

pub(crate) fn handle_force_close(args: ForceCloseArgs, config: &Config) -> anyhow::Result<()> {
    let ring = keyring(&args.secret, config)?;
    let store = JsonChannelStore::open(&args.channel_dump)
        .with_context(|| format!("failed to open {}", args.channel_dump.display()))?;

    let chain = if args.publish {
        Some(chain_client(config)?)
    } else {
        None
    };
    let engine = match &chain {
        Some(chain) => ForceCloseEngine::new(&ring).with_publisher(chain),
        None => ForceCloseEngine::new(&ring),
    };

    let report = match args.chan_point {
        Some(chan_point) => engine.run_channel(&store, chan_point)?,
        None => engine.run(&store)?,
    };

    record_report(&report, config, "forceclose")
}
