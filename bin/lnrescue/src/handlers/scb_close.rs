use anyhow::Context;
use lnrescue_db::{ChannelStore, JsonChannelStore};
use lnrescue_recovery::scb_close::ScbCloseEngine;
use tracing::info;

use crate::{
    cli::ScbCloseArgs,
    config::Config,
    handlers::{chain_client, force_close::record_report, keyring},
};

pub(crate) fn handle_scb_close(args: ScbCloseArgs, config: &Config) -> anyhow::Result<()> {
    let ring = keyring(&args.secret, config)?;
    let store = JsonChannelStore::open(&args.channel_dump)
        .with_context(|| format!("failed to open {}", args.channel_dump.display()))?;

    let backups = store.backups()?;
    info!(count = backups.len(), "loaded channel backups");

    let chain = if args.publish {
        Some(chain_client(config)?)
    } else {
        None
    };
    let engine = match &chain {
        Some(chain) => ScbCloseEngine::new(&ring).with_publisher(chain),
        None => ScbCloseEngine::new(&ring),
    };

    let report = engine.run(&backups)?;

    record_report(&report, config, "scbforceclose")
}
