//! The channel store interface.

use std::collections::BTreeSet;

use bitcoin::OutPoint;
use lnrescue_primitives::channel::{ChannelBackupSingle, OpenChannelState};

use crate::errors::DbResult;

/// Read-only source of channel records keyed by funding outpoint.
pub trait ChannelStore {
    /// All channels the node considers open, ordered by funding outpoint.
    fn open_channels(&self) -> DbResult<Vec<OpenChannelState>>;

    /// The funding outpoints of channels already recorded as closed.
    fn closed_channel_points(&self) -> DbResult<BTreeSet<OutPoint>>;

    /// Gets, if present, the open channel funded by `funding_outpoint`.
    fn open_channel(&self, funding_outpoint: &OutPoint) -> DbResult<Option<OpenChannelState>> {
        Ok(self
            .open_channels()?
            .into_iter()
            .find(|channel| channel.funding_outpoint == *funding_outpoint))
    }

    /// All static channel backup entries, ordered by funding outpoint.
    fn backups(&self) -> DbResult<Vec<ChannelBackupSingle>>;
}
