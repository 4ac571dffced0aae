//! An in-memory [`ChannelStore`].

use std::collections::{BTreeMap, BTreeSet};

use bitcoin::OutPoint;
use lnrescue_primitives::channel::{ChannelBackupSingle, OpenChannelState};

use crate::{errors::DbResult, traits::ChannelStore};

/// Channel records held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChannelStore {
    open_channels: BTreeMap<OutPoint, OpenChannelState>,
    closed: BTreeSet<OutPoint>,
    backups: BTreeMap<OutPoint, ChannelBackupSingle>,
}

impl InMemoryChannelStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an open channel.
    pub fn insert_open_channel(&mut self, channel: OpenChannelState) {
        self.open_channels.insert(channel.funding_outpoint, channel);
    }

    /// Records a channel as closed.
    pub fn mark_closed(&mut self, funding_outpoint: OutPoint) {
        self.closed.insert(funding_outpoint);
    }

    /// Adds or replaces a backup entry.
    pub fn insert_backup(&mut self, backup: ChannelBackupSingle) {
        self.backups.insert(backup.funding_outpoint, backup);
    }
}

impl ChannelStore for InMemoryChannelStore {
    fn open_channels(&self) -> DbResult<Vec<OpenChannelState>> {
        Ok(self.open_channels.values().cloned().collect())
    }

    fn closed_channel_points(&self) -> DbResult<BTreeSet<OutPoint>> {
        Ok(self.closed.clone())
    }

    fn open_channel(&self, funding_outpoint: &OutPoint) -> DbResult<Option<OpenChannelState>> {
        Ok(self.open_channels.get(funding_outpoint).cloned())
    }

    fn backups(&self) -> DbResult<Vec<ChannelBackupSingle>> {
        Ok(self.backups.values().cloned().collect())
    }
}
