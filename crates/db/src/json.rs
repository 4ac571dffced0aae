//! A [`ChannelStore`] backed by a JSON channel dump.
//!
//! The dump is produced by an external reader of the node's database and has the shape
//!
//! ```json
//! { "open_channels": [...], "closed_channels": ["<txid>:<vout>", ...], "backups": [...] }
//! ```

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use bitcoin::OutPoint;
use lnrescue_primitives::channel::{ChannelBackupSingle, OpenChannelState};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::{DbResult, StoreError},
    inmemory::InMemoryChannelStore,
    traits::ChannelStore,
};

/// The on-disk layout of a channel dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDump {
    /// Channels the node considers open.
    #[serde(default)]
    pub open_channels: Vec<OpenChannelState>,

    /// Funding outpoints of channels recorded as closed.
    #[serde(default)]
    pub closed_channels: Vec<OutPoint>,

    /// Decrypted static channel backup entries.
    #[serde(default)]
    pub backups: Vec<ChannelBackupSingle>,
}

impl ChannelDump {
    /// Writes the dump as pretty-printed JSON.
    pub fn write(&self, path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Channel records loaded from a [`ChannelDump`] file.
#[derive(Debug, Clone)]
pub struct JsonChannelStore {
    path: PathBuf,
    inner: InMemoryChannelStore,
}

impl JsonChannelStore {
    /// Opens and parses the dump at `path`.
    ///
    /// Fails if the file cannot be read, is not a valid dump, or lists a funding outpoint twice.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();

        let raw = fs::read_to_string(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let dump: ChannelDump = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;

        let mut inner = InMemoryChannelStore::new();
        let mut seen = BTreeSet::new();
        for channel in dump.open_channels {
            if !seen.insert(channel.funding_outpoint) {
                return Err(StoreError::DuplicateChannel(channel.funding_outpoint));
            }
            inner.insert_open_channel(channel);
        }

        let mut seen_backups = BTreeSet::new();
        for backup in dump.backups {
            if !seen_backups.insert(backup.funding_outpoint) {
                return Err(StoreError::DuplicateChannel(backup.funding_outpoint));
            }
            inner.insert_backup(backup);
        }

        for closed in dump.closed_channels {
            inner.mark_closed(closed);
        }

        info!(path = %path.display(), open = seen.len(), backups = seen_backups.len(), "loaded channel dump");

        Ok(Self { path, inner })
    }

    /// The file this store was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChannelStore for JsonChannelStore {
    fn open_channels(&self) -> DbResult<Vec<OpenChannelState>> {
        self.inner.open_channels()
    }

    fn closed_channel_points(&self) -> DbResult<BTreeSet<OutPoint>> {
        self.inner.closed_channel_points()
    }

    fn open_channel(&self, funding_outpoint: &OutPoint) -> DbResult<Option<OpenChannelState>> {
        self.inner.open_channel(funding_outpoint)
    }

    fn backups(&self) -> DbResult<Vec<ChannelBackupSingle>> {
        self.inner.backups()
    }
}
