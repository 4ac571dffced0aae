//! Records of force-closed channels and the append-only files they are kept in.

use std::{
    fs,
    path::{Path, PathBuf},
};

use bitcoin::{Amount, OutPoint, ScriptBuf, Txid};
use lnrescue_primitives::channel::ChannelType;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{RecoveryError, RecoveryResult};

/// One output of a commitment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSummary {
    /// The output index.
    pub vout: u32,

    /// The output value.
    #[serde(with = "bitcoin::amount::serde::as_sat")]
    pub value: Amount,

    /// The output script.
    pub script_pubkey: ScriptBuf,

    /// The witness script, for P2WSH outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_script: Option<ScriptBuf>,
}

/// Everything needed to later sweep the outputs of a signed commitment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceCloseSummary {
    /// The funding outpoint of the channel.
    pub chan_point: OutPoint,

    /// The channel type.
    pub chan_type: ChannelType,

    /// The counterparty's node key, if known.
    #[serde(default)]
    pub remote_node_pub: Option<PublicKey>,

    /// The txid of the signed commitment transaction.
    pub txid: Txid,

    /// The signed commitment transaction, consensus-encoded hex.
    pub serialized: String,

    /// The CSV delay of the to-local output.
    pub csv_delay: u16,

    /// The local delay base point.
    pub delay_base_point: PublicKey,

    /// The remote revocation base point.
    pub remote_revocation_base_point: PublicKey,

    /// The per-commitment point of the signed commitment.
    pub commit_point: PublicKey,

    /// The to-local output, if the commitment has one.
    #[serde(default)]
    pub to_local: Option<OutputSummary>,

    /// The to-remote output, if the commitment has one.
    #[serde(default)]
    pub to_remote: Option<OutputSummary>,
}

/// A JSON array of [`ForceCloseSummary`] entries that only ever grows.
#[derive(Debug, Clone)]
pub struct ResultsFile {
    path: PathBuf,
}

impl ResultsFile {
    /// Refers to the results file at `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A new results file in `dir` named after `prefix` and the current time.
    pub fn timestamped(dir: impl AsRef<Path>, prefix: &str) -> Self {
        let stamp = chrono::Utc::now().format("%Y-%m-%d-%H-%M-%S");

        Self::new(dir.as_ref().join(format!("{prefix}-{stamp}.json")))
    }

    /// The file's location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all entries. A missing file holds no entries.
    pub fn load(&self) -> RecoveryResult<Vec<ForceCloseSummary>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path).map_err(|source| RecoveryError::Io {
            path: self.path.clone(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| RecoveryError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Appends `entries` after the existing ones.
    pub fn append(&self, entries: &[ForceCloseSummary]) -> RecoveryResult<()> {
        let mut all = self.load()?;
        all.extend_from_slice(entries);

        let json = serde_json::to_string_pretty(&all).map_err(|source| RecoveryError::Json {
            path: self.path.clone(),
            source,
        })?;

        fs::write(&self.path, json).map_err(|source| RecoveryError::Io {
            path: self.path.clone(),
            source,
        })?;

        info!(path = %self.path.display(), appended = entries.len(), total = all.len(), "wrote results");

        Ok(())
    }
}
