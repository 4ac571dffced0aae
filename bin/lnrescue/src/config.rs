//! The TOML config of the binary.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use bitcoin::Network;
use lnrescue_key_deriv::DEFAULT_SCAN_LIMIT;
use lnrescue_recovery::zombie::DEFAULT_MULTISIG_KEY_COUNT;
use serde::{Deserialize, Serialize};

use crate::cli::ConfigOverrides;

/// Settings shared by all subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    /// The network the channels live on.
    pub(crate) network: Network,

    /// The esplora API used to look up and publish transactions.
    pub(crate) esplora_url: Option<String>,

    /// The directory result files are written to.
    pub(crate) results_dir: PathBuf,

    /// How many indices of a key family are tried when matching a public key.
    pub(crate) key_scan_limit: u32,

    /// How many multisig keys `zombie prepare-keys` publishes.
    pub(crate) multisig_key_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            esplora_url: None,
            results_dir: PathBuf::from("."),
            key_scan_limit: DEFAULT_SCAN_LIMIT,
            multisig_key_count: DEFAULT_MULTISIG_KEY_COUNT,
        }
    }
}

impl Config {
    /// Loads the config at `path`, or the defaults if no path is given.
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Replaces the values given on the command line.
    pub(crate) fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(network) = overrides.network {
            self.network = network;
        }
        if let Some(esplora_url) = &overrides.esplora_url {
            self.esplora_url = Some(esplora_url.clone());
        }
        if let Some(results_dir) = &overrides.results_dir {
            self.results_dir = results_dir.clone();
        }
        if let Some(key_scan_limit) = overrides.key_scan_limit {
            self.key_scan_limit = key_scan_limit;
        }

        self
    }

    /// The esplora url, which commands that touch the chain require.
    pub(crate) fn require_esplora_url(&self) -> anyhow::Result<&str> {
        match self.esplora_url.as_deref() {
            Some(url) => Ok(url),
            None => bail!("an esplora url is required, set esplora_url or pass --esplora-url"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_full_config_round_trips() {
        let raw = r#"
            network = "signet"
            esplora_url = "https://mempool.space/signet/api"
            results_dir = "/var/lib/lnrescue"
            key_scan_limit = 1000
            multisig_key_count = 500
        "#;

        let parsed: Config = toml::from_str(raw).expect("full config parses");
        assert_eq!(parsed.network, Network::Signet);
        assert_eq!(parsed.results_dir, PathBuf::from("/var/lib/lnrescue"));
        assert_eq!(parsed.key_scan_limit, 1000);
        assert_eq!(parsed.multisig_key_count, 500);

        let written = toml::to_string(&parsed).expect("config serializes");
        let reparsed: Config = toml::from_str(&written).expect("written config parses");
        assert_eq!(reparsed, parsed);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = toml::from_str::<Config>(r#"network = "regtest""#).unwrap();

        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.key_scan_limit, DEFAULT_SCAN_LIMIT);
        assert_eq!(config.multisig_key_count, DEFAULT_MULTISIG_KEY_COUNT);
        assert!(config.require_esplora_url().is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network = \"testnet\"\nkey_scan_limit = 10").unwrap();

        let overrides = ConfigOverrides {
            network: Some(Network::Regtest),
            esplora_url: Some("http://localhost:3002".to_string()),
            ..Default::default()
        };
        let config = Config::load(Some(file.path()))
            .unwrap()
            .with_overrides(&overrides);

        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.key_scan_limit, 10);
        assert_eq!(config.require_esplora_url().unwrap(), "http://localhost:3002");
    }

    #[test]
    fn test_load_without_path_is_default() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
