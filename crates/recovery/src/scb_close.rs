//! Force closes channels using only what a static channel backup carries.
//!
//! Newer backups cache the latest commitment transaction together with the remote signature on
//! it. Everything else the signing core needs is recovered from the backup's key descriptors.

use lnrescue_chain::ChainClient;
use lnrescue_key_deriv::KeyRing;
use lnrescue_primitives::{channel::ChannelBackupSingle, shachain::ecdh_root};
use tracing::{debug, info};

use crate::{
    commitment::{sign_commitment, CommitmentSource, SignedCommitment},
    errors::{RecoveryError, RecoveryResult},
    force_close::CloseReport,
};

/// Signs the cached commitment of static channel backups.
#[derive(Debug, Clone, Copy)]
pub struct ScbCloseEngine<'a> {
    keyring: &'a KeyRing,
    chain: Option<&'a dyn ChainClient>,
}

impl<'a> ScbCloseEngine<'a> {
    /// Creates an engine that signs but does not publish.
    pub const fn new(keyring: &'a KeyRing) -> Self {
        Self {
            keyring,
            chain: None,
        }
    }

    /// Publishes every signed commitment through `chain`.
    pub const fn with_publisher(mut self, chain: &'a dyn ChainClient) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Signs the commitment cached in `backup`.
    pub fn close_backup(&self, backup: &ChannelBackupSingle) -> RecoveryResult<SignedCommitment> {
        let chan_point = backup.funding_outpoint;
        let missing = |field| RecoveryError::BackupMissingData { chan_point, field };

        if backup.chain != self.keyring.network() {
            return Err(RecoveryError::NetworkMismatch {
                chan_point,
                expected: self.keyring.network(),
                found: backup.chain,
            });
        }

        let chan_type = backup
            .chan_type()
            .ok_or(RecoveryError::UnknownBackupVersion {
                chan_point,
                version: backup.version,
            })?;
        let commitment = backup
            .close_tx_inputs
            .as_ref()
            .ok_or(missing("close tx inputs"))?;

        let remote = &backup.remote_chan_cfg;
        if remote.multisig_key.pub_key.is_none() {
            return Err(missing("remote multisig key"));
        }
        if remote.revocation_base_point.pub_key.is_none() || remote.payment_base_point.pub_key.is_none() {
            return Err(missing("remote base points"));
        }

        let ring = self.keyring.with_peer(backup.remote_node_pub);
        let root_key = ring.priv_key_for_desc(&backup.sha_chain_root_desc)?;
        let revocation_root = match backup.local_chan_cfg.multisig_key.pub_key {
            Some(multisig_key) => ecdh_root(&root_key, &multisig_key),
            None => {
                debug!(%chan_point, "no local multisig key in backup, using legacy shachain root");
                root_key.secret_bytes()
            }
        };

        sign_commitment(
            &ring,
            &CommitmentSource {
                funding_outpoint: chan_point,
                chan_type,
                capacity: backup.capacity,
                remote_node_pub: Some(backup.remote_node_pub),
                local_cfg: &backup.local_chan_cfg,
                remote_cfg: remote,
                commitment,
                revocation_root,
            },
        )
    }

    /// Force closes every channel in `backups`.
    pub fn run(&self, backups: &[ChannelBackupSingle]) -> RecoveryResult<CloseReport> {
        let mut report = CloseReport::default();

        for backup in backups {
            report.absorb(backup.funding_outpoint, self.close_backup(backup), self.chain)?;
        }

        info!(
            signed = report.summaries.len(),
            skipped = report.skipped.len(),
            published = report.published.len(),
            "backup close finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use lnrescue_chain::InMemoryChainClient;
    use lnrescue_primitives::keys::KeyDescriptor;
    use lnrescue_test_utils::channel::{ChannelFixture, FIXTURE_TO_LOCAL};

    use super::*;
    use crate::force_close::ForceCloseEngine;

    #[test]
    fn test_backup_close_matches_live_close() {
        let fixture = ChannelFixture::new();
        assert!(fixture.backup.local_chan_cfg.multisig_key.pub_key.is_none());

        let from_backup = ScbCloseEngine::new(&fixture.local_ring)
            .close_backup(&fixture.backup)
            .expect("must sign");
        let from_state = ForceCloseEngine::new(&fixture.local_ring)
            .close_channel(&fixture.local_state)
            .expect("must sign");

        fixture.assert_funding_witness(&from_backup.tx);
        assert_eq!(from_backup.tx, from_state.tx);
        assert_eq!(from_backup.summary.commit_point, from_state.summary.commit_point);
        assert_eq!(from_backup.summary.to_local, from_state.summary.to_local);
    }

    #[test]
    fn test_backup_with_multisig_key_uses_ecdh_root() {
        let fixture = ChannelFixture::with_ecdh_root();
        assert!(fixture.backup.local_chan_cfg.multisig_key.pub_key.is_some());

        let from_backup = ScbCloseEngine::new(&fixture.local_ring)
            .close_backup(&fixture.backup)
            .expect("must sign");
        let from_state = ForceCloseEngine::new(&fixture.local_ring)
            .close_channel(&fixture.local_state)
            .expect("must sign");

        assert_eq!(from_backup.summary.commit_point, from_state.summary.commit_point);
        assert_eq!(from_backup.keys, fixture.commit_keys);
        let to_local = from_backup.summary.to_local.expect("to-local output matched");
        assert_eq!(to_local.value, FIXTURE_TO_LOCAL);
        assert_eq!(to_local.witness_script, Some(fixture.to_local_script.clone()));
    }

    #[test]
    fn test_root_scheme_follows_backup_multisig_key() {
        // An ECDH-seeded channel whose backup lost the multisig key falls back to the legacy
        // root, which cannot reproduce the to-local output.
        let fixture = ChannelFixture::with_ecdh_root();
        let mut backup = fixture.backup.clone();
        backup.local_chan_cfg.multisig_key =
            KeyDescriptor::from_locator(backup.local_chan_cfg.multisig_key.key_locator);

        let signed = ScbCloseEngine::new(&fixture.local_ring)
            .close_backup(&backup)
            .expect("must sign");

        fixture.assert_funding_witness(&signed.tx);
        assert_ne!(signed.keys, fixture.commit_keys);
        assert!(signed.summary.to_local.is_none());
    }

    #[test]
    fn test_backup_without_commitment_fails_explicitly() {
        let fixture = ChannelFixture::new();
        let mut backup = fixture.backup.clone();
        backup.close_tx_inputs = None;

        let err = ScbCloseEngine::new(&fixture.local_ring)
            .close_backup(&backup)
            .expect_err("no commitment");
        assert!(matches!(
            err,
            RecoveryError::BackupMissingData {
                field: "close tx inputs",
                ..
            }
        ));
    }

    #[test]
    fn test_backup_without_remote_key_fails_explicitly() {
        let fixture = ChannelFixture::new();
        let mut backup = fixture.backup.clone();
        backup.remote_chan_cfg.multisig_key.pub_key = None;

        let err = ScbCloseEngine::new(&fixture.local_ring)
            .close_backup(&backup)
            .expect_err("no remote key");
        assert!(matches!(
            err,
            RecoveryError::BackupMissingData {
                field: "remote multisig key",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let fixture = ChannelFixture::new();
        let mut backup = fixture.backup.clone();
        backup.version = 200;

        let err = ScbCloseEngine::new(&fixture.local_ring)
            .close_backup(&backup)
            .expect_err("unknown version");
        assert!(matches!(err, RecoveryError::UnknownBackupVersion { version: 200, .. }));
    }

    #[test]
    fn test_run_skips_incomplete_backups_and_publishes() {
        let fixture = ChannelFixture::new();
        let mut incomplete = fixture.backup.clone();
        incomplete.funding_outpoint.vout = 9;
        incomplete.close_tx_inputs = None;
        let chain = InMemoryChainClient::new();

        let report = ScbCloseEngine::new(&fixture.local_ring)
            .with_publisher(&chain)
            .run(&[fixture.backup.clone(), incomplete])
            .expect("run");

        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].chan_point.vout, 9);
        assert_eq!(report.published.len(), 1);
    }
}
