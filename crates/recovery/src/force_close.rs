//! Force closes every open channel of a node from its exported channel state.
//!
//! Per channel: Open → Signed → (Published) → Recorded. Channels already recorded as closed are
//! skipped. Channels that cannot be signed for (no commitment, unsupported type, underivable
//! keys) are logged and skipped; any other failure aborts the run.

use bitcoin::{OutPoint, Transaction, Txid};
use lnrescue_chain::ChainClient;
use lnrescue_db::ChannelStore;
use lnrescue_key_deriv::KeyRing;
use lnrescue_primitives::channel::OpenChannelState;
use tracing::{info, warn};

use crate::{
    commitment::{channel_ring, sign_commitment, CommitmentSource, SignedCommitment},
    errors::{RecoveryError, RecoveryResult},
    summary::ForceCloseSummary,
};

/// A channel left out of a batch and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChannel {
    /// The channel.
    pub chan_point: OutPoint,

    /// Why it was skipped.
    pub reason: String,
}

/// The outcome of a force-close batch.
#[derive(Debug, Clone, Default)]
pub struct CloseReport {
    /// Records of every signed commitment, in channel order.
    pub summaries: Vec<ForceCloseSummary>,

    /// Channels that could not be signed for.
    pub skipped: Vec<SkippedChannel>,

    /// Commitments the chain backend accepted.
    pub published: Vec<Txid>,
}

impl CloseReport {
    /// Handles the result of closing one channel: item errors are logged and recorded, anything
    /// else is returned.
    pub(crate) fn absorb(
        &mut self,
        chan_point: OutPoint,
        result: RecoveryResult<SignedCommitment>,
        chain: Option<&dyn ChainClient>,
    ) -> RecoveryResult<()> {
        let signed = match result {
            Ok(signed) => signed,
            Err(err) if err.is_item_error() => {
                warn!(%chan_point, %err, "skipping channel");
                self.skipped.push(SkippedChannel {
                    chan_point,
                    reason: err.to_string(),
                });
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if let Some(chain) = chain {
            if let Some(txid) = publish(chain, chan_point, &signed.tx) {
                self.published.push(txid);
            }
        }

        self.summaries.push(signed.summary);

        Ok(())
    }
}

fn publish(chain: &dyn ChainClient, chan_point: OutPoint, tx: &Transaction) -> Option<Txid> {
    match chain.broadcast(tx) {
        Ok(txid) => {
            info!(%chan_point, %txid, "published commitment");
            Some(txid)
        }
        Err(err) => {
            warn!(%chan_point, %err, "could not publish commitment");
            None
        }
    }
}

/// Signs the latest local commitment of open channels.
#[derive(Debug, Clone, Copy)]
pub struct ForceCloseEngine<'a> {
    keyring: &'a KeyRing,
    chain: Option<&'a dyn ChainClient>,
}

impl<'a> ForceCloseEngine<'a> {
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

    /// Signs the latest local commitment of one channel.
    pub fn close_channel(&self, state: &OpenChannelState) -> RecoveryResult<SignedCommitment> {
        let chan_point = state.funding_outpoint;
        if state.chain != self.keyring.network() {
            return Err(RecoveryError::NetworkMismatch {
                chan_point,
                expected: self.keyring.network(),
                found: state.chain,
            });
        }

        let commitment = state
            .local_commitment
            .as_ref()
            .ok_or(RecoveryError::MissingCommitment(chan_point))?;

        let ring = channel_ring(self.keyring, state.remote_node_pub);

        sign_commitment(
            &ring,
            &CommitmentSource {
                funding_outpoint: chan_point,
                chan_type: state.chan_type,
                capacity: state.capacity,
                remote_node_pub: state.remote_node_pub,
                local_cfg: &state.local_chan_cfg,
                remote_cfg: &state.remote_chan_cfg,
                commitment,
                revocation_root: state.revocation_root,
            },
        )
    }

    /// Force closes every channel in `store` that is not recorded as closed.
    pub fn run(&self, store: &dyn ChannelStore) -> RecoveryResult<CloseReport> {
        let closed = store.closed_channel_points()?;
        let mut report = CloseReport::default();

        for state in store.open_channels()? {
            let chan_point = state.funding_outpoint;
            if closed.contains(&chan_point) {
                info!(%chan_point, "channel already closed, skipping");
                continue;
            }

            report.absorb(chan_point, self.close_channel(&state), self.chain)?;
        }

        info!(
            signed = report.summaries.len(),
            skipped = report.skipped.len(),
            published = report.published.len(),
            "force close finished"
        );

        Ok(report)
    }

    /// Force closes only the channel funded by `chan_point`.
    pub fn run_channel(
        &self,
        store: &dyn ChannelStore,
        chan_point: OutPoint,
    ) -> RecoveryResult<CloseReport> {
        let state = store.open_channel(&chan_point)?.ok_or_else(|| {
            RecoveryError::NothingToDo(format!("no open channel {chan_point}"))
        })?;

        if store.closed_channel_points()?.contains(&chan_point) {
            return Err(RecoveryError::NothingToDo(format!(
                "channel {chan_point} is already closed"
            )));
        }

        let mut report = CloseReport::default();
        report.absorb(chan_point, self.close_channel(&state), self.chain)?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use lnrescue_chain::InMemoryChainClient;
    use lnrescue_db::InMemoryChannelStore;
    use lnrescue_primitives::channel::ChannelType;
    use lnrescue_test_utils::channel::ChannelFixture;

    use super::*;

    fn store_with(channels: impl IntoIterator<Item = OpenChannelState>) -> InMemoryChannelStore {
        let mut store = InMemoryChannelStore::new();
        for channel in channels {
            store.insert_open_channel(channel);
        }
        store
    }

    fn with_outpoint(mut state: OpenChannelState, vout: u32) -> OpenChannelState {
        state.funding_outpoint.vout = vout;
        state
    }

    #[test]
    fn test_run_signs_open_and_skips_closed() {
        let fixture = ChannelFixture::new();
        let mut store = store_with([fixture.local_state.clone(), with_outpoint(fixture.local_state.clone(), 7)]);
        store.mark_closed(OutPoint::new(fixture.funding_outpoint.txid, 7));

        let report = ForceCloseEngine::new(&fixture.local_ring)
            .run(&store)
            .expect("run");

        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].chan_point, fixture.funding_outpoint);
        assert!(report.skipped.is_empty());
        assert!(report.published.is_empty());
    }

    #[test]
    fn test_run_channel_closes_only_that_channel() {
        let fixture = ChannelFixture::new();
        let other = with_outpoint(fixture.local_state.clone(), 7);
        let store = store_with([fixture.local_state.clone(), other]);
        let engine = ForceCloseEngine::new(&fixture.local_ring);

        let report = engine
            .run_channel(&store, fixture.funding_outpoint)
            .expect("run");
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].chan_point, fixture.funding_outpoint);

        let unknown = OutPoint::new(fixture.funding_outpoint.txid, 9);
        assert!(matches!(
            engine.run_channel(&store, unknown),
            Err(RecoveryError::NothingToDo(_))
        ));
    }

    #[test]
    fn test_missing_commitment_is_skipped() {
        let fixture = ChannelFixture::new();
        let mut broken = with_outpoint(fixture.local_state.clone(), 1);
        broken.local_commitment = None;
        let mut taproot = with_outpoint(fixture.local_state.clone(), 2);
        taproot.chan_type = ChannelType::SIMPLE_TAPROOT;

        let store = store_with([fixture.local_state.clone(), broken, taproot]);
        let report = ForceCloseEngine::new(&fixture.local_ring)
            .run(&store)
            .expect("run");

        assert_eq!(report.summaries.len(), 1);
        let skipped: Vec<u32> = report.skipped.iter().map(|s| s.chan_point.vout).collect();
        assert_eq!(skipped, vec![1, 2]);
    }

    #[test]
    fn test_publish_broadcasts_commitment() {
        let fixture = ChannelFixture::new();
        let store = store_with([fixture.local_state.clone()]);
        let chain = InMemoryChainClient::new();

        let report = ForceCloseEngine::new(&fixture.local_ring)
            .with_publisher(&chain)
            .run(&store)
            .expect("run");

        assert_eq!(report.published, vec![report.summaries[0].txid]);
        assert!(chain.contains(&report.summaries[0].txid));
    }

    #[test]
    fn test_broadcast_failure_keeps_summary() {
        let fixture = ChannelFixture::new();
        let store = store_with([fixture.local_state.clone()]);
        let chain = InMemoryChainClient::rejecting_broadcasts();

        let report = ForceCloseEngine::new(&fixture.local_ring)
            .with_publisher(&chain)
            .run(&store)
            .expect("run");

        assert_eq!(report.summaries.len(), 1);
        assert!(report.published.is_empty());
    }

    #[test]
    fn test_wrong_network_is_skipped() {
        let fixture = ChannelFixture::new();
        let mut state = fixture.local_state.clone();
        state.chain = bitcoin::Network::Testnet;

        let err = ForceCloseEngine::new(&fixture.local_ring)
            .close_channel(&state)
            .expect_err("network mismatch");
        assert!(matches!(err, RecoveryError::NetworkMismatch { .. }));
    }
}
