//! [`ChainClient`] backed by an Esplora REST endpoint.

use bitcoin::{Transaction, Txid};
use esplora_client::{BlockingClient, Builder};
use tracing::{debug, info};

use crate::{
    errors::{ChainError, ChainResult},
    traits::{ChainClient, ChainTx, SpendStatus},
};

/// A blocking, rustls powered esplora client.
#[derive(Debug, Clone)]
pub struct EsploraChainClient {
    client: BlockingClient,
}

impl EsploraChainClient {
    /// Creates a new client against the provided url (remove trailing '/'s!).
    pub fn new(esplora_url: &str) -> Self {
        let url = esplora_url.trim_end_matches('/');
        debug!(%url, "creating esplora client");

        Self {
            client: Builder::new(url).build_blocking(),
        }
    }
}

fn transport(err: esplora_client::Error) -> ChainError {
    ChainError::Transport(err.to_string())
}

impl ChainClient for EsploraChainClient {
    fn fetch_transaction(&self, txid: &Txid) -> ChainResult<ChainTx> {
        let tx = self
            .client
            .get_tx(txid)
            .map_err(transport)?
            .ok_or(ChainError::NotFound(*txid))?;

        let confirmed = self.client.get_tx_status(txid).map_err(transport)?.confirmed;

        let mut spends = Vec::with_capacity(tx.output.len());
        for vout in 0..tx.output.len() as u64 {
            let status = self
                .client
                .get_output_status(txid, vout)
                .map_err(transport)?;

            spends.push(match status {
                Some(status) if status.spent => SpendStatus::Spent(status.txid),
                _ => SpendStatus::Unspent,
            });
        }

        Ok(ChainTx {
            tx,
            confirmed,
            spends,
        })
    }

    fn broadcast(&self, tx: &Transaction) -> ChainResult<Txid> {
        let txid = tx.compute_txid();

        self.client
            .broadcast(tx)
            .map_err(|err| ChainError::Rejected {
                txid,
                reason: err.to_string(),
            })?;

        info!(%txid, "broadcast transaction");

        Ok(txid)
    }
}
