//! An in-memory [`ChainClient`] used in tests and dry runs.

use std::{collections::HashMap, sync::Mutex};

use bitcoin::{Transaction, Txid};

use crate::{
    errors::{ChainError, ChainResult},
    traits::{ChainClient, ChainTx, SpendStatus},
};

/// A chain made of the transactions inserted into it.
///
/// Broadcast transactions are added to the chain as unconfirmed and mark the outputs they spend.
#[derive(Debug, Default)]
pub struct InMemoryChainClient {
    txs: Mutex<HashMap<Txid, ChainTx>>,
    fail_broadcast: bool,
}

impl InMemoryChainClient {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain whose [`ChainClient::broadcast`] always fails.
    pub fn rejecting_broadcasts() -> Self {
        Self {
            fail_broadcast: true,
            ..Self::default()
        }
    }

    /// Adds a confirmed transaction with all outputs unspent.
    pub fn insert_confirmed(&self, tx: Transaction) {
        self.insert(tx, true);
    }

    /// Marks output `vout` of `txid` as spent by `spender`.
    pub fn mark_spent(&self, txid: &Txid, vout: u32, spender: Option<Txid>) {
        let mut txs = self.txs.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(status) = txs
            .get_mut(txid)
            .and_then(|chain_tx| chain_tx.spends.get_mut(vout as usize))
        {
            *status = SpendStatus::Spent(spender);
        }
    }

    /// Whether `txid` is known.
    pub fn contains(&self, txid: &Txid) -> bool {
        self.txs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(txid)
    }

    fn insert(&self, tx: Transaction, confirmed: bool) {
        let txid = tx.compute_txid();
        let spends = vec![SpendStatus::Unspent; tx.output.len()];

        self.txs.lock().unwrap_or_else(|e| e.into_inner()).insert(
            txid,
            ChainTx {
                tx,
                confirmed,
                spends,
            },
        );
    }
}

impl ChainClient for InMemoryChainClient {
    fn fetch_transaction(&self, txid: &Txid) -> ChainResult<ChainTx> {
        self.txs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(txid)
            .cloned()
            .ok_or(ChainError::NotFound(*txid))
    }

    fn broadcast(&self, tx: &Transaction) -> ChainResult<Txid> {
        let txid = tx.compute_txid();
        if self.fail_broadcast {
            return Err(ChainError::Rejected {
                txid,
                reason: "broadcast disabled".to_string(),
            });
        }

        for input in &tx.input {
            self.mark_spent(&input.previous_output.txid, input.previous_output.vout, Some(txid));
        }
        self.insert(tx.clone(), false);

        Ok(txid)
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{absolute::LockTime, transaction::Version, Amount, OutPoint, ScriptBuf, Sequence, TxIn, TxOut, Witness};
    use lnrescue_test_utils::bitcoin::generate_txid;

    use super::*;

    fn tx_spending(prev: OutPoint, outputs: usize) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: prev,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![
                TxOut {
                    value: Amount::from_sat(1_000),
                    script_pubkey: ScriptBuf::new(),
                };
                outputs
            ],
        }
    }

    #[test]
    fn test_unknown_transaction_is_not_found() {
        let chain = InMemoryChainClient::new();
        let err = chain
            .fetch_transaction(&generate_txid())
            .expect_err("empty chain");

        assert!(err.is_not_found());
    }

    #[test]
    fn test_broadcast_marks_spent_outputs() {
        let chain = InMemoryChainClient::new();
        let parent = tx_spending(OutPoint::new(generate_txid(), 0), 2);
        let parent_txid = parent.compute_txid();
        chain.insert_confirmed(parent);

        let child = tx_spending(OutPoint::new(parent_txid, 1), 1);
        let child_txid = chain.broadcast(&child).expect("must relay");

        let fetched = chain.fetch_transaction(&parent_txid).expect("known");
        assert!(fetched.confirmed);
        assert_eq!(fetched.outputs().len(), 2);
        assert_eq!(fetched.spend_status(0), Some(SpendStatus::Unspent));
        assert_eq!(fetched.spend_status(1), Some(SpendStatus::Spent(Some(child_txid))));
        assert_eq!(fetched.spend_status(2), None);

        let child = chain.fetch_transaction(&child_txid).expect("relayed");
        assert!(!child.confirmed);
        assert_eq!(child.inputs()[0].previous_output, OutPoint::new(parent_txid, 1));
    }

    #[test]
    fn test_rejecting_chain_fails_broadcast() {
        let chain = InMemoryChainClient::rejecting_broadcasts();
        let tx = tx_spending(OutPoint::new(generate_txid(), 0), 1);

        let err = chain.broadcast(&tx).expect_err("must reject");
        assert!(matches!(err, ChainError::Rejected { .. }));
        assert!(!chain.contains(&tx.compute_txid()));
    }
}
