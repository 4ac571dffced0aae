//! Defines the trait through which the recovery engines reach the chain.

use bitcoin::{Transaction, TxIn, TxOut, Txid};

use crate::errors::ChainResult;

/// Whether an output has been spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendStatus {
    /// The output is unspent.
    Unspent,

    /// The output is spent, by the given transaction if the backend reports it.
    Spent(Option<Txid>),
}

impl SpendStatus {
    /// Whether the output is spent.
    pub const fn is_spent(&self) -> bool {
        matches!(self, SpendStatus::Spent(_))
    }
}

/// A transaction as seen by the chain backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTx {
    /// The transaction itself.
    pub tx: Transaction,

    /// Whether the transaction is in a block.
    pub confirmed: bool,

    /// The spend status of every output, indexed by output index.
    pub spends: Vec<SpendStatus>,
}

impl ChainTx {
    /// The inputs of the transaction.
    pub fn inputs(&self) -> &[TxIn] {
        &self.tx.input
    }

    /// The outputs of the transaction.
    pub fn outputs(&self) -> &[TxOut] {
        &self.tx.output
    }

    /// The spend status of output `vout`, or `None` if it does not exist.
    pub fn spend_status(&self, vout: u32) -> Option<SpendStatus> {
        self.spends.get(vout as usize).copied()
    }
}

/// Read access to transactions and the ability to relay new ones.
///
/// Every call is one bounded request with no retry; failures surface immediately.
pub trait ChainClient: std::fmt::Debug {
    /// Looks up `txid` and the spend status of its outputs.
    ///
    /// Returns [`ChainError::NotFound`](crate::ChainError::NotFound) if the backend does not know
    /// the transaction.
    fn fetch_transaction(&self, txid: &Txid) -> ChainResult<ChainTx>;

    /// Relays `tx` to the network and returns its txid.
    fn broadcast(&self, tx: &Transaction) -> ChainResult<Txid>;
}
