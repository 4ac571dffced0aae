//! Access to the blockchain for the recovery tooling.
//!
//! Everything the recovery engines need from the chain goes through the [`ChainClient`] trait:
//! looking up a transaction together with the spend status of its outputs, and broadcasting a
//! transaction. [`EsploraChainClient`] implements it against an Esplora REST endpoint, and
//! [`InMemoryChainClient`] backs tests.

pub mod errors;
pub mod esplora;
pub mod inmemory;
pub mod traits;

pub use errors::{ChainError, ChainResult};
pub use esplora::EsploraChainClient;
pub use inmemory::InMemoryChainClient;
pub use traits::{ChainClient, ChainTx, SpendStatus};
