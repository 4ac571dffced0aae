//! Blind cooperative close of a channel neither party has state for anymore.
//!
//! Both parties receive the same [`ZombieMatch`] describing the channel. Each runs
//! [`prepare_keys`] to publish a window of candidate multisig keys and a payout address. Whoever
//! holds both [`PreparedKeys`] files runs [`make_offer`], which finds the key pair behind the
//! funding address and emits a partially signed PSBT. The other party checks it with
//! [`sign_offer`], adds the second signature and gets a transaction ready for broadcast.

mod files;
mod keys;
mod offer;
#[cfg(test)]
mod test_fixtures;

pub use files::{read_json, write_json, NodeRole, ZombieChannel, ZombieMatch, ZombieNode};
pub use keys::{prepare_keys, PreparedKeys, DEFAULT_MULTISIG_KEY_COUNT};
pub use offer::{make_offer, sign_offer, FeePayer, Offer, OfferState, OfferTerms};
