//! The recovery engines.
//!
//! - [`force_close`] signs the latest local commitment of every open channel in a
//!   [`ChannelStore`](lnrescue_db::ChannelStore).
//! - [`scb_close`] does the same from static channel backups only.
//! - [`sweep`] spends the time-locked to-local outputs of published force closes.
//! - [`zombie`] is the file-exchange protocol two parties use to close a channel that neither of
//!   them has state for anymore.
//!
//! Force closes share one signing core in [`commitment`] and record their results as
//! [`ForceCloseSummary`](summary::ForceCloseSummary) entries in append-only result files.

pub mod commitment;
pub mod errors;
pub mod force_close;
pub mod scb_close;
pub mod summary;
pub mod sweep;
pub mod zombie;

pub use errors::{RecoveryError, RecoveryResult};
