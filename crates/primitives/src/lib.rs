//! This crate contains the data model, scripts and pure key arithmetic shared by every part of
//! the recovery tooling.
//!
//! It lies at the bottom of the crate-hierarchy in this workspace i.e., it does not depend on any
//! other crate in this workspace. Nothing in here touches private key *derivation*; that lives in
//! `lnrescue-key-deriv`.

pub mod channel;
pub mod errors;
pub mod keys;
pub mod scripts;
pub mod serde_utils;
pub mod shachain;
pub mod tweak;
