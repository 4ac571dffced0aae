//! Behavior shared by the recovery tooling that does not belong to any one engine.

pub mod logging;
