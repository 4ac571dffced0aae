//! Builders for the scripts and outputs that appear in funding and commitment transactions.

pub mod commitment;
pub mod funding;
pub mod general;
pub mod taproot;
