//! This crate provides deterministic channel fixtures and random value generators for tests.

pub mod bitcoin;
pub mod channel;
