//! Read-only access to channel state exported from a node's database.
//!
//! The recovery engines only ever read channel records; they never open a node's key-value
//! store directly. [`ChannelStore`](traits::ChannelStore) abstracts over where the records come
//! from.

pub mod errors;
pub mod inmemory;
pub mod json;
pub mod traits;

pub use errors::{DbResult, StoreError};
pub use inmemory::InMemoryChannelStore;
pub use json::{ChannelDump, JsonChannelStore};
pub use traits::ChannelStore;
