//! Signing of channel outputs.
//!
//! A [`SignDescriptor`] captures everything needed to sign one input: which key, which tweak,
//! which script and which output is being spent. The [`Signer`] turns a descriptor into a raw
//! signature using a [`KeyRing`](lnrescue_key_deriv::KeyRing), and the [`witness`] module
//! assembles raw signatures into complete witnesses.

pub mod descriptor;
pub mod errors;
pub mod sighash;
pub mod signer;
pub mod witness;

pub use descriptor::{SignDescriptor, SignMethod, Tweak};
pub use errors::{SignerError, SignerResult};
pub use signer::{RawSignature, Signer};
