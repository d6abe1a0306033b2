//! `did:plc` operation logs authorized on deterministic cell transitions.
//!
//! Three validators share one operation model:
//!
//! * [`validate_log`] folds a whole log into the resulting [`LogState`];
//! * [`registry::verify_registry_transition`] checks that a registry cell
//!   moves exactly one step along its DID's log;
//! * [`binding::verify_binding_transition`] checks that a binding cell is
//!   only ever claimed by whoever controls the DID it is transferred from.
//!
//! Every validator is pure: no I/O, no clock, no randomness. Work is
//!  metered in cycles by a [`CycleMeter`] and bounded by [`Limits`].
//!
pub mod binding;
mod cid;
mod codec;
pub mod config;
mod document;
mod error;
mod getters;
pub mod keys;
pub mod meter;
pub mod operation;
mod packer;
mod processor;
pub mod registry;

pub use cid::*;
pub use config::{Config, Limits};
pub use document::*;
pub use error::*;
pub use keys::{KeyType, PublicKey};
pub use meter::CycleMeter;
pub use operation::{OperationKind, SignedOperation};
pub use packer::*;
pub use processor::*;

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
