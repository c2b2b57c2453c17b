//! `bor_consensus`: a Proof-of-Authority block validation and sealing engine
//! for an EVM-compatible sidechain coordinated by an external "Heimdall"
//! coordinator.
//!
//! This is a library crate with no CLI, node bootstrap, EVM execution, P2P,
//! or chain database of its own -- those stay behind the trait seams
//! [`consensus::bor::coordinator`] and [`consensus::bor::db`] expose, for a
//! host node to wire up.

pub mod consensus;

pub use consensus::bor::{Config, Engine, Error, Snapshot, Validator, ValidatorSet};
