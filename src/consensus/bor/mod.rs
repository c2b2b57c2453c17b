//! Bor consensus engine: PoA block validation and sealing for an
//! EVM-compatible sidechain coordinated by an external "Heimdall"
//! coordinator.
//!
//! `validator`, `snapshot`, `seal`, `verifier`, `sealer`, `span`,
//! `state_sync`, `genesis_alloc`, and `engine` are the core components.
//! `snapshot_store`, `config`, `constants`, `coordinator`, `signer`, `db`,
//! `error`, and `types` are the ambient stack those components share.

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod db;
pub mod engine;
pub mod error;
pub mod genesis_alloc;
pub mod seal;
pub mod sealer;
pub mod signer;
pub mod snapshot;
pub mod snapshot_store;
pub mod span;
pub mod state_sync;
pub mod types;
pub mod validator;
pub mod verifier;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use config::Config;
pub use engine::Engine;
pub use error::Error;
pub use snapshot::Snapshot;
pub use validator::{Validator, ValidatorSet};
