//! Lock-free authorized-signer cell.
//!
//! An atomic pointer storing `{address, sign_fn}`: readers on the hot path
//! (the sealer, checking whether it is the signer on duty) never block on a
//! lock, and publishing a new signer is a single atomic swap.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use arc_swap::ArcSwapOption;

use super::error::Error;

/// A 65-byte secp256k1 recoverable signature over a seal hash.
pub type SealSignature = [u8; 65];

/// Callback that signs a seal hash on behalf of the authorized signer.
pub trait SignFn: Send + Sync {
    fn sign(&self, hash: B256) -> Result<SealSignature, Error>;
}

impl<F> SignFn for F
where
    F: Fn(B256) -> Result<SealSignature, Error> + Send + Sync,
{
    fn sign(&self, hash: B256) -> Result<SealSignature, Error> {
        self(hash)
    }
}

struct SignerHandle {
    address: Address,
    sign_fn: Arc<dyn SignFn>,
}

/// Atomically-swappable cell holding the node's current authorized signer,
/// if any.
#[derive(Default)]
pub struct SignerCell {
    inner: ArcSwapOption<SignerHandle>,
}

impl SignerCell {
    pub fn new() -> Self {
        Self { inner: ArcSwapOption::empty() }
    }

    /// Publishes a new authorized signer. Readers observe this atomically.
    pub fn set(&self, address: Address, sign_fn: Arc<dyn SignFn>) {
        self.inner.store(Some(Arc::new(SignerHandle { address, sign_fn })));
    }

    pub fn clear(&self) {
        self.inner.store(None);
    }

    pub fn address(&self) -> Option<Address> {
        self.inner.load().as_ref().map(|h| h.address)
    }

    pub fn sign(&self, hash: B256) -> Result<SealSignature, Error> {
        let guard = self.inner.load();
        let handle = guard.as_ref().ok_or(Error::UnauthorizedSigner(Address::ZERO))?;
        handle.sign_fn.sign(hash)
    }
}
