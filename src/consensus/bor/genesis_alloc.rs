//! Applies hard-coded code/balance overrides at Finalize time.
//!
//! A table of patches keyed by block number, looked up once per block and
//! applied if present.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, U256};

use super::config::Config;
use super::types::GenesisAllocOverride;

/// Write target the patcher applies overrides through. The account-state
/// layer itself is out of scope; callers supply an implementation backed by
/// their EVM state database.
pub trait AccountWriter {
    fn set_code(&mut self, address: Address, code: Bytes);
    fn set_balance(&mut self, address: Address, balance: U256);
}

/// Looks up and applies `Config::block_alloc` overrides for a single block.
pub struct GenesisAllocPatcher<'a> {
    cfg: &'a Config,
}

impl<'a> GenesisAllocPatcher<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self { cfg }
    }

    /// Applies every override registered for `block_number`, if any. Code is
    /// always overwritten; balance only when `apply_balance_overrides` is set
    /// (see `DESIGN.md`'s Open Question decision).
    pub fn apply(&self, block_number: u64, writer: &mut impl AccountWriter) {
        let Some(overrides) = self.overrides_at(block_number) else {
            return;
        };
        for (address, over) in overrides {
            writer.set_code(*address, over.code.clone());
            if self.cfg.apply_balance_overrides {
                writer.set_balance(*address, over.balance);
            }
        }
    }

    fn overrides_at(&self, block_number: u64) -> Option<&BTreeMap<Address, GenesisAllocOverride>> {
        self.cfg.block_alloc.get(&block_number.to_string())
    }
}
