//! End-to-end genesis-alloc patch scenario: a literal block-by-block
//! code-override trace across six blocks.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{Address, Bytes, U256};
use bor_consensus::consensus::bor::config::Config;
use bor_consensus::consensus::bor::genesis_alloc::{AccountWriter, GenesisAllocPatcher};
use bor_consensus::consensus::bor::types::GenesisAllocOverride;

#[derive(Default)]
struct MemAccountWriter {
    code: HashMap<Address, Bytes>,
    balance: HashMap<Address, U256>,
}

impl AccountWriter for MemAccountWriter {
    fn set_code(&mut self, address: Address, code: Bytes) {
        self.code.insert(address, code);
    }

    fn set_balance(&mut self, address: Address, balance: U256) {
        self.balance.insert(address, balance);
    }
}

fn config(block_alloc: BTreeMap<String, BTreeMap<Address, GenesisAllocOverride>>) -> Config {
    Config {
        sprint_schedule: [(0, 10)].into_iter().collect(),
        period_schedule: Default::default(),
        producer_delay_schedule: Default::default(),
        backup_multiplier_schedule: Default::default(),
        jaipur_block: None,
        block_alloc,
        apply_balance_overrides: false,
        validator_contract_address: Address::ZERO,
        state_receiver_contract_address: Address::ZERO,
        chain_id: "1".into(),
        override_state_sync_records: Default::default(),
    }
}

fn overrides(a: Address) -> BTreeMap<String, BTreeMap<Address, GenesisAllocOverride>> {
    let mut table = BTreeMap::new();
    table.insert(
        "2".to_string(),
        [(a, GenesisAllocOverride { code: Bytes::from_static(&[0x01, 0x02]), balance: U256::ZERO })]
            .into_iter()
            .collect(),
    );
    table.insert(
        "4".to_string(),
        [(a, GenesisAllocOverride { code: Bytes::from_static(&[0x01, 0x03]), balance: U256::from(0x1000u64) })]
            .into_iter()
            .collect(),
    );
    table.insert(
        "6".to_string(),
        [(a, GenesisAllocOverride { code: Bytes::from_static(&[0x01, 0x04]), balance: U256::from(0x2000u64) })]
            .into_iter()
            .collect(),
    );
    table
}

#[test]
fn code_reads_follow_the_literal_trace_across_blocks_one_through_six() {
    let a = Address::repeat_byte(0xAA);
    let cfg = config(overrides(a));
    let patcher = GenesisAllocPatcher::new(&cfg);

    let mut writer = MemAccountWriter::default();
    // Genesis state, before any block is finalized.
    writer.set_code(a, Bytes::from_static(&[0x01, 0x01]));

    let expected_code_after_each_block: [&[u8]; 6] =
        [&[0x01, 0x01], &[0x01, 0x02], &[0x01, 0x02], &[0x01, 0x03], &[0x01, 0x03], &[0x01, 0x04]];

    for (i, expected) in expected_code_after_each_block.iter().enumerate() {
        let block = (i + 1) as u64;
        patcher.apply(block, &mut writer);
        assert_eq!(writer.code.get(&a).unwrap().as_ref(), *expected, "mismatch after block {block}");
    }
}

#[test]
fn balance_overrides_are_gated_by_the_documented_configuration_flag() {
    let a = Address::repeat_byte(0xAA);

    let mut cfg = config(overrides(a));
    cfg.apply_balance_overrides = false;
    let mut writer = MemAccountWriter::default();
    GenesisAllocPatcher::new(&cfg).apply(4, &mut writer);
    assert!(writer.balance.get(&a).is_none());

    cfg.apply_balance_overrides = true;
    let mut writer = MemAccountWriter::default();
    GenesisAllocPatcher::new(&cfg).apply(4, &mut writer);
    assert_eq!(writer.balance.get(&a).copied(), Some(U256::from(0x1000u64)));
}
