//! Stateless and cascading header checks.

use alloy_primitives::{keccak256, B256};
use alloy_rlp::Encodable;

use super::config::Config;
use super::constants::{EXTRA_SEAL, EXTRA_VANITY, VALIDATOR_HEADER_BYTES_LEN};
use super::error::Error;
use super::seal::{recover_signer, SigCache};
use super::snapshot::Snapshot;
use super::types::Header;
use super::validator::{difficulty, signer_succession_number};

fn empty_list_hash() -> B256 {
    let empty: Vec<u8> = Vec::new();
    let mut out = Vec::new();
    // RLP of an empty list is a single byte (0xc0); encode via alloy_rlp's list header.
    alloy_rlp::Header { list: true, payload_length: 0 }.encode(&mut out);
    let _ = empty; // kept for documentation; payload is always empty here
    keccak256(&out)
}

/// Per-header checks requiring no external state.
pub fn verify_standalone(header: &Header, cfg: &Config, now: u64) -> Result<(), Error> {
    if header.timestamp > now {
        return Err(Error::FutureBlock { header_time: header.timestamp, now });
    }
    if header.extra_data.len() < EXTRA_VANITY + EXTRA_SEAL {
        return Err(Error::MissingVanity);
    }
    if !header.mix_hash.is_zero() {
        return Err(Error::InvalidMixDigest);
    }
    if header.ommers_hash != empty_list_hash() {
        return Err(Error::InvalidUncleHash);
    }
    if header.number > 0 && header.difficulty.is_zero() {
        return Err(Error::InvalidDifficulty);
    }
    if header.gas_limit > (1u64 << 63) - 1 {
        return Err(Error::GasLimitOverflow(header.gas_limit));
    }

    let signers_len =
        header.extra_data.len() - EXTRA_VANITY - EXTRA_SEAL;
    let is_sprint_end = (header.number + 1) % cfg.sprint_at(header.number) == 0;
    if is_sprint_end {
        if signers_len % VALIDATOR_HEADER_BYTES_LEN != 0 {
            return Err(Error::InvalidSpanValidators { len: signers_len });
        }
    } else if signers_len != 0 {
        return Err(Error::ExtraValidators);
    }

    Ok(())
}

/// Checks requiring the parent header and the snapshot valid at the parent.
pub fn verify_cascading(
    header: &Header,
    parent: &Header,
    snapshot: &Snapshot,
    cfg: &Config,
    sig_cache: &SigCache,
) -> Result<(), Error> {
    let period = cfg.period_at(header.number);
    if parent.timestamp + period > header.timestamp {
        return Err(Error::InvalidTimestamp {
            parent_time: parent.timestamp,
            period,
            header_time: header.timestamp,
        });
    }

    if header.number % cfg.sprint_at(header.number) == 0 {
        let expected = expected_validator_bytes(snapshot);
        let actual = parent_validator_section(parent)?;
        if expected != actual {
            return Err(Error::MismatchingValidators { expected, actual: actual.to_vec() });
        }
    }

    let signer = recover_signer(header, cfg, sig_cache)?;
    if !snapshot.validator_set.has_address(signer) {
        return Err(Error::UnauthorizedSigner(signer));
    }
    let succession = signer_succession_number(&snapshot.validator_set, signer)?;

    let earliest = parent.timestamp + producer_delay_for(cfg, header.number, succession);
    if header.timestamp < earliest {
        return Err(Error::BlockTooSoon { header_time: header.timestamp, earliest });
    }

    let expected_difficulty = difficulty(&snapshot.validator_set, signer);
    let got_difficulty: u64 = header.difficulty.try_into().unwrap_or(u64::MAX);
    if got_difficulty != expected_difficulty {
        return Err(Error::WrongDifficulty { expected: expected_difficulty, got: got_difficulty });
    }

    Ok(())
}

fn parent_validator_section(parent: &Header) -> Result<&[u8], Error> {
    let extra = &parent.extra_data;
    if extra.len() < EXTRA_VANITY + EXTRA_SEAL {
        return Err(Error::MissingVanity);
    }
    Ok(&extra[EXTRA_VANITY..extra.len() - EXTRA_SEAL])
}

fn expected_validator_bytes(snapshot: &Snapshot) -> Vec<u8> {
    let mut out = Vec::with_capacity(snapshot.validator_set.len() * VALIDATOR_HEADER_BYTES_LEN);
    for v in snapshot.validator_set.validators() {
        out.extend_from_slice(v.address.as_slice());
        out.extend_from_slice(&[0u8; 12]);
        out.extend_from_slice(&v.voting_power.to_be_bytes());
    }
    out
}

/// `period_at(n)`, overridden by `producer_delay_at(n)` on sprint boundaries,
/// plus `succession * backup_multiplier_at(n)` seconds.
pub fn producer_delay_for(cfg: &Config, number: u64, succession: i32) -> u64 {
    let mut delay = cfg.period_at(number);
    if number % cfg.sprint_at(number) == 0 {
        delay = cfg.producer_delay_at(number);
    }
    delay + (succession as u64) * cfg.backup_multiplier_at(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config {
            sprint_schedule: [(0, 10)].into_iter().collect(),
            period_schedule: [(0, 3)].into_iter().collect(),
            producer_delay_schedule: [(0, 8)].into_iter().collect(),
            backup_multiplier_schedule: [(0, 2)].into_iter().collect(),
            jaipur_block: None,
            block_alloc: Default::default(),
            apply_balance_overrides: false,
            validator_contract_address: alloy_primitives::Address::ZERO,
            state_receiver_contract_address: alloy_primitives::Address::ZERO,
            chain_id: "1".into(),
            override_state_sync_records: Default::default(),
        }
    }

    fn clean_header(number: u64, extra_len: usize) -> Header {
        Header {
            number,
            difficulty: alloy_primitives::U256::from(1),
            ommers_hash: empty_list_hash(),
            extra_data: vec![0u8; extra_len].into(),
            ..Default::default()
        }
    }

    #[test]
    fn standalone_rejects_a_header_from_the_future() {
        let header = Header { timestamp: 100, ..clean_header(1, 32 + 65) };
        let err = verify_standalone(&header, &cfg(), 50).unwrap_err();
        assert!(matches!(err, Error::FutureBlock { .. }));
    }

    #[test]
    fn standalone_rejects_extra_data_shorter_than_vanity_plus_seal() {
        let header = clean_header(1, 96);
        let err = verify_standalone(&header, &cfg(), u64::MAX).unwrap_err();
        assert!(matches!(err, Error::MissingVanity));
    }

    #[test]
    fn standalone_rejects_non_zero_signers_section_off_a_sprint_boundary() {
        // number=1: (1+1) % 10 != 0, so any signers bytes here are illegal.
        let header = clean_header(1, 32 + 40 + 65);
        let err = verify_standalone(&header, &cfg(), u64::MAX).unwrap_err();
        assert!(matches!(err, Error::ExtraValidators));
    }

    #[test]
    fn standalone_requires_sprint_end_signers_section_to_be_40_byte_aligned() {
        // number=8: (8+1) % 9... use sprint 10: (9+1) % 10 == 0, sprint-end at number 9.
        let header = clean_header(9, 32 + 41 + 65);
        let err = verify_standalone(&header, &cfg(), u64::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidSpanValidators { len: 41 }));
    }

    #[test]
    fn standalone_accepts_a_well_formed_sprint_end_header() {
        let header = clean_header(9, 32 + 40 + 65);
        assert!(verify_standalone(&header, &cfg(), u64::MAX).is_ok());
    }

    #[test]
    fn producer_delay_overrides_period_at_sprint_boundaries_and_adds_backup_delay() {
        // number=10 is a sprint-start boundary: producer_delay_at(10)=8, not period_at=3.
        assert_eq!(producer_delay_for(&cfg(), 10, 0), 8);
        assert_eq!(producer_delay_for(&cfg(), 10, 3), 8 + 3 * 2);
        // number=11 is mid-sprint: falls back to period_at=3.
        assert_eq!(producer_delay_for(&cfg(), 11, 0), 3);
    }
}
