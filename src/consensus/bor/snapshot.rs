//! Point-in-time validator-set state at `(number, hash)`.

use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::config::Config;
use super::constants::EXTRA_SEAL;
use super::error::Error;
use super::seal::{recover_signer, SigCache};
use super::types::{BlockNumber, Header};
use super::validator::{signer_succession_number, Validator, ValidatorChange, ValidatorSet};

/// Authority state after the header at `(number, hash)` has been applied.
///
/// The chain config and signature cache are threaded through `apply` as
/// parameters instead of being struct fields, so this type stays a plain,
/// directly-`serde`-able value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub number: BlockNumber,
    pub hash: B256,
    #[serde(rename = "validatorSet")]
    pub validator_set: ValidatorSet,
    /// `recents[n] = a` means validator `a` signed block `n`.
    pub recents: BTreeMap<BlockNumber, Address>,
}

impl Snapshot {
    pub fn new(number: BlockNumber, hash: B256, validator_set: ValidatorSet) -> Self {
        Self { number, hash, validator_set, recents: BTreeMap::new() }
    }

    /// Deep clones validators (independently mutable priorities) and
    /// shallow-clones the recents map -- both are plain owned collections in
    /// this representation, so `Clone` already gives the right semantics.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Applies a contiguous run of headers, continuing from `self.number + 1`.
    pub fn apply(&self, cfg: &Config, sig_cache: &SigCache, headers: &[Header]) -> Result<Self, Error> {
        if headers.is_empty() {
            return Ok(self.copy());
        }
        let from = headers[0].number;
        let to = headers[headers.len() - 1].number;
        if from != self.number + 1 {
            return Err(Error::OutOfRangeChain { at: self.number, from, to });
        }
        for w in headers.windows(2) {
            if w[1].number != w[0].number + 1 {
                return Err(Error::OutOfRangeChain { at: self.number, from, to });
            }
        }

        let mut snap = self.copy();
        for header in headers {
            let n = header.number;

            // 1. Garbage-collect recents outside the current sprint window.
            let sprint = cfg.sprint_at(n);
            if n >= sprint {
                snap.recents.remove(&(n - sprint));
            }

            // 2. Recover signer and require membership.
            let signer = recover_signer(header, cfg, sig_cache)?;
            if !snap.validator_set.has_address(signer) {
                return Err(Error::UnauthorizedSigner(signer));
            }
            if snap.recents.values().any(|recent| *recent == signer) {
                return Err(Error::RecentlySigned(signer));
            }

            // 3. Compute signer-succession number (also validates authority).
            let _ = signer_succession_number(&snap.validator_set, signer)?;

            // 4. Record the signer for this block.
            snap.recents.insert(n, signer);

            // 5. Sprint-boundary validator-set rotation.
            if n > 0 && (n + 1) % cfg.sprint_at(n) == 0 {
                if let Some(new_from_header) = parse_validator_bytes(header)? {
                    snap.validator_set =
                        get_updated_validator_set(&snap.validator_set, &new_from_header)?;
                    snap.validator_set.increment_proposer_priority(1)?;
                }
            }
        }

        snap.number = self.number + headers.len() as u64;
        snap.hash = headers[headers.len() - 1].hash_slow();
        Ok(snap)
    }
}

/// Parses the validators section out of a sprint-end header's extra-data.
fn parse_validator_bytes(header: &Header) -> Result<Option<Vec<(Address, i64)>>, Error> {
    use super::constants::{EXTRA_VANITY, VALIDATOR_HEADER_BYTES_LEN};

    let extra = &header.extra_data;
    if extra.len() < EXTRA_VANITY + EXTRA_SEAL {
        return Err(Error::MissingVanity);
    }
    let section = &extra[EXTRA_VANITY..extra.len() - EXTRA_SEAL];
    if section.is_empty() {
        return Ok(None);
    }
    if section.len() % VALIDATOR_HEADER_BYTES_LEN != 0 {
        return Err(Error::InvalidSpanValidators { len: section.len() });
    }
    let mut out = Vec::with_capacity(section.len() / VALIDATOR_HEADER_BYTES_LEN);
    for chunk in section.chunks_exact(VALIDATOR_HEADER_BYTES_LEN) {
        let address = Address::from_slice(&chunk[..20]);
        let mut power_bytes = [0u8; 8];
        power_bytes.copy_from_slice(&chunk[32..40]);
        let power = i64::from_be_bytes(power_bytes);
        out.push((address, power));
    }
    Ok(Some(out))
}

/// For each old validator, adopt its voting power from `new_from_header` if
/// present there, else set it to zero (implicit removal); then append
/// members of `new_from_header` absent from `old`.
pub fn get_updated_validator_set(
    old: &ValidatorSet,
    new_from_header: &[(Address, i64)],
) -> Result<ValidatorSet, Error> {
    let mut changes = Vec::new();
    for v in old.validators() {
        let power = new_from_header
            .iter()
            .find(|(a, _)| *a == v.address)
            .map(|(_, p)| *p)
            .unwrap_or(0);
        changes.push(ValidatorChange { address: v.address, voting_power: power });
    }
    for (address, power) in new_from_header {
        if old.get_by_address(*address).is_none() {
            changes.push(ValidatorChange { address: *address, voting_power: *power });
        }
    }

    let mut next = old.clone();
    next.update_with_change_set(changes)?;
    Ok(next)
}

/// Builds the initial snapshot from the coordinator-provided genesis validator set.
pub fn genesis_snapshot(
    hash: B256,
    validators: Vec<Validator>,
) -> Result<Snapshot, Error> {
    let set = ValidatorSet::new_set(validators)?;
    Ok(Snapshot::new(0, hash, set))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_updated_validator_set_drops_absent_members_and_adds_new_ones() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let c = Address::repeat_byte(3);
        let old = ValidatorSet::new_set(vec![Validator::new(a, 10), Validator::new(b, 10)]).unwrap();

        // b drops out, c joins.
        let new_from_header = vec![(a, 10), (c, 10)];
        let updated = get_updated_validator_set(&old, &new_from_header).unwrap();

        assert!(updated.has_address(a));
        assert!(!updated.has_address(b));
        assert!(updated.has_address(c));
    }

    fn test_config() -> Config {
        Config {
            sprint_schedule: [(0, 64)].into_iter().collect(),
            period_schedule: Default::default(),
            producer_delay_schedule: Default::default(),
            backup_multiplier_schedule: Default::default(),
            jaipur_block: None,
            block_alloc: Default::default(),
            apply_balance_overrides: false,
            validator_contract_address: Address::ZERO,
            state_receiver_contract_address: Address::ZERO,
            chain_id: "1".into(),
            override_state_sync_records: Default::default(),
        }
    }

    fn signed_header(
        number: u64,
        parent_hash: B256,
        cfg: &Config,
        secret: &secp256k1::SecretKey,
    ) -> Header {
        use super::super::constants::{EXTRA_SEAL, EXTRA_VANITY};
        use alloy_primitives::keccak256;
        use secp256k1::{Message, SECP256K1};

        let mut header = Header {
            number,
            parent_hash,
            difficulty: alloy_primitives::U256::from(1),
            ommers_hash: keccak256(&[0xc0u8][..]),
            extra_data: vec![0u8; EXTRA_VANITY + EXTRA_SEAL].into(),
            ..Default::default()
        };
        let hash = super::super::seal::seal_hash(&header, cfg).unwrap();
        let message = Message::from_digest_slice(hash.as_slice()).unwrap();
        let recoverable = SECP256K1.sign_ecdsa_recoverable(&message, secret);
        let (recovery_id, sig) = recoverable.serialize_compact();

        let mut extra = header.extra_data.to_vec();
        let start = extra.len() - EXTRA_SEAL;
        extra[start..start + 64].copy_from_slice(&sig);
        extra[start + 64] = recovery_id.to_i32() as u8;
        header.extra_data = extra.into();
        header
    }

    fn address_of(secret: &secp256k1::SecretKey) -> Address {
        use alloy_primitives::keccak256;
        let public = secp256k1::PublicKey::from_secret_key(secp256k1::SECP256K1, secret);
        Address::from_slice(&keccak256(&public.serialize_uncompressed()[1..])[12..])
    }

    #[test]
    fn apply_rejects_a_signer_still_inside_the_sprint_window() {
        let cfg = test_config();
        let sig_cache = SigCache::new();

        let secret_a = secp256k1::SecretKey::from_slice(&[3u8; 32]).unwrap();
        let secret_b = secp256k1::SecretKey::from_slice(&[4u8; 32]).unwrap();
        let a = address_of(&secret_a);
        let b = address_of(&secret_b);
        let set = ValidatorSet::new_set(vec![Validator::new(a, 10), Validator::new(b, 10)]).unwrap();

        let genesis_hash = B256::repeat_byte(0xEF);
        let snapshot = Snapshot::new(0, genesis_hash, set);

        let header1 = signed_header(1, genesis_hash, &cfg, &secret_a);
        let hash1 = header1.hash_slow();
        // `a` signs block 2 as well, well inside the 64-block sprint window.
        let header2 = signed_header(2, hash1, &cfg, &secret_a);

        let err = snapshot.apply(&cfg, &sig_cache, &[header1, header2]).unwrap_err();
        assert!(matches!(err, Error::RecentlySigned(addr) if addr == a));
    }

    #[test]
    fn apply_accepts_rotating_signers_inside_the_sprint_window() {
        let cfg = test_config();
        let sig_cache = SigCache::new();

        let secret_a = secp256k1::SecretKey::from_slice(&[5u8; 32]).unwrap();
        let secret_b = secp256k1::SecretKey::from_slice(&[6u8; 32]).unwrap();
        let a = address_of(&secret_a);
        let b = address_of(&secret_b);
        let set = ValidatorSet::new_set(vec![Validator::new(a, 10), Validator::new(b, 10)]).unwrap();

        let genesis_hash = B256::repeat_byte(0xFE);
        let snapshot = Snapshot::new(0, genesis_hash, set);

        let header1 = signed_header(1, genesis_hash, &cfg, &secret_a);
        let hash1 = header1.hash_slow();
        let header2 = signed_header(2, hash1, &cfg, &secret_b);

        let next = snapshot.apply(&cfg, &sig_cache, &[header1, header2]).unwrap();
        assert_eq!(next.recents.len(), 2);
    }
}
