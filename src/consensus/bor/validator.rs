//! Validator and `ValidatorSet`: ordered signers with voting power and
//! round-robin proposer priority.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::constants::MAX_TOTAL_VOTING_POWER;
use super::error::Error;

/// A single member of a validator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub voting_power: i64,
    pub proposer_priority: i64,
}

impl Validator {
    pub fn new(address: Address, voting_power: i64) -> Self {
        Self { address, voting_power, proposer_priority: 0 }
    }
}

/// An ordered (by address) set of validators with a current proposer.
///
/// `total_voting_power` is a cache derived from `validators`: it is never
/// persisted (see the hand-written `Serialize`/`Deserialize` impls below) and
/// is recomputed -- re-validating the total-voting-power bound in the
/// process -- every time a set is rebuilt from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
    total_voting_power: i64,
}

/// The on-wire shape of a `ValidatorSet`: adds the `proposer` address spec
/// §6 lists alongside `validators`, and omits the `total_voting_power`
/// cache entirely.
#[derive(Serialize, Deserialize)]
struct ValidatorSetWire {
    validators: Vec<Validator>,
    proposer: Address,
}

impl Serialize for ValidatorSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let proposer = self.proposer().map(|v| v.address).unwrap_or(Address::ZERO);
        ValidatorSetWire { validators: self.validators.clone(), proposer }.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValidatorSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wire = ValidatorSetWire::deserialize(deserializer)?;
        // Rebuild the cache and validate bounds instead of trusting whatever
        // was on disk, per spec.md §6 ("repopulate caches and validate
        // bounds" on load). `wire.proposer` is redundant with the persisted
        // `proposer_priority` values -- the current proposer is always
        // recomputed from those, not trusted off the wire -- so it is read
        // here only to satisfy the schema and then dropped.
        let total_voting_power =
            Self::sum_voting_power(&wire.validators).map_err(serde::de::Error::custom)?;
        Ok(Self { validators: wire.validators, total_voting_power })
    }
}

/// A pending change to a validator set: `voting_power > 0` is an add/update,
/// `voting_power == 0` is a removal.
#[derive(Debug, Clone)]
pub struct ValidatorChange {
    pub address: Address,
    pub voting_power: i64,
}

impl ValidatorSet {
    /// Builds a new set from unsorted, duplicate-free validators, sorts by
    /// address, and elects an initial proposer. Duplicate addresses are a
    /// caller precondition violation, not a recoverable input error.
    pub fn new_set(mut validators: Vec<Validator>) -> Result<Self, Error> {
        validators.sort_by_key(|v| v.address);
        for w in validators.windows(2) {
            if w[0].address == w[1].address {
                return Err(Error::DuplicateValidator(w[0].address));
            }
        }
        let total_voting_power = Self::sum_voting_power(&validators)?;
        let mut set = Self { validators, total_voting_power };
        if !set.validators.is_empty() {
            set.increment_proposer_priority(1)?;
        }
        Ok(set)
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn total_voting_power(&self) -> i64 {
        self.total_voting_power
    }

    pub fn has_address(&self, address: Address) -> bool {
        self.validators.binary_search_by_key(&address, |v| v.address).is_ok()
    }

    pub fn get_by_address(&self, address: Address) -> Option<(usize, &Validator)> {
        let idx = self.validators.binary_search_by_key(&address, |v| v.address).ok()?;
        Some((idx, &self.validators[idx]))
    }

    /// The validator with the greatest proposer priority, ties broken by the
    /// lexicographically smaller address. Two distinct validators tying on
    /// both fields would mean the set holds a duplicate address, which
    /// `new_set`/`update_with_change_set` already reject -- reaching that
    /// state here means upstream state is corrupt.
    pub fn proposer(&self) -> Result<&Validator, Error> {
        self.validators
            .iter()
            .reduce(|best, candidate| {
                match candidate.proposer_priority.cmp(&best.proposer_priority) {
                    std::cmp::Ordering::Greater => candidate,
                    std::cmp::Ordering::Less => best,
                    std::cmp::Ordering::Equal => {
                        debug_assert_ne!(
                            candidate.address, best.address,
                            "validator set contains a duplicate address"
                        );
                        if candidate.address < best.address { candidate } else { best }
                    }
                }
            })
            .ok_or(Error::ProposerNotFound)
    }

    fn sum_voting_power(validators: &[Validator]) -> Result<i64, Error> {
        let mut total: i64 = 0;
        for v in validators {
            if v.voting_power < 0 {
                return Err(Error::NegativeVotingPower(v.address));
            }
            total = total.saturating_add(v.voting_power);
            if total > MAX_TOTAL_VOTING_POWER {
                return Err(Error::TotalVotingPowerExceeded {
                    total,
                    max: MAX_TOTAL_VOTING_POWER,
                });
            }
        }
        Ok(total)
    }

    /// Rescales priorities in-place so `max - min <= 2 * total_voting_power`.
    fn rescale_priorities(&mut self) {
        if self.validators.is_empty() {
            return;
        }
        let diff_max = 2 * self.total_voting_power.max(1);
        let (min, max) = self.validators.iter().fold(
            (i64::MAX, i64::MIN),
            |(min, max), v| (min.min(v.proposer_priority), max.max(v.proposer_priority)),
        );
        let diff = max.saturating_sub(min);
        if diff > diff_max {
            // integer ceil of diff / diff_max
            let ratio = (diff + diff_max - 1) / diff_max;
            for v in &mut self.validators {
                v.proposer_priority /= ratio;
            }
        }
    }

    /// Subtracts the mean priority from every validator so the average is zero.
    fn shift_to_mean_zero(&mut self) {
        if self.validators.is_empty() {
            return;
        }
        let sum: i64 = self.validators.iter().map(|v| v.proposer_priority).sum();
        let avg = sum / self.validators.len() as i64;
        if avg != 0 {
            for v in &mut self.validators {
                v.proposer_priority = v.proposer_priority.saturating_sub(avg);
            }
        }
    }

    /// Runs `times` rounds of the proposer-priority round-robin, electing a
    /// proposer each round. All arithmetic saturates at `i64` bounds.
    pub fn increment_proposer_priority(&mut self, times: u32) -> Result<(), Error> {
        debug_assert!(times > 0, "increment_proposer_priority requires times > 0");
        if self.validators.is_empty() {
            return Ok(());
        }
        self.rescale_priorities();
        self.shift_to_mean_zero();

        for _ in 0..times {
            for v in &mut self.validators {
                v.proposer_priority = v.proposer_priority.saturating_add(v.voting_power);
            }
            let winner_idx = self
                .validators
                .iter()
                .enumerate()
                .reduce(|(bi, best), (ci, candidate)| {
                    match candidate.proposer_priority.cmp(&best.proposer_priority) {
                        std::cmp::Ordering::Greater => (ci, candidate),
                        std::cmp::Ordering::Less => (bi, best),
                        std::cmp::Ordering::Equal => {
                            if candidate.address < best.address { (ci, candidate) } else { (bi, best) }
                        }
                    }
                })
                .map(|(i, _)| i)
                .expect("non-empty set");
            self.validators[winner_idx].proposer_priority = self.validators[winner_idx]
                .proposer_priority
                .saturating_sub(self.total_voting_power);
        }
        Ok(())
    }

    /// Applies a change set of adds/updates/removals.
    pub fn update_with_change_set(&mut self, changes: Vec<ValidatorChange>) -> Result<(), Error> {
        let mut changes = changes;
        changes.sort_by_key(|c| c.address);
        for w in changes.windows(2) {
            if w[0].address == w[1].address {
                return Err(Error::DuplicateValidator(w[0].address));
            }
        }
        for c in &changes {
            if c.voting_power < 0 {
                return Err(Error::NegativeVotingPower(c.address));
            }
        }

        let (updates, removals): (Vec<_>, Vec<_>) =
            changes.into_iter().partition(|c| c.voting_power > 0);

        for r in &removals {
            if !self.has_address(r.address) {
                return Err(Error::ValidatorNotFound(r.address));
            }
        }

        // Project the resulting total voting power before mutating anything.
        let mut projected = self.total_voting_power;
        for u in &updates {
            match self.get_by_address(u.address) {
                Some((_, existing)) => {
                    projected = projected.saturating_sub(existing.voting_power).saturating_add(u.voting_power);
                }
                None => {
                    projected = projected.saturating_add(u.voting_power);
                }
            }
        }
        for r in &removals {
            if let Some((_, existing)) = self.get_by_address(r.address) {
                projected = projected.saturating_sub(existing.voting_power);
            }
        }
        if projected > MAX_TOTAL_VOTING_POWER {
            return Err(Error::TotalVotingPowerExceeded { total: projected, max: MAX_TOTAL_VOTING_POWER });
        }

        let new_member_priority = -(self.total_voting_power.saturating_add(self.total_voting_power >> 3));

        for u in &updates {
            match self.validators.binary_search_by_key(&u.address, |v| v.address) {
                Ok(idx) => self.validators[idx].voting_power = u.voting_power,
                Err(idx) => self.validators.insert(
                    idx,
                    Validator {
                        address: u.address,
                        voting_power: u.voting_power,
                        proposer_priority: new_member_priority,
                    },
                ),
            }
        }
        for r in &removals {
            if let Ok(idx) = self.validators.binary_search_by_key(&r.address, |v| v.address) {
                self.validators.remove(idx);
            }
        }

        self.total_voting_power = Self::sum_voting_power(&self.validators)?;
        self.rescale_priorities();
        self.shift_to_mean_zero();
        Ok(())
    }
}

/// Returns `signer`'s position relative to the in-turn proposer in sorted
/// validator order: `(signer_index - proposer_index) mod N`. Zero means
/// `signer` is the in-turn proposer.
pub fn signer_succession_number(set: &ValidatorSet, signer: Address) -> Result<i32, Error> {
    let proposer = set.proposer()?;
    let (proposer_idx, _) =
        set.get_by_address(proposer.address).ok_or(Error::UnauthorizedProposer(proposer.address))?;
    let (signer_idx, _) = set.get_by_address(signer).ok_or(Error::UnauthorizedSigner(signer))?;

    let n = set.len() as i32;
    let succession = (signer_idx as i32 - proposer_idx as i32).rem_euclid(n);
    Ok(succession)
}

/// `N - succession`; larger means more in-turn. A default/empty signer
/// address returns the sentinel value `1`.
pub fn difficulty(set: &ValidatorSet, signer: Address) -> u64 {
    if signer.is_zero() {
        return 1;
    }
    match signer_succession_number(set, signer) {
        Ok(succession) => (set.len() as u64).saturating_sub(succession as u64),
        Err(_) => 1,
    }
}
