//! Seal-hash computation and signature recovery.
//!
//! The seal hash is the Keccak-256 of the header's canonical RLP encoding
//! over a fixed field subset (manual payload-length summation, then
//! field-by-field encode), with the base-fee field included or omitted by
//! the `jaipur_block` fork boundary.

use alloy_primitives::{keccak256, Address, B256};
use alloy_rlp::Encodable;
use parking_lot::Mutex;
use schnellru::{ByLength, LruMap};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SECP256K1};

use super::config::Config;
use super::constants::{EXTRA_SEAL, EXTRA_VANITY, IN_MEMORY_SIGNATURES};
use super::error::Error;
use super::types::Header;

/// Bounded LRU caching seal-hash -> recovered signer address.
pub struct SigCache {
    inner: Mutex<LruMap<B256, Address, ByLength>>,
}

impl SigCache {
    pub fn new() -> Self {
        Self { inner: Mutex::new(LruMap::new(ByLength::new(IN_MEMORY_SIGNATURES))) }
    }
}

impl Default for SigCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the Keccak-256 seal-hash over the canonical header-field subset.
pub fn seal_hash(header: &Header, cfg: &Config) -> Result<B256, Error> {
    let mut out = Vec::new();
    encode_seal_fields(header, cfg, &mut out)?;
    Ok(keccak256(&out))
}

fn include_base_fee(header: &Header, cfg: &Config) -> bool {
    cfg.is_jaipur_active(header.number) && header.base_fee_per_gas.is_some()
}

fn signable_extra(header: &Header) -> Result<&[u8], Error> {
    let extra = &header.extra_data;
    if extra.len() < EXTRA_SEAL {
        return Err(Error::MissingSignature);
    }
    Ok(&extra[..extra.len() - EXTRA_SEAL])
}

fn rlp_header(header: &Header, cfg: &Config) -> Result<alloy_rlp::Header, Error> {
    let signable = signable_extra(header)?;
    let mut head = alloy_rlp::Header { list: true, payload_length: 0 };
    head.payload_length += header.parent_hash.length();
    head.payload_length += header.ommers_hash.length();
    head.payload_length += header.beneficiary.length();
    head.payload_length += header.state_root.length();
    head.payload_length += header.transactions_root.length();
    head.payload_length += header.receipts_root.length();
    head.payload_length += header.logs_bloom.length();
    head.payload_length += header.difficulty.length();
    head.payload_length += header.number.length();
    head.payload_length += header.gas_limit.length();
    head.payload_length += header.gas_used.length();
    head.payload_length += header.timestamp.length();
    head.payload_length += signable.length();
    head.payload_length += header.mix_hash.length();
    head.payload_length += header.nonce.length();
    if include_base_fee(header, cfg) {
        head.payload_length += header.base_fee_per_gas.unwrap().length();
    }
    Ok(head)
}

fn encode_seal_fields(header: &Header, cfg: &Config, out: &mut Vec<u8>) -> Result<(), Error> {
    let signable = signable_extra(header)?;
    rlp_header(header, cfg)?.encode(out);
    header.parent_hash.encode(out);
    header.ommers_hash.encode(out);
    header.beneficiary.encode(out);
    header.state_root.encode(out);
    header.transactions_root.encode(out);
    header.receipts_root.encode(out);
    header.logs_bloom.encode(out);
    header.difficulty.encode(out);
    header.number.encode(out);
    header.gas_limit.encode(out);
    header.gas_used.encode(out);
    header.timestamp.encode(out);
    signable.encode(out);
    header.mix_hash.encode(out);
    header.nonce.encode(out);
    if include_base_fee(header, cfg) {
        header.base_fee_per_gas.unwrap().encode(out);
    }
    Ok(())
}

/// Recovers the signer address from the last 65 bytes of `header.extra`,
/// caching the result by seal hash.
pub fn recover_signer(header: &Header, cfg: &Config, cache: &SigCache) -> Result<Address, Error> {
    let hash = seal_hash(header, cfg)?;

    if let Some(addr) = cache.inner.lock().get(&hash) {
        return Ok(*addr);
    }

    let extra = &header.extra_data;
    if extra.len() < EXTRA_VANITY + EXTRA_SEAL {
        return Err(Error::MissingSignature);
    }
    let sig_offset = extra.len() - EXTRA_SEAL;
    let recovery_byte = extra[sig_offset + EXTRA_SEAL - 1] as i32;
    let sig_bytes = &extra[sig_offset..sig_offset + EXTRA_SEAL - 1];

    let recovery_id = RecoveryId::try_from(recovery_byte).map_err(|_| Error::RecoverEcdsa)?;
    let signature =
        RecoverableSignature::from_compact(sig_bytes, recovery_id).map_err(|_| Error::RecoverEcdsa)?;
    let message = Message::from_digest_slice(hash.as_slice()).map_err(|_| Error::RecoverEcdsa)?;
    let public_key = SECP256K1.recover_ecdsa(&message, &signature).map_err(|_| Error::RecoverEcdsa)?;
    let address = Address::from_slice(&keccak256(&public_key.serialize_uncompressed()[1..])[12..]);

    cache.inner.lock().insert(hash, address);
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::Header as ConsensusHeader;

    fn base_config() -> Config {
        Config {
            sprint_schedule: Default::default(),
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

    fn header_with_extra(extra_len: usize, number: u64) -> ConsensusHeader {
        let mut header = ConsensusHeader::default();
        header.number = number;
        header.extra_data = vec![0u8; extra_len].into();
        header
    }

    #[test]
    fn seal_hash_matches_reference_vector_without_base_fee() {
        let header = header_with_extra(EXTRA_VANITY + EXTRA_SEAL, 1);
        let cfg = base_config();
        let hash = seal_hash(&header, &cfg).unwrap();
        assert_eq!(
            format!("{hash:#x}"),
            "0x1be13e83939b3c4701ee57a34e10c9290ce07b0e53af0fe90b812c6881826e36"
        );
    }

    #[test]
    fn seal_hash_with_base_fee_unaffected_when_jaipur_not_active() {
        let mut header = header_with_extra(EXTRA_VANITY + EXTRA_SEAL, 1);
        header.base_fee_per_gas = Some(2);
        let mut cfg = base_config();
        cfg.jaipur_block = Some(2); // activates above this header's number
        let hash = seal_hash(&header, &cfg).unwrap();
        assert_eq!(
            format!("{hash:#x}"),
            "0x1be13e83939b3c4701ee57a34e10c9290ce07b0e53af0fe90b812c6881826e36"
        );
    }

    #[test]
    fn seal_hash_includes_base_fee_once_jaipur_is_active() {
        let mut header = header_with_extra(EXTRA_VANITY + EXTRA_SEAL, 1);
        header.base_fee_per_gas = Some(2);
        let mut cfg = base_config();
        cfg.jaipur_block = Some(1); // active at or below this header's number
        let hash = seal_hash(&header, &cfg).unwrap();
        assert_eq!(
            format!("{hash:#x}"),
            "0xc55b0cac99161f71bde1423a091426b1b5b4d7598e5981ad802cce712771965b"
        );
    }
}
