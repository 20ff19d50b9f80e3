use anchor_lang::prelude::*;

use crate::constants::SECONDS_PER_DAY;

/// Time-boxed authorization letting the decryption service reveal clear
/// values to `user_address` for handles of `contract_addresses`.
///
/// Issued by `SignatureCache` and never modified afterwards.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, PartialEq, Eq, Debug)]
pub struct DecryptionSignature {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
    pub signature: Vec<u8>,
    /// Sorted, without duplicates
    pub contract_addresses: Vec<Pubkey>,
    pub user_address: Pubkey,
    /// Unix seconds
    pub start_timestamp: u64,
    pub duration_days: u64,
}

impl DecryptionSignature {
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at()
    }

    /// Exact match on the address set, order-insensitive
    pub fn covers(&self, contract_addresses: &[Pubkey]) -> bool {
        self.contract_addresses == normalize_addresses(contract_addresses)
    }
}

/// Payload the user signs to obtain a `DecryptionSignature`
#[derive(AnchorSerialize, AnchorDeserialize, Clone, PartialEq, Eq, Debug)]
pub struct AuthorizationRequest {
    pub public_key: Vec<u8>,
    pub contract_addresses: Vec<Pubkey>,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

/// Ephemeral keypair the decryption service re-encrypts clear values to
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
}

pub fn normalize_addresses(addresses: &[Pubkey]) -> Vec<Pubkey> {
    let mut sorted = addresses.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}
