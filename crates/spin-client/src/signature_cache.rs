use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use anchor_lang::prelude::*;
use tracing::{debug, info, warn};

use crate::constants::{SIGNATURE_DURATION_DAYS, SIGNATURE_KEY_PREFIX};
use crate::encryption::EncryptionService;
use crate::session::SessionSigner;
use crate::state::{normalize_addresses, AuthorizationRequest, DecryptionSignature};

/// Wall-clock source, injectable for tests
pub trait UnixClock {
    /// Seconds since the Unix epoch
    fn now(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl UnixClock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Key-value store holding encoded signatures
pub trait SignatureStorage {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn set(&self, key: &str, value: Vec<u8>);

    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct InMemorySignatureStorage {
    entries: RefCell<HashMap<String, Vec<u8>>>,
}

impl InMemorySignatureStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl SignatureStorage for InMemorySignatureStorage {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        self.entries.borrow_mut().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// Load-or-sign cache of decryption signatures.
///
/// Entries are keyed by user and sorted contract set. A stored entry is
/// reused until it expires; otherwise a new one is signed, starting now.
pub struct SignatureCache {
    storage: Rc<dyn SignatureStorage>,
    clock: Rc<dyn UnixClock>,
    duration_days: u64,
}

impl SignatureCache {
    pub fn new(storage: Rc<dyn SignatureStorage>, clock: Rc<dyn UnixClock>) -> Self {
        Self {
            storage,
            clock,
            duration_days: SIGNATURE_DURATION_DAYS,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Rc::new(InMemorySignatureStorage::new()), Rc::new(SystemClock))
    }

    pub fn with_duration_days(mut self, duration_days: u64) -> Self {
        self.duration_days = duration_days;
        self
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    pub fn cache_key(user_address: &Pubkey, contract_addresses: &[Pubkey]) -> String {
        let contracts: Vec<String> = normalize_addresses(contract_addresses)
            .iter()
            .map(|a| a.to_string())
            .collect();
        format!("{SIGNATURE_KEY_PREFIX}:{user_address}:{}", contracts.join(","))
    }

    /// A stored signature that is still usable for this user and address set
    pub fn load(&self, user_address: &Pubkey, contract_addresses: &[Pubkey]) -> Option<DecryptionSignature> {
        let key = Self::cache_key(user_address, contract_addresses);
        let data = self.storage.get(&key)?;
        let signature = match DecryptionSignature::try_from_slice(&data) {
            Ok(signature) => signature,
            Err(err) => {
                warn!(%key, error = %err, "dropping undecodable decryption signature");
                self.storage.remove(&key);
                return None;
            }
        };

        let now = self.clock.now();
        if signature.user_address != *user_address || !signature.covers(contract_addresses) {
            debug!(%key, "stored signature does not match request");
            return None;
        }
        if !signature.is_valid_at(now) {
            debug!(%key, expires_at = signature.expires_at(), now, "stored signature expired");
            return None;
        }
        Some(signature)
    }

    /// Returns a valid signature, asking `signer` for a new one when needed.
    ///
    /// `None` means decryption is not possible right now (the user refused or
    /// the signer is unavailable); callers must not treat it as fatal.
    pub async fn obtain(
        &self,
        encryption: &dyn EncryptionService,
        signer: &dyn SessionSigner,
        contract_addresses: &[Pubkey],
    ) -> Option<DecryptionSignature> {
        let user_address = signer.address();
        if let Some(signature) = self.load(&user_address, contract_addresses) {
            debug!(user = %user_address, "reusing cached decryption signature");
            return Some(signature);
        }

        let keypair = encryption.generate_keypair();
        let request = AuthorizationRequest {
            public_key: keypair.public_key.clone(),
            contract_addresses: normalize_addresses(contract_addresses),
            start_timestamp: self.clock.now(),
            duration_days: self.duration_days,
        };

        let signed = match signer.sign_authorization(&request).await {
            Ok(signed) => signed,
            Err(err) => {
                warn!(user = %user_address, error = %err, "decryption signature was not issued");
                return None;
            }
        };

        let signature = DecryptionSignature {
            public_key: keypair.public_key,
            private_key: keypair.private_key,
            signature: signed,
            contract_addresses: request.contract_addresses,
            user_address,
            start_timestamp: request.start_timestamp,
            duration_days: request.duration_days,
        };
        self.store(&signature);

        info!(
            user = %user_address,
            expires_at = signature.expires_at(),
            "issued decryption signature"
        );
        Some(signature)
    }

    fn store(&self, signature: &DecryptionSignature) {
        let key = Self::cache_key(&signature.user_address, &signature.contract_addresses);
        let mut data = Vec::new();
        match AnchorSerialize::serialize(signature, &mut data) {
            Ok(()) => self.storage.set(&key, data),
            Err(err) => warn!(%key, error = %err, "decryption signature not persisted"),
        }
    }
}
