use anchor_lang::prelude::*;
use async_trait::async_trait;

use crate::state::{DecryptionResults, DecryptionSignature, Handle, KeyPair};

/// Plaintext values to encrypt for one (contract, user) pair
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EncryptedInput {
    pub contract_address: Pubkey,
    pub user_address: Pubkey,
    values: Vec<u32>,
}

impl EncryptedInput {
    pub fn new(contract_address: Pubkey, user_address: Pubkey) -> Self {
        Self {
            contract_address,
            user_address,
            values: Vec::new(),
        }
    }

    pub fn add32(&mut self, value: u32) -> &mut Self {
        self.values.push(value);
        self
    }

    pub fn values(&self) -> &[u32] {
        &self.values
    }
}

/// One handle per input value, plus the proof the contract verifies
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EncryptedInputProof {
    pub handles: Vec<Handle>,
    pub input_proof: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DecryptRequest {
    pub handle: Handle,
    pub contract_address: Pubkey,
}

/// Homomorphic encryption service. Treated as a black box.
#[async_trait(?Send)]
pub trait EncryptionService {
    async fn encrypt(&self, input: &EncryptedInput) -> Result<EncryptedInputProof>;

    fn generate_keypair(&self) -> KeyPair;

    /// Handles the service could not reveal are absent from the result.
    async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        signature: &DecryptionSignature,
    ) -> Result<DecryptionResults>;
}
