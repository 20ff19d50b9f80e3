use std::fmt;

use anchor_lang::prelude::*;
use async_trait::async_trait;

use crate::state::{Handle, RewardHandle};

/// A submitted, not yet confirmed transaction
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PendingTransaction {
    /// Transaction signature or hash, as reported by the network
    pub id: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransactionStatus {
    Success,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Success => write!(f, "success"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TransactionReceipt {
    pub id: String,
    pub status: TransactionStatus,
}

/// Read and write surface of the deployed spin contract
#[async_trait(?Send)]
pub trait ContractGateway {
    /// Handles of the caller's pending reward level and amount
    async fn get_user_reward(&self, contract: Pubkey) -> Result<RewardHandle>;

    /// Fails when the caller has never spun.
    async fn get_user_random_result(&self, contract: Pubkey) -> Result<Handle>;

    async fn spin(
        &self,
        contract: Pubkey,
        encrypted_seed: Handle,
        input_proof: &[u8],
    ) -> Result<PendingTransaction>;

    async fn wait_for_confirmation(&self, tx: &PendingTransaction) -> Result<TransactionReceipt>;
}
