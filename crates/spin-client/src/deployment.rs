use std::collections::BTreeMap;

use anchor_lang::prelude::*;

use crate::session::ChainId;

/// Where the spin contract lives on one network
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Deployment {
    pub address: Pubkey,
    pub chain_id: ChainId,
    pub chain_name: Option<String>,
}

impl Deployment {
    pub fn new(chain_id: ChainId, address: Pubkey) -> Self {
        Self {
            address,
            chain_id,
            chain_name: None,
        }
    }

    pub fn named(mut self, chain_name: impl Into<String>) -> Self {
        self.chain_name = Some(chain_name.into());
        self
    }

    /// The default key marks a placeholder entry
    pub fn is_deployed(&self) -> bool {
        self.address != Pubkey::default()
    }
}

/// Contract address per network
#[derive(Clone, Debug, Default)]
pub struct DeploymentRegistry {
    deployments: BTreeMap<ChainId, Deployment>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, deployment: Deployment) -> Self {
        self.insert(deployment);
        self
    }

    pub fn insert(&mut self, deployment: Deployment) {
        self.deployments.insert(deployment.chain_id, deployment);
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&Deployment> {
        self.deployments.get(&chain_id)
    }

    /// Address of a real deployment on `chain_id`, if any
    pub fn address_for(&self, chain_id: Option<ChainId>) -> Option<Pubkey> {
        self.get(chain_id?)
            .filter(|d| d.is_deployed())
            .map(|d| d.address)
    }
}
