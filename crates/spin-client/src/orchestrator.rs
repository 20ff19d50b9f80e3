use std::cell::RefCell;
use std::rc::Rc;

use anchor_lang::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::deployment::DeploymentRegistry;
use crate::encryption::EncryptionService;
use crate::gateway::ContractGateway;
use crate::session::{SessionContext, SessionSnapshot};
use crate::signature_cache::SignatureCache;
use crate::state::{ClearValue, Family, Handle, OperationFlags, RewardHandle, SpinState};

/// How an operation ended
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    /// A conflicting operation was in flight; nothing happened
    Busy,
    /// A precondition was missing (no deployment, signer, service or
    /// authorization)
    Unavailable,
    /// The session changed mid-flight and the result was discarded
    Stale,
    /// A step failed; the status message says which
    Failed,
    Completed,
}

/// Coordinates refresh, spin and decrypt over one user session.
///
/// All methods take `&self`: operations of different families can be polled
/// concurrently on the same thread. The state is only borrowed between
/// suspension points, never across one.
pub struct SpinOrchestrator {
    pub(crate) registry: DeploymentRegistry,
    pub(crate) session: Rc<dyn SessionContext>,
    pub(crate) gateway: Option<Rc<dyn ContractGateway>>,
    pub(crate) encryption: Option<Rc<dyn EncryptionService>>,
    pub(crate) signatures: SignatureCache,
    pub(crate) rng: RefCell<StdRng>,
    pub(crate) state: RefCell<SpinState>,
}

impl SpinOrchestrator {
    pub fn new(
        registry: DeploymentRegistry,
        session: Rc<dyn SessionContext>,
        signatures: SignatureCache,
    ) -> Self {
        let orchestrator = Self {
            registry,
            session,
            gateway: None,
            encryption: None,
            signatures,
            rng: RefCell::new(StdRng::from_entropy()),
            state: RefCell::new(SpinState::default()),
        };
        orchestrator.report_missing_deployment();
        orchestrator
    }

    pub fn with_gateway(mut self, gateway: Rc<dyn ContractGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_encryption(mut self, encryption: Rc<dyn EncryptionService>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Replaces the seed generator, e.g. with a seeded one
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = RefCell::new(rng);
        self
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    pub fn signatures(&self) -> &SignatureCache {
        &self.signatures
    }

    /// Contract address on the session's current network
    pub fn contract_address(&self) -> Option<Pubkey> {
        self.registry.address_for(self.session.chain_id())
    }

    pub fn is_deployed(&self) -> bool {
        self.contract_address().is_some()
    }

    pub fn state(&self) -> SpinState {
        self.state.borrow().clone()
    }

    pub fn reward_handle(&self) -> Option<RewardHandle> {
        self.read(|s| s.reward_handle())
    }

    pub fn random_result_handle(&self) -> Option<Handle> {
        self.read(|s| s.random_result_handle())
    }

    pub fn clear_reward(&self) -> Option<ClearValue> {
        self.read(|s| s.clear_reward())
    }

    pub fn clear_random_result(&self) -> Option<ClearValue> {
        self.read(|s| s.clear_random_result())
    }

    pub fn flags(&self) -> OperationFlags {
        self.read(|s| s.flags())
    }

    pub fn is_refreshing(&self) -> bool {
        self.flags().refreshing
    }

    pub fn is_spinning(&self) -> bool {
        self.flags().spinning
    }

    pub fn is_decrypting(&self) -> bool {
        self.flags().decrypting
    }

    pub fn message(&self) -> String {
        self.read(|s| s.message().to_string())
    }

    pub fn is_reward_decrypted(&self) -> bool {
        self.read(|s| s.is_reward_decrypted())
    }

    pub fn can_refresh(&self) -> bool {
        self.contract_address().is_some() && self.gateway.is_some() && !self.is_refreshing()
    }

    pub fn can_spin(&self) -> bool {
        let flags = self.flags();
        self.has_write_capability() && !flags.refreshing && !flags.spinning
    }

    /// False for the sentinel handle: its clear value is known without a
    /// round-trip.
    pub fn can_decrypt(&self) -> bool {
        let flags = self.flags();
        if !self.has_decrypt_capability() || flags.refreshing || flags.decrypting {
            return false;
        }
        self.read(|s| match s.reward_handle() {
            Some(reward) => !reward.reward.is_zero() && s.clear_reward().is_none(),
            None => false,
        })
    }

    pub fn can_decrypt_random(&self) -> bool {
        let flags = self.flags();
        if !self.has_decrypt_capability() || flags.refreshing || flags.decrypting {
            return false;
        }
        self.read(|s| match s.random_result_handle() {
            Some(handle) => !handle.is_zero() && s.clear_random_result().is_none(),
            None => false,
        })
    }

    fn has_decrypt_capability(&self) -> bool {
        self.contract_address().is_some()
            && self.encryption.is_some()
            && self.session.signer().is_some()
    }

    fn has_write_capability(&self) -> bool {
        self.has_decrypt_capability() && self.gateway.is_some()
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&SpinState) -> T) -> T {
        f(&self.state.borrow())
    }

    pub(crate) fn update<T>(&self, f: impl FnOnce(&mut SpinState) -> T) -> T {
        f(&mut self.state.borrow_mut())
    }

    pub(crate) fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "status");
        self.update(|s| s.message = message);
    }

    pub(crate) fn snapshot(&self, contract_address: Pubkey) -> SessionSnapshot {
        SessionSnapshot::capture(contract_address, self.session.as_ref())
    }

    /// The single resumption-point check shared by every operation
    pub(crate) fn is_stale(&self, snapshot: &SessionSnapshot) -> bool {
        snapshot.is_stale(self.contract_address(), self.session.as_ref())
    }

    pub(crate) fn report_missing_deployment(&self) {
        if let Some(chain_id) = self.session.chain_id() {
            if self.contract_address().is_none() {
                warn!(chain_id, "spin contract not deployed");
                self.set_message(format!("Spin contract deployment not found for chain id {chain_id}."));
            }
        }
    }
}

/// Holds one family's in-flight latch; releases it when dropped, whichever
/// path the operation leaves by.
pub(crate) struct FlagGuard<'a> {
    state: &'a RefCell<SpinState>,
    family: Family,
}

impl<'a> FlagGuard<'a> {
    /// `None` if the family is already in flight
    pub(crate) fn acquire(state: &'a RefCell<SpinState>, family: Family) -> Option<Self> {
        let mut current = state.borrow_mut();
        if current.flags.is_set(family) {
            debug!(family = family.name(), "already in flight");
            return None;
        }
        current.flags.set(family, true);
        Some(Self { state, family })
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.state.borrow_mut().flags.set(self.family, false);
    }
}
