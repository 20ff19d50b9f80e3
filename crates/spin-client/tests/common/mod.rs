#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use anchor_lang::prelude::*;
use async_trait::async_trait;
use inco_lightning::types::Euint128;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::oneshot;

use spin_client::{
    AuthorizationRequest, ChainId, ClearScalar, ContractGateway, DecryptRequest,
    DecryptionResults, DecryptionSignature, Deployment, DeploymentRegistry, EncryptedInput,
    EncryptedInputProof, EncryptionService, Handle, InMemorySignatureStorage, KeyPair,
    PendingTransaction, RewardHandle, SessionContext, SessionSigner, SignatureCache,
    SpinOrchestrator, TransactionReceipt, TransactionStatus, UnixClock,
};

pub const CHAIN_ID: ChainId = 31337;
pub const OTHER_CHAIN_ID: ChainId = 11155111;
pub const NOW: u64 = 1_700_000_000;

pub fn contract() -> Pubkey {
    Pubkey::new_from_array([0xc0; 32])
}

pub fn other_contract() -> Pubkey {
    Pubkey::new_from_array([0xc1; 32])
}

pub fn user() -> Pubkey {
    Pubkey::new_from_array([0xaa; 32])
}

pub fn handle(value: u128) -> Handle {
    Handle::from(Euint128(value))
}

pub fn reward(level: u128, amount: u128) -> RewardHandle {
    RewardHandle {
        level: handle(level),
        reward: handle(amount),
    }
}

pub fn failure() -> anchor_lang::error::Error {
    ProgramError::InvalidAccountData.into()
}

/// Parks a mocked call until the test releases it
pub struct Gate {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

pub struct GateHandle {
    entered: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

pub fn gate() -> (Gate, GateHandle) {
    let (entered_tx, entered_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    (
        Gate {
            entered: entered_tx,
            release: release_rx,
        },
        GateHandle {
            entered: entered_rx,
            release: release_tx,
        },
    )
}

impl Gate {
    pub async fn pass(self) {
        let _ = self.entered.send(());
        let _ = self.release.await;
    }
}

impl GateHandle {
    /// Resolves once the mocked call is parked
    pub async fn reached(&mut self) {
        let _ = (&mut self.entered).await;
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

async fn pass_gate(slot: &RefCell<Option<Gate>>) {
    let gate = slot.borrow_mut().take();
    if let Some(gate) = gate {
        gate.pass().await;
    }
}

pub struct MockClock(pub Cell<u64>);

impl MockClock {
    pub fn advance(&self, seconds: u64) {
        self.0.set(self.0.get() + seconds);
    }
}

impl UnixClock for MockClock {
    fn now(&self) -> u64 {
        self.0.get()
    }
}

pub struct MockSigner {
    pub address: Pubkey,
    pub sign_calls: Cell<usize>,
    pub reject: Cell<bool>,
    pub gate: RefCell<Option<Gate>>,
    pub requests: RefCell<Vec<AuthorizationRequest>>,
}

impl MockSigner {
    pub fn new(address: Pubkey) -> Self {
        Self {
            address,
            sign_calls: Cell::new(0),
            reject: Cell::new(false),
            gate: RefCell::new(None),
            requests: RefCell::new(Vec::new()),
        }
    }
}

#[async_trait(?Send)]
impl SessionSigner for MockSigner {
    fn address(&self) -> Pubkey {
        self.address
    }

    async fn sign_authorization(&self, request: &AuthorizationRequest) -> Result<Vec<u8>> {
        self.sign_calls.set(self.sign_calls.get() + 1);
        self.requests.borrow_mut().push(request.clone());
        pass_gate(&self.gate).await;
        if self.reject.get() {
            return Err(failure());
        }
        Ok(vec![0x5a; 65])
    }
}

pub struct MockSession {
    pub chain_id: Cell<Option<ChainId>>,
    pub signer: RefCell<Option<Rc<MockSigner>>>,
}

impl MockSession {
    pub fn new(chain_id: Option<ChainId>, signer: Option<Rc<MockSigner>>) -> Self {
        Self {
            chain_id: Cell::new(chain_id),
            signer: RefCell::new(signer),
        }
    }

    pub fn set_chain_id(&self, chain_id: Option<ChainId>) {
        self.chain_id.set(chain_id);
    }

    pub fn set_signer(&self, signer: Option<Rc<MockSigner>>) {
        *self.signer.borrow_mut() = signer;
    }
}

impl SessionContext for MockSession {
    fn chain_id(&self) -> Option<ChainId> {
        self.chain_id.get()
    }

    fn signer(&self) -> Option<Rc<dyn SessionSigner>> {
        self.signer
            .borrow()
            .clone()
            .map(|signer| signer as Rc<dyn SessionSigner>)
    }
}

pub struct MockGateway {
    pub reward: RefCell<Option<RewardHandle>>,
    pub random_result: RefCell<Option<Handle>>,
    pub reward_calls: Cell<usize>,
    pub random_calls: Cell<usize>,
    pub spin_calls: RefCell<Vec<(Pubkey, Handle, Vec<u8>)>>,
    pub receipt_status: Cell<TransactionStatus>,
    pub fail_submit: Cell<bool>,
    /// Applied to `reward`/`random_result` once a spin is confirmed
    pub after_spin: RefCell<Option<(RewardHandle, Handle)>>,
    pub reward_gate: RefCell<Option<Gate>>,
    pub random_gate: RefCell<Option<Gate>>,
    pub confirm_gate: RefCell<Option<Gate>>,
}

impl MockGateway {
    pub fn new(reward: Option<RewardHandle>, random_result: Option<Handle>) -> Self {
        Self {
            reward: RefCell::new(reward),
            random_result: RefCell::new(random_result),
            reward_calls: Cell::new(0),
            random_calls: Cell::new(0),
            spin_calls: RefCell::new(Vec::new()),
            receipt_status: Cell::new(TransactionStatus::Success),
            fail_submit: Cell::new(false),
            after_spin: RefCell::new(None),
            reward_gate: RefCell::new(None),
            random_gate: RefCell::new(None),
            confirm_gate: RefCell::new(None),
        }
    }
}

#[async_trait(?Send)]
impl ContractGateway for MockGateway {
    async fn get_user_reward(&self, _contract: Pubkey) -> Result<RewardHandle> {
        self.reward_calls.set(self.reward_calls.get() + 1);
        pass_gate(&self.reward_gate).await;
        let reward = *self.reward.borrow();
        reward.ok_or_else(failure)
    }

    async fn get_user_random_result(&self, _contract: Pubkey) -> Result<Handle> {
        self.random_calls.set(self.random_calls.get() + 1);
        pass_gate(&self.random_gate).await;
        let random_result = *self.random_result.borrow();
        random_result.ok_or_else(failure)
    }

    async fn spin(
        &self,
        contract: Pubkey,
        encrypted_seed: Handle,
        input_proof: &[u8],
    ) -> Result<PendingTransaction> {
        if self.fail_submit.get() {
            return Err(failure());
        }
        self.spin_calls
            .borrow_mut()
            .push((contract, encrypted_seed, input_proof.to_vec()));
        Ok(PendingTransaction {
            id: format!("tx-{}", self.spin_calls.borrow().len()),
        })
    }

    async fn wait_for_confirmation(&self, tx: &PendingTransaction) -> Result<TransactionReceipt> {
        pass_gate(&self.confirm_gate).await;
        let status = self.receipt_status.get();
        if status == TransactionStatus::Success {
            let next = self.after_spin.borrow_mut().take();
            if let Some((reward, random_result)) = next {
                *self.reward.borrow_mut() = Some(reward);
                *self.random_result.borrow_mut() = Some(random_result);
            }
        }
        Ok(TransactionReceipt {
            id: tx.id.clone(),
            status,
        })
    }
}

pub struct MockEncryption {
    pub values: RefCell<HashMap<Handle, ClearScalar>>,
    pub encrypted: RefCell<Vec<EncryptedInput>>,
    pub decrypt_calls: RefCell<Vec<Vec<DecryptRequest>>>,
    pub fail_decrypt: Cell<bool>,
    pub no_handles: Cell<bool>,
    /// Runs while `encrypt` is in progress
    pub on_encrypt: RefCell<Option<Box<dyn Fn()>>>,
    /// Runs while `user_decrypt` is in progress
    pub on_decrypt: RefCell<Option<Box<dyn Fn()>>>,
    pub keypairs: Cell<usize>,
}

impl MockEncryption {
    pub fn new() -> Self {
        Self {
            values: RefCell::new(HashMap::new()),
            encrypted: RefCell::new(Vec::new()),
            decrypt_calls: RefCell::new(Vec::new()),
            fail_decrypt: Cell::new(false),
            no_handles: Cell::new(false),
            on_encrypt: RefCell::new(None),
            on_decrypt: RefCell::new(None),
            keypairs: Cell::new(0),
        }
    }

    pub fn reveal(&self, handle: Handle, value: impl Into<ClearScalar>) {
        self.values.borrow_mut().insert(handle, value.into());
    }

    pub fn decrypt_count(&self) -> usize {
        self.decrypt_calls.borrow().len()
    }
}

#[async_trait(?Send)]
impl EncryptionService for MockEncryption {
    async fn encrypt(&self, input: &EncryptedInput) -> Result<EncryptedInputProof> {
        self.encrypted.borrow_mut().push(input.clone());
        if let Some(hook) = self.on_encrypt.borrow().as_ref() {
            hook();
        }
        if self.no_handles.get() {
            return Ok(EncryptedInputProof {
                handles: vec![],
                input_proof: vec![],
            });
        }
        Ok(EncryptedInputProof {
            handles: vec![handle(0xe0)],
            input_proof: vec![0xab, 0xcd],
        })
    }

    fn generate_keypair(&self) -> KeyPair {
        self.keypairs.set(self.keypairs.get() + 1);
        KeyPair {
            public_key: vec![1; 32],
            private_key: vec![2; 32],
        }
    }

    async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        _signature: &DecryptionSignature,
    ) -> Result<DecryptionResults> {
        self.decrypt_calls.borrow_mut().push(requests.to_vec());
        if let Some(hook) = self.on_decrypt.borrow().as_ref() {
            hook();
        }
        if self.fail_decrypt.get() {
            return Err(failure());
        }
        let values = self.values.borrow();
        Ok(requests
            .iter()
            .filter_map(|r| values.get(&r.handle).map(|v| (r.handle, *v)))
            .collect())
    }
}

pub struct Harness {
    pub session: Rc<MockSession>,
    pub signer: Rc<MockSigner>,
    pub gateway: Rc<MockGateway>,
    pub encryption: Rc<MockEncryption>,
    pub clock: Rc<MockClock>,
    pub storage: Rc<InMemorySignatureStorage>,
    pub orchestrator: SpinOrchestrator,
}

impl Harness {
    pub fn new(reward: Option<RewardHandle>, random_result: Option<Handle>) -> Self {
        let signer = Rc::new(MockSigner::new(user()));
        let session = Rc::new(MockSession::new(Some(CHAIN_ID), Some(signer.clone())));
        let gateway = Rc::new(MockGateway::new(reward, random_result));
        let encryption = Rc::new(MockEncryption::new());
        let clock = Rc::new(MockClock(Cell::new(NOW)));
        let storage = Rc::new(InMemorySignatureStorage::new());

        let registry = DeploymentRegistry::new()
            .with(Deployment::new(CHAIN_ID, contract()).named("Local"))
            .with(Deployment::new(OTHER_CHAIN_ID, other_contract()).named("Testnet"));
        let signatures = SignatureCache::new(storage.clone(), clock.clone());

        let orchestrator = SpinOrchestrator::new(registry, session.clone(), signatures)
            .with_gateway(gateway.clone())
            .with_encryption(encryption.clone())
            .with_rng(StdRng::seed_from_u64(7));

        Self {
            session,
            signer,
            gateway,
            encryption,
            clock,
            storage,
            orchestrator,
        }
    }
}
