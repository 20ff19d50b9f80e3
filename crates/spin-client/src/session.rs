use std::rc::Rc;

use anchor_lang::prelude::*;
use async_trait::async_trait;

use crate::state::AuthorizationRequest;

pub type ChainId = u64;

/// The wallet currently connected to the session
#[async_trait(?Send)]
pub trait SessionSigner {
    fn address(&self) -> Pubkey;

    /// Interactive: the user may take arbitrarily long, or refuse.
    async fn sign_authorization(&self, request: &AuthorizationRequest) -> Result<Vec<u8>>;
}

/// Live view of the network and account the user is connected to.
///
/// Both may change at any time, including while an operation is suspended.
pub trait SessionContext {
    fn chain_id(&self) -> Option<ChainId>;

    fn signer(&self) -> Option<Rc<dyn SessionSigner>>;

    fn signer_address(&self) -> Option<Pubkey> {
        self.signer().map(|signer| signer.address())
    }

    fn same_chain(&self, chain_id: Option<ChainId>) -> bool {
        self.chain_id() == chain_id
    }

    fn same_signer(&self, signer: Option<Pubkey>) -> bool {
        self.signer_address() == signer
    }
}

/// Identity captured when a multi-step operation starts
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SessionSnapshot {
    pub contract_address: Pubkey,
    pub chain_id: Option<ChainId>,
    pub signer: Option<Pubkey>,
}

impl SessionSnapshot {
    pub fn capture(contract_address: Pubkey, session: &dyn SessionContext) -> Self {
        Self {
            contract_address,
            chain_id: session.chain_id(),
            signer: session.signer_address(),
        }
    }

    /// True once the contract, network or signer differs from capture time
    pub fn is_stale(&self, current_contract: Option<Pubkey>, session: &dyn SessionContext) -> bool {
        current_contract != Some(self.contract_address)
            || !session.same_chain(self.chain_id)
            || !session.same_signer(self.signer)
    }
}
