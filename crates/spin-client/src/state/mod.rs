pub mod handle;
pub mod signature;

pub use handle::*;
pub use signature::*;

/// Operation families guarded by their own in-flight latch
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Family {
    /// Reads reward and random-result handles
    Refresh,
    /// Submits an encrypted seed
    Spin,
    /// Reveals handles under a decryption signature
    Decrypt,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Family::Refresh => "refresh",
            Family::Spin => "spin",
            Family::Decrypt => "decrypt",
        }
    }
}

/// In-flight latches, one per family
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct OperationFlags {
    pub refreshing: bool,
    pub spinning: bool,
    pub decrypting: bool,
}

impl OperationFlags {
    pub fn is_set(&self, family: Family) -> bool {
        match family {
            Family::Refresh => self.refreshing,
            Family::Spin => self.spinning,
            Family::Decrypt => self.decrypting,
        }
    }

    pub fn set(&mut self, family: Family, value: bool) {
        match family {
            Family::Refresh => self.refreshing = value,
            Family::Spin => self.spinning = value,
            Family::Decrypt => self.decrypting = value,
        }
    }

    pub fn any(&self) -> bool {
        self.refreshing || self.spinning || self.decrypting
    }
}

/// Session state owned by the orchestrator.
///
/// Clear values are only ever stored next to the handle they were decrypted
/// from; replacing a handle drops a clear value that no longer matches.
#[derive(Clone, Debug, Default)]
pub struct SpinState {
    pub(crate) reward_handle: Option<RewardHandle>,
    pub(crate) random_result_handle: Option<Handle>,
    pub(crate) clear_reward: Option<ClearValue>,
    pub(crate) clear_random_result: Option<ClearValue>,
    pub(crate) flags: OperationFlags,
    pub(crate) message: String,
}

impl SpinState {
    pub fn reward_handle(&self) -> Option<RewardHandle> {
        self.reward_handle
    }

    pub fn random_result_handle(&self) -> Option<Handle> {
        self.random_result_handle
    }

    pub fn flags(&self) -> OperationFlags {
        self.flags
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn set_reward_handle(&mut self, reward_handle: Option<RewardHandle>) {
        self.reward_handle = reward_handle;
        let current = reward_handle.map(|r| r.reward);
        if self.clear_reward.map(|c| c.handle) != current {
            self.clear_reward = None;
        }
    }

    pub fn set_random_result_handle(&mut self, handle: Option<Handle>) {
        self.random_result_handle = handle;
        if self.clear_random_result.map(|c| c.handle) != handle {
            self.clear_random_result = None;
        }
    }

    /// Cached reward clear value, if it still belongs to the current handle
    pub fn clear_reward(&self) -> Option<ClearValue> {
        let current = self.reward_handle?.reward;
        self.clear_reward.filter(|c| c.handle == current)
    }

    pub fn clear_random_result(&self) -> Option<ClearValue> {
        let current = self.random_result_handle?;
        self.clear_random_result.filter(|c| c.handle == current)
    }

    /// Stores `value` unless its handle has been replaced meanwhile
    pub fn store_clear_reward(&mut self, value: ClearValue) -> bool {
        if self.reward_handle.map(|r| r.reward) != Some(value.handle) {
            return false;
        }
        self.clear_reward = Some(value);
        true
    }

    pub fn store_clear_random_result(&mut self, value: ClearValue) -> bool {
        if self.random_result_handle != Some(value.handle) {
            return false;
        }
        self.clear_random_result = Some(value);
        true
    }

    pub fn clear_reward_value(&mut self) {
        self.clear_reward = None;
    }

    pub fn clear_random_result_value(&mut self) {
        self.clear_random_result = None;
    }

    /// Drops both clear values regardless of the current handles
    pub fn invalidate_clear_values(&mut self) {
        self.clear_reward = None;
        self.clear_random_result = None;
    }

    pub fn is_reward_decrypted(&self) -> bool {
        self.clear_reward().is_some()
    }
}
