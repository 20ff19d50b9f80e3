use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anchor_lang::prelude::*;
use inco_lightning::types::Euint128;

use crate::constants::HANDLE_LEN;
use crate::error::SpinError;

/// Opaque identifier of a ciphertext held by the confidential contract.
///
/// The all-zero value is the sentinel for "no value assigned yet".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(pub [u8; HANDLE_LEN]);

impl Handle {
    pub const ZERO: Handle = Handle([0u8; HANDLE_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HANDLE_LEN]
    }

    /// Inco handles are 128-bit; they sit right-aligned, big-endian.
    pub fn from_euint128(value: Euint128) -> Self {
        let mut bytes = [0u8; HANDLE_LEN];
        bytes[HANDLE_LEN - 16..].copy_from_slice(&value.0.to_be_bytes());
        Handle(bytes)
    }

    /// Returns `None` when the upper half is in use.
    pub fn to_euint128(&self) -> Option<Euint128> {
        let (high, low) = self.0.split_at(HANDLE_LEN - 16);
        if high.iter().any(|b| *b != 0) {
            return None;
        }
        let mut raw = [0u8; 16];
        raw.copy_from_slice(low);
        Some(Euint128(u128::from_be_bytes(raw)))
    }
}

impl From<Euint128> for Handle {
    fn from(value: Euint128) -> Self {
        Handle::from_euint128(value)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({self})")
    }
}

impl FromStr for Handle {
    type Err = anchor_lang::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|_| error!(SpinError::InvalidHandle))?;
        let bytes: [u8; HANDLE_LEN] = bytes
            .try_into()
            .map_err(|_| error!(SpinError::InvalidHandle))?;
        Ok(Handle(bytes))
    }
}

/// Handles of the user's pending reward, read together and replaced together
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RewardHandle {
    /// Encrypted reward level
    pub level: Handle,
    /// Encrypted reward amount
    pub reward: Handle,
}

/// Plaintext revealed by the decryption service
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClearScalar {
    Uint(u128),
    Bool(bool),
}

impl ClearScalar {
    pub const ZERO: ClearScalar = ClearScalar::Uint(0);

    pub fn is_zero(&self) -> bool {
        matches!(self, ClearScalar::Uint(0) | ClearScalar::Bool(false))
    }
}

impl From<u128> for ClearScalar {
    fn from(value: u128) -> Self {
        ClearScalar::Uint(value)
    }
}

impl From<u64> for ClearScalar {
    fn from(value: u64) -> Self {
        ClearScalar::Uint(value.into())
    }
}

impl From<u32> for ClearScalar {
    fn from(value: u32) -> Self {
        ClearScalar::Uint(value.into())
    }
}

impl From<bool> for ClearScalar {
    fn from(value: bool) -> Self {
        ClearScalar::Bool(value)
    }
}

impl fmt::Display for ClearScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearScalar::Uint(v) => write!(f, "{v}"),
            ClearScalar::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// A decrypted value, meaningful only while `handle` is still current
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ClearValue {
    pub handle: Handle,
    pub value: ClearScalar,
}

impl ClearValue {
    pub fn new(handle: Handle, value: ClearScalar) -> Self {
        Self { handle, value }
    }

    /// Clear value of the sentinel handle, known without a round-trip
    pub fn zero(handle: Handle) -> Self {
        Self::new(handle, ClearScalar::ZERO)
    }
}

/// Typed response of a batch decryption
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecryptionResults(HashMap<Handle, ClearScalar>);

impl DecryptionResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: Handle, value: ClearScalar) {
        self.0.insert(handle, value);
    }

    pub fn get(&self, handle: &Handle) -> Option<ClearScalar> {
        self.0.get(handle).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Handles present in the response, in a stable order
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.0.keys().copied().collect();
        handles.sort();
        handles
    }
}

impl FromIterator<(Handle, ClearScalar)> for DecryptionResults {
    fn from_iter<I: IntoIterator<Item = (Handle, ClearScalar)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
