#![allow(unexpected_cfgs)]

//! Client-side orchestration for a confidential spin lottery.
//!
//! A [`SpinOrchestrator`] owns the session state (ciphertext handles, cached
//! clear values, in-flight latches) and drives three operation families
//! against external collaborators:
//! - `refresh` reads the user's reward and random-result handles
//! - `spin` submits an encrypted seed and refreshes afterwards
//! - `decrypt` reveals handles under a cached, time-boxed authorization
//!
//! Everything runs on a single-threaded executor. Operations re-validate a
//! captured [`SessionSnapshot`] at every resumption point and drop their own
//! result when the network, contract or signer changed in the meantime.

pub mod constants;
pub mod error;
pub mod state;

pub mod deployment;
pub mod encryption;
pub mod gateway;
pub mod orchestrator;
pub mod session;
pub mod signature_cache;

pub mod decrypt;
pub mod refresh;
pub mod spin;

pub use deployment::*;
pub use encryption::*;
pub use error::SpinError;
pub use gateway::*;
pub use orchestrator::*;
pub use session::*;
pub use signature_cache::*;
pub use state::*;
