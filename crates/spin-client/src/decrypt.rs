use anchor_lang::prelude::*;
use tracing::{debug, info, warn};

use crate::encryption::{DecryptRequest, EncryptionService};
use crate::error::SpinError;
use crate::orchestrator::{FlagGuard, Outcome, SpinOrchestrator};
use crate::session::{SessionSigner, SessionSnapshot};
use crate::state::{ClearValue, DecryptionResults, Family, Handle};

enum DecryptStep {
    Decrypted(DecryptionResults),
    Unauthorized,
    Stale,
}

/// What became of the random-result half of a reward decryption
enum RandomResultValue {
    NotRequested,
    Found(ClearValue),
    /// Requested but absent from the response
    Missing(Vec<Handle>),
}

impl SpinOrchestrator {
    /// Decrypts the reward handle, and the random-result handle alongside it
    /// when there is one.
    ///
    /// The sentinel and already-decrypted handles are answered locally.
    pub async fn decrypt(&self) -> Outcome {
        let flags = self.flags();
        if flags.refreshing || flags.decrypting {
            debug!(?flags, "decrypt blocked");
            return Outcome::Busy;
        }

        let (Some(contract), Some(encryption), Some(signer)) = (
            self.contract_address(),
            self.encryption.clone(),
            self.session.signer(),
        ) else {
            return Outcome::Unavailable;
        };

        let (reward, random_result, cached) = self.read(|s| {
            (
                s.reward_handle().map(|r| r.reward),
                s.random_result_handle(),
                s.clear_reward(),
            )
        });

        let Some(reward) = reward else {
            self.update(|s| s.clear_reward_value());
            return Outcome::Unavailable;
        };
        if cached.map(|c| c.handle) == Some(reward) {
            return Outcome::Completed;
        }
        if reward.is_zero() {
            self.update(|s| s.store_clear_reward(ClearValue::zero(reward)));
            return Outcome::Completed;
        }

        let Some(_guard) = FlagGuard::acquire(&self.state, Family::Decrypt) else {
            return Outcome::Busy;
        };
        self.set_message("Start decrypt");

        let snapshot = self.snapshot(contract);
        let random_result = random_result.filter(|h| !h.is_zero());
        let mut handles = vec![reward];
        handles.extend(random_result);

        let results = match self
            .authorize_and_decrypt(&snapshot, encryption.as_ref(), signer.as_ref(), &handles)
            .await
        {
            Ok(DecryptStep::Decrypted(results)) => results,
            Ok(step) => return self.report_interrupted(step),
            Err(err) => return self.report_decrypt_failure(err),
        };

        let (reward_value, random_value) = match extract_values(&results, reward, random_result) {
            Ok(values) => values,
            Err(err) => return self.report_decrypt_failure(err),
        };

        let message = self.update(|s| {
            s.store_clear_reward(reward_value);
            match &random_value {
                RandomResultValue::NotRequested => {
                    format!("Reward handle clear value is {}", reward_value.value)
                }
                RandomResultValue::Found(value) => {
                    s.store_clear_random_result(*value);
                    format!("Reward: {}, Random Result: {}", reward_value.value, value.value)
                }
                RandomResultValue::Missing(available) => {
                    s.clear_random_result_value();
                    format!(
                        "Reward: {}, random result handle not found. Available handles: {}",
                        reward_value.value,
                        join_handles(available)
                    )
                }
            }
        });
        if let RandomResultValue::Missing(available) = &random_value {
            warn!(%contract, available = %join_handles(available), "random result missing from decryption");
        }
        info!(%contract, reward = %reward_value.value, "reward decrypted");
        self.set_message(message);
        Outcome::Completed
    }

    /// Decrypts only the random-result handle. Shares the decrypt latch.
    pub async fn decrypt_random_result(&self) -> Outcome {
        let flags = self.flags();
        if flags.refreshing || flags.decrypting {
            debug!(?flags, "decrypt blocked");
            return Outcome::Busy;
        }

        let (Some(contract), Some(encryption), Some(signer)) = (
            self.contract_address(),
            self.encryption.clone(),
            self.session.signer(),
        ) else {
            return Outcome::Unavailable;
        };

        let (handle, cached) = self.read(|s| (s.random_result_handle(), s.clear_random_result()));
        let Some(handle) = handle else {
            self.update(|s| s.clear_random_result_value());
            return Outcome::Unavailable;
        };
        if cached.map(|c| c.handle) == Some(handle) {
            return Outcome::Completed;
        }
        if handle.is_zero() {
            self.update(|s| s.store_clear_random_result(ClearValue::zero(handle)));
            return Outcome::Completed;
        }

        let Some(_guard) = FlagGuard::acquire(&self.state, Family::Decrypt) else {
            return Outcome::Busy;
        };
        self.set_message("Start decrypt random result");

        let snapshot = self.snapshot(contract);
        let results = match self
            .authorize_and_decrypt(&snapshot, encryption.as_ref(), signer.as_ref(), &[handle])
            .await
        {
            Ok(DecryptStep::Decrypted(results)) => results,
            Ok(step) => return self.report_interrupted(step),
            Err(err) => return self.report_decrypt_failure(err),
        };

        match results.get(&handle) {
            Some(value) => {
                self.update(|s| s.store_clear_random_result(ClearValue::new(handle, value)));
                info!(%contract, value = %value, "random result decrypted");
                self.set_message(format!("Random Result: {value}"));
            }
            None => {
                let available = join_handles(&results.handles());
                warn!(%contract, %available, "random result missing from decryption");
                self.set_message(format!(
                    "Random result handle not found. Available handles: {available}"
                ));
            }
        }
        Outcome::Completed
    }

    /// Obtains authorization and runs the batch decryption, re-checking the
    /// session around both suspension points.
    async fn authorize_and_decrypt(
        &self,
        snapshot: &SessionSnapshot,
        encryption: &dyn EncryptionService,
        signer: &dyn SessionSigner,
        handles: &[Handle],
    ) -> Result<DecryptStep> {
        if self.is_stale(snapshot) {
            return Ok(DecryptStep::Stale);
        }

        let Some(signature) = self
            .signatures
            .obtain(encryption, signer, &[snapshot.contract_address])
            .await
        else {
            return Ok(DecryptStep::Unauthorized);
        };

        if self.is_stale(snapshot) {
            return Ok(DecryptStep::Stale);
        }

        self.set_message("Call userDecrypt...");
        let requests: Vec<DecryptRequest> = handles
            .iter()
            .map(|handle| DecryptRequest {
                handle: *handle,
                contract_address: snapshot.contract_address,
            })
            .collect();
        let results = encryption.user_decrypt(&requests, &signature).await?;
        debug!(requested = requests.len(), returned = results.len(), "userDecrypt completed");

        if self.is_stale(snapshot) {
            return Ok(DecryptStep::Stale);
        }
        Ok(DecryptStep::Decrypted(results))
    }

    fn report_interrupted(&self, step: DecryptStep) -> Outcome {
        match step {
            DecryptStep::Unauthorized => {
                self.set_message("Unable to build decryption signature");
                Outcome::Unavailable
            }
            DecryptStep::Stale => {
                debug!("session changed, decryption ignored");
                self.set_message("Decryption ignored: session changed");
                Outcome::Stale
            }
            DecryptStep::Decrypted(_) => Outcome::Completed,
        }
    }

    fn report_decrypt_failure(&self, err: anchor_lang::error::Error) -> Outcome {
        warn!(error = %err, "decryption failed");
        self.set_message(format!("Decryption failed: {err}"));
        Outcome::Failed
    }
}

/// Splits a response into the required reward value and the optional
/// random-result value. Nothing is written until both are known.
fn extract_values(
    results: &DecryptionResults,
    reward: Handle,
    random_result: Option<Handle>,
) -> Result<(ClearValue, RandomResultValue)> {
    let reward_value = results
        .get(&reward)
        .map(|value| ClearValue::new(reward, value))
        .ok_or_else(|| error!(SpinError::MissingRewardValue))?;

    let random_value = match random_result {
        None => RandomResultValue::NotRequested,
        Some(handle) => match results.get(&handle) {
            Some(value) => RandomResultValue::Found(ClearValue::new(handle, value)),
            None => RandomResultValue::Missing(results.handles()),
        },
    };
    Ok((reward_value, random_value))
}

fn join_handles(handles: &[Handle]) -> String {
    handles
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
