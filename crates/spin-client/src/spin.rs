use anchor_lang::prelude::*;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::encryption::{EncryptedInput, EncryptionService};
use crate::error::SpinError;
use crate::gateway::{ContractGateway, TransactionReceipt, TransactionStatus};
use crate::orchestrator::{FlagGuard, Outcome, SpinOrchestrator};
use crate::session::SessionSnapshot;
use crate::state::Family;

enum SpinStep {
    Confirmed(TransactionReceipt),
    Stale,
}

impl SpinOrchestrator {
    /// Spins with a fresh encrypted seed.
    ///
    /// FLOW:
    /// 1. Draw a `u32` seed and encrypt it for (contract, user)
    /// 2. Submit `spin(handle, proof)` unless the session changed meanwhile
    /// 3. On confirmation, drop both cached clear values and refresh
    ///
    /// Nothing local changes unless the transaction is confirmed.
    pub async fn spin(&self) -> Outcome {
        let flags = self.flags();
        if flags.refreshing || flags.spinning {
            debug!(?flags, "spin blocked");
            return Outcome::Busy;
        }

        let (Some(contract), Some(gateway), Some(encryption), Some(signer)) = (
            self.contract_address(),
            self.gateway.clone(),
            self.encryption.clone(),
            self.session.signer(),
        ) else {
            return Outcome::Unavailable;
        };

        let Some(guard) = FlagGuard::acquire(&self.state, Family::Spin) else {
            return Outcome::Busy;
        };
        self.set_message("Start spin...");

        let snapshot = self.snapshot(contract);
        let user = signer.address();

        match self
            .submit_spin(&snapshot, user, gateway.as_ref(), encryption.as_ref())
            .await
        {
            Ok(SpinStep::Confirmed(receipt)) => {
                self.update(|s| s.invalidate_clear_values());
                info!(%contract, %user, tx = %receipt.id, "spin confirmed");
                drop(guard);
                if self.refresh().await == Outcome::Busy {
                    debug!(%contract, "refresh already in flight, follow-up refresh skipped");
                }
                Outcome::Completed
            }
            Ok(SpinStep::Stale) => {
                debug!(%contract, "session changed, spin ignored");
                self.set_message("Spin ignored: session changed");
                Outcome::Stale
            }
            Err(err) => {
                warn!(%contract, error = %err, "spin failed");
                self.set_message(format!("Spin failed! {err}"));
                Outcome::Failed
            }
        }
    }

    async fn submit_spin(
        &self,
        snapshot: &SessionSnapshot,
        user: Pubkey,
        gateway: &dyn ContractGateway,
        encryption: &dyn EncryptionService,
    ) -> Result<SpinStep> {
        // The seed never leaves the client unencrypted
        let seed: u32 = self.rng.borrow_mut().gen();

        let mut input = EncryptedInput::new(snapshot.contract_address, user);
        input.add32(seed);
        let encrypted = encryption.encrypt(&input).await?;
        let handle = *encrypted
            .handles
            .first()
            .ok_or_else(|| error!(SpinError::EmptyEncryptedInput))?;

        if self.is_stale(snapshot) {
            return Ok(SpinStep::Stale);
        }

        self.set_message("Call spin...");
        let tx = gateway
            .spin(snapshot.contract_address, handle, &encrypted.input_proof)
            .await?;

        self.set_message(format!("Wait for tx:{}...", tx.id));
        let receipt = gateway.wait_for_confirmation(&tx).await?;
        self.set_message(format!("Spin completed status={}", receipt.status));
        require!(
            receipt.status == TransactionStatus::Success,
            SpinError::TransactionFailed
        );

        if self.is_stale(snapshot) {
            return Ok(SpinStep::Stale);
        }
        Ok(SpinStep::Confirmed(receipt))
    }
}
