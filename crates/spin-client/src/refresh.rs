use tracing::{debug, info, warn};

use crate::orchestrator::{FlagGuard, Outcome, SpinOrchestrator};
use crate::state::Family;

impl SpinOrchestrator {
    /// Re-reads the reward handle and, if that worked, the random-result
    /// handle.
    ///
    /// The reward read is mandatory: its failure ends the refresh with a
    /// status message. The random-result read is optional: a user who never
    /// spun has none, so its failure just clears the handle.
    pub async fn refresh(&self) -> Outcome {
        if self.is_refreshing() {
            debug!("refresh already in flight");
            return Outcome::Busy;
        }

        let (Some(contract), Some(gateway)) = (self.contract_address(), self.gateway.clone()) else {
            self.report_missing_deployment();
            self.update(|s| s.set_reward_handle(None));
            return Outcome::Unavailable;
        };

        let Some(_guard) = FlagGuard::acquire(&self.state, Family::Refresh) else {
            return Outcome::Busy;
        };
        let snapshot = self.snapshot(contract);

        let reward = match gateway.get_user_reward(contract).await {
            Ok(reward) => reward,
            Err(err) => {
                warn!(%contract, error = %err, "reward read failed");
                self.set_message(format!("Reward read failed: {err}"));
                return Outcome::Failed;
            }
        };

        if self.is_stale(&snapshot) {
            debug!(%contract, "session changed, discarding reward handle");
            self.set_message("Refresh ignored: session changed");
            return Outcome::Stale;
        }
        self.update(|s| s.set_reward_handle(Some(reward)));

        let random_result = gateway.get_user_random_result(contract).await;
        if self.is_stale(&snapshot) {
            debug!(%contract, "session changed, discarding random result handle");
            self.set_message("Refresh ignored: session changed");
            return Outcome::Stale;
        }

        match random_result {
            Ok(handle) => {
                self.update(|s| s.set_random_result_handle(Some(handle)));
            }
            Err(err) => {
                debug!(%contract, error = %err, "no random result yet");
                self.update(|s| s.set_random_result_handle(None));
            }
        }

        info!(
            %contract,
            reward = %reward.reward,
            level = %reward.level,
            "handles refreshed"
        );
        Outcome::Completed
    }
}
