use crate::{
    acme::{AcmeClient, ChallengeState, DnsChallenge},
    error::{Error, Result},
};
use std::time::Duration;
use tokio::time;
use tracing::debug;

/// Budget for waiting on asynchronous remote state: a fixed interval between
/// polls and a maximum number of polls before giving up
#[derive(Clone, Copy, Debug)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

/// Drives a single identifier's challenge to a terminal state.
///
/// Validation is requested exactly once, then the challenge is polled until the
/// server reports `valid` or `invalid`. The validator reports the terminal state
/// without judging it; deciding what an invalid challenge means for the order is
/// the orchestrator's job.
pub struct ChallengeValidator<'a, A> {
    acme: &'a A,
    config: PollConfig,
}

impl<'a, A: AcmeClient> ChallengeValidator<'a, A> {
    pub fn new(acme: &'a A, config: PollConfig) -> ChallengeValidator<'a, A> {
        ChallengeValidator { acme, config }
    }

    /// Request validation and poll the challenge to a terminal state
    pub async fn validate(&self, challenge: &DnsChallenge) -> Result<ChallengeState> {
        self.acme.request_validation(challenge).await?;

        let mut attempts = 0;
        loop {
            let state = self.acme.poll_challenge(challenge).await?;
            if state.status.is_terminal() {
                return Ok(state);
            }

            if attempts >= self.config.max_attempts {
                return Err(Error::ValidationTimeout);
            }
            attempts += 1;

            debug!(url = %challenge.url, status = ?state.status, attempts, "challenge not yet terminal");
            time::sleep(self.config.interval).await;
        }
    }
}
