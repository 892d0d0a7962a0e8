use crate::{
    acme::{AcmeClient, AcmeOrder},
    api::responses::{ChallengeStatus, OrderStatus},
    csr,
    dns::DnsProvider,
    error::{Error, Result},
    identifier::Identifier,
    record::RecordLifecycle,
    validator::{ChallengeValidator, PollConfig},
};
use openssl::pkey::{PKey, Private};
use tokio::time;
use tracing::{debug, info};

/// Drives a certificate order from creation to an issued certificate.
///
/// Identifiers are authorized strictly one at a time: provision the challenge
/// record, wait for it to propagate, let the CA validate it, then remove the
/// record before touching the next identifier. The record is removed on every
/// exit path from validation, including errors, and the order is abandoned on
/// the first identifier that fails.
pub struct OrderOrchestrator<'a, A, D> {
    acme: &'a A,
    dns: &'a D,
    poll: PollConfig,
}

impl<'a, A: AcmeClient, D: DnsProvider> OrderOrchestrator<'a, A, D> {
    pub fn new(acme: &'a A, dns: &'a D, poll: PollConfig) -> OrderOrchestrator<'a, A, D> {
        OrderOrchestrator { acme, dns, poll }
    }

    /// Obtain a certificate for the identifiers, returning the PEM chain
    pub async fn issue(
        &self,
        identifiers: &[Identifier],
        certificate_key: &PKey<Private>,
    ) -> Result<String> {
        if identifiers.is_empty() {
            return Err(Error::MissingIdentifiers);
        }

        let order = self.acme.create_order(identifiers).await?;
        if order.challenges.len() != identifiers.len() {
            return Err(Error::AuthorizationMismatch {
                expected: identifiers.len(),
                actual: order.challenges.len(),
            });
        }

        let lifecycle = RecordLifecycle::new(self.dns);
        let validator = ChallengeValidator::new(self.acme, self.poll);

        for (identifier, challenge) in identifiers.iter().zip(&order.challenges) {
            info!(%identifier, "authorizing");

            let record = lifecycle.create(identifier, challenge).await?;

            // Capture the outcome so cleanup runs before any error propagates
            let outcome = validator.validate(challenge).await;
            lifecycle.delete(&record).await;
            let state = outcome?;

            if state.status != ChallengeStatus::Valid {
                return Err(Error::ChallengeInvalid {
                    identifier: identifier.to_string(),
                    status: state.status,
                    reason: state
                        .error
                        .and_then(|error| error.reason().map(str::to_owned)),
                });
            }

            info!(%identifier, "authorized");
        }

        let csr = csr::build(identifiers, certificate_key)?;
        self.acme.finalize_order(&order, &csr).await?;

        self.await_certificate(&order).await
    }

    /// Poll the finalized order until the CA issues the certificate or fails
    /// the order
    async fn await_certificate(&self, order: &AcmeOrder) -> Result<String> {
        let mut attempts = 0;
        loop {
            let snapshot = self.acme.poll_order(order).await?;

            match snapshot.status {
                OrderStatus::Valid => {
                    return snapshot.certificate.ok_or(Error::MissingCertificate)
                }
                OrderStatus::Invalid => return Err(Error::OrderFailed(snapshot.error)),
                status => {
                    if attempts >= self.poll.max_attempts {
                        return Err(Error::FinalizationTimeout);
                    }
                    attempts += 1;

                    debug!(?status, attempts, "order not yet issued");
                    time::sleep(self.poll.interval).await;
                }
            }
        }
    }
}
