//! Certificate issuance through ACME DNS-01 challenges answered in Route 53.
//!
//! The [`OrderOrchestrator`] drives an order end to end: it creates the order,
//! provisions one `_acme-challenge` TXT record at a time, waits for the CA to
//! validate it, removes the record again, and finally submits a CSR and
//! downloads the issued certificate. The ACME and DNS sides are behind the
//! [`AcmeClient`] and [`DnsProvider`] traits; [`Account`] and
//! [`Route53Provider`] are the real implementations.

mod acme;
mod api;
mod csr;
mod dns;
mod error;
mod identifier;
pub mod keys;
mod orchestrator;
mod record;
#[cfg(test)]
mod test;
mod validator;
mod zone;

pub use acme::{Account, AcmeClient, AcmeOrder, ChallengeState, DnsChallenge, OrderSnapshot};
pub use api::{responses, Api, LETS_ENCRYPT_PRODUCTION_URL, LETS_ENCRYPT_STAGING_URL};
pub use dns::{ChangeHandle, DnsProvider, HostedZone, RecordAction, RecordSet, Route53Provider};
pub use error::{BoxError, Error};
pub use identifier::Identifier;
pub use orchestrator::OrderOrchestrator;
pub use validator::{ChallengeValidator, PollConfig};
