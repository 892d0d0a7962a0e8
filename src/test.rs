//! Scripted in-memory implementations of the [`AcmeClient`] and [`DnsProvider`]
//! capabilities, shared by the unit tests.

use crate::{
    acme::{AcmeClient, AcmeOrder, ChallengeState, DnsChallenge, OrderSnapshot},
    api::responses::{self, ChallengeStatus, ErrorType, OrderStatus},
    dns::{ChangeHandle, DnsProvider, HostedZone, RecordAction, RecordSet},
    error::{Error, Result},
    identifier::Identifier,
};
use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::Mutex,
};

/// A challenge as it would come back from a freshly created order
pub fn pending_challenge(domain: &str) -> DnsChallenge {
    DnsChallenge {
        url: format!("challenge://{domain}"),
        record_name: "_acme-challenge".to_owned(),
        record_content: format!("digest-for-{domain}"),
        record_type: "TXT".to_owned(),
        status: ChallengeStatus::Pending,
    }
}

/// A problem document with the given detail
pub fn problem(detail: &str) -> responses::Error {
    responses::Error {
        type_: ErrorType::Unauthorized,
        title: None,
        detail: Some(detail.to_owned()),
        status: Some(403),
    }
}

fn fault() -> Error {
    Error::Server(problem("scripted fault"))
}

/// One scripted response to a challenge poll
pub enum PollStep {
    State(ChallengeState),
    Fault,
}

impl PollStep {
    pub fn status(status: ChallengeStatus) -> PollStep {
        PollStep::State(ChallengeState {
            status,
            error: None,
        })
    }

    pub fn invalid(detail: &str) -> PollStep {
        PollStep::State(ChallengeState {
            status: ChallengeStatus::Invalid,
            error: Some(problem(detail)),
        })
    }
}

/// One scripted response to an order poll
pub enum OrderStep {
    Snapshot(OrderSnapshot),
    Fault,
}

impl OrderStep {
    pub fn status(status: OrderStatus) -> OrderStep {
        OrderStep::Snapshot(OrderSnapshot {
            status,
            error: None,
            certificate: None,
        })
    }

    pub fn valid(certificate: &str) -> OrderStep {
        OrderStep::Snapshot(OrderSnapshot {
            status: OrderStatus::Valid,
            error: None,
            certificate: Some(certificate.to_owned()),
        })
    }

    pub fn failed(detail: &str) -> OrderStep {
        OrderStep::Snapshot(OrderSnapshot {
            status: OrderStatus::Invalid,
            error: Some(problem(detail)),
            certificate: None,
        })
    }
}

/// An [`AcmeClient`] that answers polls from per-challenge scripts and records
/// what was asked of it.
///
/// An exhausted (or absent) script answers `pending`/`processing` forever, which
/// is what a CA that never converges looks like.
#[derive(Default)]
pub struct MockAcme {
    challenge_scripts: Mutex<HashMap<String, VecDeque<PollStep>>>,
    order_script: Mutex<VecDeque<OrderStep>>,
    validation_requests: Mutex<Vec<String>>,
    finalized_csr: Mutex<Option<Vec<u8>>>,
}

impl MockAcme {
    pub fn new() -> MockAcme {
        MockAcme::default()
    }

    pub fn script(self, challenge_url: &str, steps: Vec<PollStep>) -> MockAcme {
        self.challenge_scripts
            .lock()
            .unwrap()
            .insert(challenge_url.to_owned(), steps.into());
        self
    }

    pub fn order_script(self, steps: Vec<OrderStep>) -> MockAcme {
        *self.order_script.lock().unwrap() = steps.into();
        self
    }

    pub fn validation_requests(&self) -> Vec<String> {
        self.validation_requests.lock().unwrap().clone()
    }

    pub fn finalized_csr(&self) -> Option<Vec<u8>> {
        self.finalized_csr.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AcmeClient for MockAcme {
    async fn create_order(&self, identifiers: &[Identifier]) -> Result<AcmeOrder> {
        Ok(AcmeOrder {
            url: "order://1".to_owned(),
            finalize_url: "order://1/finalize".to_owned(),
            challenges: identifiers
                .iter()
                .map(|identifier| pending_challenge(&identifier.to_string()))
                .collect(),
        })
    }

    async fn request_validation(&self, challenge: &DnsChallenge) -> Result<()> {
        self.validation_requests
            .lock()
            .unwrap()
            .push(challenge.url.clone());
        Ok(())
    }

    async fn poll_challenge(&self, challenge: &DnsChallenge) -> Result<ChallengeState> {
        let step = self
            .challenge_scripts
            .lock()
            .unwrap()
            .get_mut(&challenge.url)
            .and_then(VecDeque::pop_front);

        match step {
            Some(PollStep::State(state)) => Ok(state),
            Some(PollStep::Fault) => Err(fault()),
            None => Ok(ChallengeState {
                status: ChallengeStatus::Pending,
                error: None,
            }),
        }
    }

    async fn finalize_order(&self, _order: &AcmeOrder, csr_der: &[u8]) -> Result<()> {
        *self.finalized_csr.lock().unwrap() = Some(csr_der.to_vec());
        Ok(())
    }

    async fn poll_order(&self, _order: &AcmeOrder) -> Result<OrderSnapshot> {
        match self.order_script.lock().unwrap().pop_front() {
            Some(OrderStep::Snapshot(snapshot)) => Ok(snapshot),
            Some(OrderStep::Fault) => Err(fault()),
            None => Ok(OrderSnapshot {
                status: OrderStatus::Processing,
                error: None,
                certificate: None,
            }),
        }
    }
}

/// A [`DnsProvider`] over a fixed zone list that records every change it accepts
#[derive(Default)]
pub struct MockDns {
    zones: Vec<HostedZone>,
    fail_create: bool,
    fail_delete: bool,
    fail_propagation: bool,
    changes: Mutex<Vec<(String, RecordAction, RecordSet)>>,
    propagation_waits: Mutex<usize>,
}

impl MockDns {
    pub fn with_zones(zones: &[(&str, &str)]) -> MockDns {
        MockDns {
            zones: zones
                .iter()
                .map(|(id, name)| HostedZone {
                    id: (*id).to_owned(),
                    name: (*name).to_owned(),
                })
                .collect(),
            ..MockDns::default()
        }
    }

    pub fn fail_create(mut self) -> MockDns {
        self.fail_create = true;
        self
    }

    pub fn fail_delete(mut self) -> MockDns {
        self.fail_delete = true;
        self
    }

    pub fn fail_propagation(mut self) -> MockDns {
        self.fail_propagation = true;
        self
    }

    /// Changes the provider accepted, in submission order
    pub fn changes(&self) -> Vec<(String, RecordAction, RecordSet)> {
        self.changes.lock().unwrap().clone()
    }

    pub fn propagation_waits(&self) -> usize {
        *self.propagation_waits.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDns {
    async fn list_zones(&self) -> Result<Vec<HostedZone>> {
        Ok(self.zones.clone())
    }

    async fn change_record_set(
        &self,
        zone_id: &str,
        action: RecordAction,
        record: &RecordSet,
    ) -> Result<ChangeHandle> {
        let rejected = match action {
            RecordAction::Create => self.fail_create,
            RecordAction::Delete => self.fail_delete,
        };
        if rejected {
            return Err(Error::dns_provider(io::Error::new(
                io::ErrorKind::Other,
                "change rejected by script",
            )));
        }

        let mut changes = self.changes.lock().unwrap();
        changes.push((zone_id.to_owned(), action, record.clone()));

        Ok(ChangeHandle(format!("change-{}", changes.len())))
    }

    async fn wait_until_propagated(&self, _change: &ChangeHandle) -> Result<()> {
        *self.propagation_waits.lock().unwrap() += 1;

        if self.fail_propagation {
            Err(Error::ProvisioningTimeout)
        } else {
            Ok(())
        }
    }
}
