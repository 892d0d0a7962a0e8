use crate::{
    acme::DnsChallenge,
    dns::{DnsProvider, RecordAction, RecordSet},
    error::Result,
    identifier::Identifier,
    zone,
};
use tracing::{debug, warn};

/// Challenge records are short-lived; a small TTL keeps stale data out of
/// resolver caches between validation attempts
const CHALLENGE_RECORD_TTL: i64 = 10;

/// Compute the validation record name for an identifier.
///
/// The wildcard marker is stripped, so `*.example.com` and `example.com` both
/// validate at `_acme-challenge.example.com`, as DNS-01 requires.
pub fn challenge_record_name(identifier: &Identifier, challenge: &DnsChallenge) -> String {
    format!("{}.{}", challenge.record_name, identifier.base())
}

/// A challenge record this tool created and is responsible for removing
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ManagedDnsRecord {
    pub zone_id: String,
    pub name: String,
    pub record_type: String,
    pub value: String,
}

impl ManagedDnsRecord {
    fn to_record_set(&self) -> RecordSet {
        RecordSet {
            name: self.name.clone(),
            record_type: self.record_type.clone(),
            ttl: CHALLENGE_RECORD_TTL,
            value: self.value.clone(),
        }
    }
}

/// Create/delete of a single challenge record as a scoped resource.
///
/// Every record returned by [`RecordLifecycle::create`] must be passed to
/// [`RecordLifecycle::delete`] on every exit path from validation; deletion is
/// best-effort and never masks the validation outcome.
pub struct RecordLifecycle<'a, D> {
    provider: &'a D,
}

impl<'a, D: DnsProvider> RecordLifecycle<'a, D> {
    pub fn new(provider: &'a D) -> RecordLifecycle<'a, D> {
        RecordLifecycle { provider }
    }

    /// Create the challenge record and block until the provider confirms it has
    /// propagated to its authoritative servers
    pub async fn create(
        &self,
        identifier: &Identifier,
        challenge: &DnsChallenge,
    ) -> Result<ManagedDnsRecord> {
        let zone = zone::resolve_zone(self.provider, identifier.base()).await?;

        let record = ManagedDnsRecord {
            zone_id: zone.id,
            name: challenge_record_name(identifier, challenge),
            record_type: challenge.record_type.clone(),
            value: challenge.record_content.clone(),
        };

        debug!(record = %record.name, zone = %record.zone_id, "creating challenge record");
        let change = self
            .provider
            .change_record_set(&record.zone_id, RecordAction::Create, &record.to_record_set())
            .await?;
        self.provider.wait_until_propagated(&change).await?;

        Ok(record)
    }

    /// Delete the record created by [`RecordLifecycle::create`].
    ///
    /// The challenge outcome is already determined by the time cleanup runs, so
    /// failures (including deleting an already-deleted record) are logged and
    /// swallowed.
    pub async fn delete(&self, record: &ManagedDnsRecord) {
        let result = self
            .provider
            .change_record_set(&record.zone_id, RecordAction::Delete, &record.to_record_set())
            .await;

        match result {
            Ok(_) => debug!(record = %record.name, "deleted challenge record"),
            Err(error) => {
                warn!(record = %record.name, %error, "failed to delete challenge record")
            }
        }
    }
}
