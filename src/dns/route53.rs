use super::{ChangeHandle, DnsProvider, HostedZone, RecordAction, RecordSet};
use crate::error::{Error, Result};
use aws_config::BehaviorVersion;
use aws_sdk_route53::{
    types::{Change, ChangeAction, ChangeBatch, ChangeStatus, ResourceRecord, ResourceRecordSet, RrType},
    Client,
};
use std::time::Duration;
use tokio::time;
use tracing::debug;

/// [`DnsProvider`] implementation over the Amazon Route 53 API.
///
/// Changes are submitted as single-change batches and propagation is confirmed by
/// polling `GetChange` until the change reaches `INSYNC`.
#[derive(Debug)]
pub struct Route53Provider {
    client: Client,
    poll_interval: Duration,
    max_poll_attempts: usize,
}

impl Route53Provider {
    /// Construct a provider from the ambient AWS credential chain (environment,
    /// shared config, instance metadata)
    pub async fn from_env() -> Route53Provider {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Route53Provider::new(Client::new(&config))
    }

    pub fn new(client: Client) -> Route53Provider {
        Route53Provider {
            client,
            // Route 53 propagation typically completes within a minute
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 60,
        }
    }
}

/// Route 53 requires TXT record values to be wrapped in double quotes
fn wire_value(record: &RecordSet) -> String {
    if record.record_type == "TXT" {
        format!("\"{}\"", record.value)
    } else {
        record.value.clone()
    }
}

#[async_trait::async_trait]
impl DnsProvider for Route53Provider {
    async fn list_zones(&self) -> Result<Vec<HostedZone>> {
        let mut zones = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.list_hosted_zones();
            if let Some(marker) = &marker {
                request = request.marker(marker);
            }

            let response = request.send().await.map_err(Error::dns_provider)?;
            zones.extend(response.hosted_zones().iter().map(|zone| HostedZone {
                id: zone.id().to_owned(),
                name: zone.name().to_owned(),
            }));

            marker = if response.is_truncated() {
                response.next_marker().map(str::to_owned)
            } else {
                None
            };
            if marker.is_none() {
                break;
            }
        }

        Ok(zones)
    }

    async fn change_record_set(
        &self,
        zone_id: &str,
        action: RecordAction,
        record: &RecordSet,
    ) -> Result<ChangeHandle> {
        let resource_record = ResourceRecord::builder()
            .value(wire_value(record))
            .build()
            .map_err(Error::dns_provider)?;
        let record_set = ResourceRecordSet::builder()
            .name(&record.name)
            .r#type(RrType::from(record.record_type.as_str()))
            .ttl(record.ttl)
            .resource_records(resource_record)
            .build()
            .map_err(Error::dns_provider)?;
        let change = Change::builder()
            .action(match action {
                RecordAction::Create => ChangeAction::Create,
                RecordAction::Delete => ChangeAction::Delete,
            })
            .resource_record_set(record_set)
            .build()
            .map_err(Error::dns_provider)?;
        let batch = ChangeBatch::builder()
            .changes(change)
            .build()
            .map_err(Error::dns_provider)?;

        let response = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(Error::dns_provider)?;

        let info = response
            .change_info()
            .ok_or_else(|| Error::DnsProvider("response carried no change info".into()))?;
        Ok(ChangeHandle(info.id().to_owned()))
    }

    async fn wait_until_propagated(&self, change: &ChangeHandle) -> Result<()> {
        for attempt in 0..self.max_poll_attempts {
            let response = self
                .client
                .get_change()
                .id(&change.0)
                .send()
                .await
                .map_err(Error::dns_provider)?;

            if let Some(info) = response.change_info() {
                if matches!(info.status(), ChangeStatus::Insync) {
                    return Ok(());
                }
            }

            debug!(change = %change.0, attempt, "change not yet in sync");
            time::sleep(self.poll_interval).await;
        }

        Err(Error::ProvisioningTimeout)
    }
}
