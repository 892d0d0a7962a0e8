//! The DNS provider capability the challenge record lifecycle is built on.
//!
//! Only Route 53 is implemented ([`Route53Provider`]), but the orchestration core
//! depends solely on the [`DnsProvider`] trait so tests can script provider
//! behavior and failures.

use crate::error::Result;

mod route53;

pub use route53::Route53Provider;

/// A zone hosted at the DNS provider
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostedZone {
    /// Provider-assigned zone id
    pub id: String,
    /// Zone apex with a trailing dot, e.g. `example.com.`
    pub name: String,
}

/// Whether a change creates or removes a record set
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordAction {
    Create,
    Delete,
}

/// A record set submitted to the provider. The value is stored unquoted; any
/// provider-specific TXT quoting convention is applied by the implementation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordSet {
    /// Fully-qualified record name
    pub name: String,
    /// Record type, e.g. `TXT`
    pub record_type: String,
    /// Time-to-live in seconds
    pub ttl: i64,
    /// Record value, unquoted
    pub value: String,
}

/// An in-flight change returned by the provider, used to await propagation
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeHandle(pub String);

/// Record CRUD against a single DNS provider's authoritative API
#[async_trait::async_trait]
pub trait DnsProvider {
    /// All zones hosted for the authenticated account
    async fn list_zones(&self) -> Result<Vec<HostedZone>>;

    /// Submit a record set change against a zone
    async fn change_record_set(
        &self,
        zone_id: &str,
        action: RecordAction,
        record: &RecordSet,
    ) -> Result<ChangeHandle>;

    /// Block until the provider confirms the change has propagated to its
    /// authoritative servers
    async fn wait_until_propagated(&self, change: &ChangeHandle) -> Result<()>;
}
