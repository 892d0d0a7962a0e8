use crate::{
    dns::{DnsProvider, HostedZone},
    error::{Error, Result},
};

/// Derive the DNS zone apex for a fully-qualified domain name as the last two
/// labels joined with a trailing dot: `foo.bar.example.com` -> `example.com.`.
///
/// This heuristic is only valid for two-label public suffixes. Domains under a
/// multi-label public suffix (e.g. `example.co.uk` -> `co.uk.`) produce an apex
/// that will not match any hosted zone and fail zone resolution; they are not
/// corrected silently.
pub fn zone_apex(fqdn: &str) -> String {
    let name = fqdn.trim_end_matches('.');
    let labels: Vec<&str> = name.split('.').collect();
    let apex = labels.len().saturating_sub(2);
    format!("{}.", labels[apex..].join("."))
}

/// Find the hosted zone whose name exactly equals the apex computed for the domain
pub async fn resolve_zone<D: DnsProvider>(provider: &D, fqdn: &str) -> Result<HostedZone> {
    let apex = zone_apex(fqdn);

    provider
        .list_zones()
        .await?
        .into_iter()
        .find(|zone| zone.name == apex)
        .ok_or(Error::ZoneNotFound(apex))
}

#[cfg(test)]
mod tests {
    use super::{resolve_zone, zone_apex};
    use crate::{error::Error, test::MockDns};

    #[test]
    fn apex_of_nested_subdomain() {
        assert_eq!(zone_apex("a.b.example.com"), "example.com.");
    }

    #[test]
    fn apex_of_apex() {
        assert_eq!(zone_apex("example.com"), "example.com.");
    }

    #[test]
    fn apex_ignores_trailing_dot() {
        assert_eq!(zone_apex("www.example.com."), "example.com.");
    }

    #[test]
    fn apex_of_single_label() {
        assert_eq!(zone_apex("localhost"), "localhost.");
    }

    #[test]
    fn apex_under_multi_label_suffix_is_degenerate() {
        // Documented limitation: no public-suffix list is consulted
        assert_eq!(zone_apex("example.co.uk"), "co.uk.");
    }

    #[tokio::test]
    async fn resolve_matching_zone() {
        let provider = MockDns::with_zones(&[("Z1", "example.com."), ("Z2", "example.org.")]);

        let zone = resolve_zone(&provider, "www.example.org").await.unwrap();
        assert_eq!(zone.id, "Z2");
        assert_eq!(zone.name, "example.org.");
    }

    #[tokio::test]
    async fn resolve_requires_exact_name_match() {
        let provider = MockDns::with_zones(&[("Z1", "www.example.com.")]);

        let error = resolve_zone(&provider, "www.example.com").await.unwrap_err();
        assert!(matches!(error, Error::ZoneNotFound(apex) if apex == "example.com."));
    }

    #[tokio::test]
    async fn resolve_without_zones() {
        let provider = MockDns::with_zones(&[]);

        let error = resolve_zone(&provider, "example.com").await.unwrap_err();
        assert!(matches!(error, Error::ZoneNotFound(_)));
    }
}
