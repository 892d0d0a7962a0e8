//! The ACME capability the orchestrator is built on.
//!
//! [`Account`] is the production implementation, wrapping the wire-level [`Api`]
//! with the account key and kid. The orchestration core depends only on the
//! [`AcmeClient`] trait so order flows can be tested against scripted servers.

use crate::{
    api::{dns_record_content, responses, Api},
    error::{Error, Result},
    identifier::Identifier,
};
use base64::engine::{general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use futures::future;
use openssl::pkey::{PKey, Private};
use responses::{AccountStatus, ChallengeStatus, ChallengeType, OrderStatus};

/// The subdomain label challenge records are provisioned under, per
/// [RFC 8555 Section 8.4](https://www.rfc-editor.org/rfc/rfc8555.html#section-8.4)
const CHALLENGE_RECORD_LABEL: &str = "_acme-challenge";

/// A DNS-01 challenge extracted from an order's authorization
#[derive(Clone, Debug)]
pub struct DnsChallenge {
    /// The challenge URL, used to trigger validation and refresh status
    pub url: String,
    /// The label to prepend to the identifier's base name, typically `_acme-challenge`
    pub record_name: String,
    /// The TXT record value proving control of the identifier
    pub record_content: String,
    /// The record type, always `TXT` for DNS-01
    pub record_type: String,
    /// The challenge status at the time the authorization was fetched
    pub status: ChallengeStatus,
}

/// A created certificate order with one DNS challenge per identifier,
/// index-aligned with the identifiers as submitted
#[derive(Clone, Debug)]
pub struct AcmeOrder {
    /// The order URL, used to refresh status after finalization
    pub url: String,
    /// The URL the CSR is sent to
    pub finalize_url: String,
    /// Per-identifier challenges, positionally aligned with the submitted identifiers
    pub challenges: Vec<DnsChallenge>,
}

/// The server-side state of a challenge at one poll
#[derive(Clone, Debug)]
pub struct ChallengeState {
    pub status: ChallengeStatus,
    /// The problem document the CA attached, if validation failed
    pub error: Option<responses::Error>,
}

/// The server-side state of an order at one poll
#[derive(Clone, Debug)]
pub struct OrderSnapshot {
    pub status: OrderStatus,
    pub error: Option<responses::Error>,
    /// The certificate chain in PEM form, present once the order is valid
    pub certificate: Option<String>,
}

/// The ACME operations the order orchestration depends on
#[async_trait::async_trait]
pub trait AcmeClient {
    /// Create an order for the identifiers, returning one DNS-01 challenge per
    /// identifier in submission order
    async fn create_order(&self, identifiers: &[Identifier]) -> Result<AcmeOrder>;

    /// Ask the CA to validate a challenge. Idempotent at the CA, but called
    /// exactly once per validation attempt.
    async fn request_validation(&self, challenge: &DnsChallenge) -> Result<()>;

    /// Refresh a challenge's server-side state
    async fn poll_challenge(&self, challenge: &DnsChallenge) -> Result<ChallengeState>;

    /// Submit the CSR (DER) for a fully-authorized order
    async fn finalize_order(&self, order: &AcmeOrder, csr_der: &[u8]) -> Result<()>;

    /// Refresh an order's server-side state, downloading the certificate once
    /// it is available
    async fn poll_order(&self, order: &AcmeOrder) -> Result<OrderSnapshot>;
}

/// An ACME account: the directory handle plus the account key and kid
#[derive(Debug)]
pub struct Account {
    api: Api,
    private_key: PKey<Private>,
    id: String,
}

impl Account {
    /// Register a new account (or return the existing one for the key)
    pub async fn register(
        api: Api,
        private_key: PKey<Private>,
        email: &str,
        agree_terms: bool,
    ) -> Result<Account> {
        let contacts = vec![format!("mailto:{email}")];
        let (id, account) = api
            .new_account(Some(contacts), agree_terms, false, &private_key)
            .await?;

        into_account(api, private_key, id, account)
    }

    /// Look up the existing account for the key, failing if none is registered
    pub async fn lookup(api: Api, private_key: PKey<Private>) -> Result<Account> {
        let (id, account) = api.new_account(None, false, true, &private_key).await?;

        into_account(api, private_key, id, account)
    }

    /// The account URL assigned by the CA
    pub fn id(&self) -> &str {
        &self.id
    }
}

fn into_account(
    api: Api,
    private_key: PKey<Private>,
    id: String,
    account: responses::Account,
) -> Result<Account> {
    ensure_usable(&account)?;

    Ok(Account {
        api,
        private_key,
        id,
    })
}

/// Deactivated and revoked accounts still resolve to a kid but cannot sign
/// requests
fn ensure_usable(account: &responses::Account) -> Result<()> {
    if account.status != AccountStatus::Valid {
        return Err(Error::InvalidAccount(account.status));
    }

    Ok(())
}

/// Extract the DNS-01 challenge from an authorization and derive its record
/// name/content
fn dns_challenge(
    authorization: responses::Authorization,
    private_key: &PKey<Private>,
) -> Result<DnsChallenge> {
    let responses::DnsIdentifier::Dns(domain) = &authorization.identifier;
    let domain = domain.clone();

    let challenge = authorization
        .challenges
        .into_iter()
        .find(|challenge| challenge.type_ == ChallengeType::Dns01)
        .ok_or(Error::MissingDnsChallenge(domain))?;

    Ok(DnsChallenge {
        record_content: dns_record_content(&challenge.token, private_key)?,
        record_name: CHALLENGE_RECORD_LABEL.to_owned(),
        record_type: "TXT".to_owned(),
        url: challenge.url,
        status: challenge.status,
    })
}

#[async_trait::async_trait]
impl AcmeClient for Account {
    async fn create_order(&self, identifiers: &[Identifier]) -> Result<AcmeOrder> {
        let wire = identifiers.iter().map(Identifier::to_wire).collect();
        let (url, order) = self.api.new_order(wire, &self.private_key, &self.id).await?;

        // Positional correspondence with the submitted identifiers is
        // authoritative, so the counts must line up
        if order.authorizations.len() != identifiers.len() {
            return Err(Error::AuthorizationMismatch {
                expected: identifiers.len(),
                actual: order.authorizations.len(),
            });
        }

        let authorizations = future::try_join_all(
            order
                .authorizations
                .iter()
                .map(|url| self.api.fetch_authorization(url, &self.private_key, &self.id)),
        )
        .await?;

        let challenges = authorizations
            .into_iter()
            .map(|authorization| dns_challenge(authorization, &self.private_key))
            .collect::<Result<_>>()?;

        Ok(AcmeOrder {
            url,
            finalize_url: order.finalize,
            challenges,
        })
    }

    async fn request_validation(&self, challenge: &DnsChallenge) -> Result<()> {
        self.api
            .validate_challenge(&challenge.url, &self.private_key, &self.id)
            .await?;
        Ok(())
    }

    async fn poll_challenge(&self, challenge: &DnsChallenge) -> Result<ChallengeState> {
        let challenge = self
            .api
            .fetch_challenge(&challenge.url, &self.private_key, &self.id)
            .await?;

        Ok(ChallengeState {
            status: challenge.status,
            error: challenge.error,
        })
    }

    async fn finalize_order(&self, order: &AcmeOrder, csr_der: &[u8]) -> Result<()> {
        self.api
            .finalize_order(
                &order.finalize_url,
                BASE64.encode(csr_der),
                &self.private_key,
                &self.id,
            )
            .await?;
        Ok(())
    }

    async fn poll_order(&self, order: &AcmeOrder) -> Result<OrderSnapshot> {
        let order = self
            .api
            .fetch_order(&order.url, &self.private_key, &self.id)
            .await?;

        let certificate = match (&order.status, &order.certificate) {
            (OrderStatus::Valid, Some(url)) => Some(
                self.api
                    .download_certificate(url, &self.private_key, &self.id)
                    .await?,
            ),
            _ => None,
        };

        Ok(OrderSnapshot {
            status: order.status,
            error: order.error,
            certificate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{dns_challenge, ensure_usable};
    use crate::{
        api::responses::{
            self, AccountStatus, Authorization, AuthorizationStatus, Challenge, ChallengeStatus,
            ChallengeType, DnsIdentifier,
        },
        error::Error,
    };
    use openssl::{
        pkey::{PKey, Private},
        rsa::Rsa,
    };

    fn account_key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    fn authorization(challenges: Vec<Challenge>) -> Authorization {
        Authorization {
            identifier: DnsIdentifier::Dns("example.com".into()),
            status: AuthorizationStatus::Pending,
            expires: None,
            challenges,
            wildcard: None,
        }
    }

    fn challenge(type_: ChallengeType, url: &str) -> Challenge {
        Challenge {
            url: url.into(),
            status: ChallengeStatus::Pending,
            validated: None,
            type_,
            token: "DGyRejmCefe7v4NfDGDKfA".into(),
            error: None,
        }
    }

    #[test]
    fn dns_challenge_is_selected_from_the_offered_set() {
        let authorization = authorization(vec![
            challenge(ChallengeType::Unknown, "https://ca.test/chall/http"),
            challenge(ChallengeType::Dns01, "https://ca.test/chall/dns"),
        ]);

        let challenge = dns_challenge(authorization, &account_key()).unwrap();

        assert_eq!(challenge.url, "https://ca.test/chall/dns");
        assert_eq!(challenge.record_name, "_acme-challenge");
        assert_eq!(challenge.record_type, "TXT");
        // base64url SHA-256 digests are always 43 characters unpadded
        assert_eq!(challenge.record_content.len(), 43);
        assert_eq!(challenge.status, ChallengeStatus::Pending);
    }

    #[test]
    fn authorization_without_dns_challenge_is_rejected() {
        let authorization =
            authorization(vec![challenge(ChallengeType::Unknown, "https://ca.test/chall/http")]);

        let error = dns_challenge(authorization, &account_key()).unwrap_err();
        assert!(matches!(error, Error::MissingDnsChallenge(domain) if domain == "example.com"));
    }

    fn account_with_status(status: AccountStatus) -> responses::Account {
        responses::Account {
            status,
            contacts: Some(vec!["mailto:admin@example.com".to_owned()]),
        }
    }

    #[test]
    fn valid_account_is_usable() {
        assert!(ensure_usable(&account_with_status(AccountStatus::Valid)).is_ok());
    }

    #[test]
    fn deactivated_account_is_rejected() {
        let error = ensure_usable(&account_with_status(AccountStatus::Deactivated)).unwrap_err();
        assert!(matches!(
            error,
            Error::InvalidAccount(AccountStatus::Deactivated)
        ));
    }

    #[test]
    fn revoked_account_is_rejected() {
        let error = ensure_usable(&account_with_status(AccountStatus::Revoked)).unwrap_err();
        assert!(matches!(error, Error::InvalidAccount(AccountStatus::Revoked)));
    }
}
