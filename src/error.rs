use crate::api::responses::{self, AccountStatus, ChallengeStatus};
use reqwest::header::ToStrError;
use std::{
    error::Error as StdError,
    fmt::{Display, Formatter},
    io,
    path::PathBuf,
};

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

/// A boxed error from an external collaborator (the DNS provider SDK)
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug)]
pub enum Error {
    /// Error returned by the ACME server
    Server(responses::Error),
    /// Account registration was rejected by the CA
    Registration(responses::Error),
    /// The account exists but cannot be used
    InvalidAccount(AccountStatus),
    /// Error occurred while processing an HTTP request
    Reqwest(reqwest::Error),
    /// Failed serializing a request payload
    Serialization(serde_json::Error),
    /// An OpenSSL operation failed
    OpenSsl(openssl::error::ErrorStack),
    /// The private key algorithm cannot be used for JWS signing
    UnsupportedKeyType,
    /// The ECDSA curve of the private key cannot be used for JWS signing
    UnsupportedEcdsaCurve,
    /// A required header was missing from the response
    MissingHeader(&'static str),
    /// A header contained invalid data
    InvalidHeader(&'static str, ToStrError),
    /// An explicitly specified key file could not be read
    KeyLoad { path: PathBuf, source: io::Error },
    /// A filesystem operation failed
    Io(io::Error),
    /// No certificate domains were specified
    MissingIdentifiers,
    /// The order's authorizations do not align with its identifiers
    AuthorizationMismatch { expected: usize, actual: usize },
    /// An authorization did not offer a DNS-01 challenge
    MissingDnsChallenge(String),
    /// No hosted zone matches the zone apex computed for the domain
    ZoneNotFound(String),
    /// The DNS provider API reported a failure
    DnsProvider(BoxError),
    /// The DNS provider did not confirm record propagation in time
    ProvisioningTimeout,
    /// The challenge did not reach a terminal state in time
    ValidationTimeout,
    /// The order did not leave the processing state in time
    FinalizationTimeout,
    /// A challenge reached a terminal state other than valid
    ChallengeInvalid {
        identifier: String,
        status: ChallengeStatus,
        reason: Option<String>,
    },
    /// The order reached the invalid state after finalization
    OrderFailed(Option<responses::Error>),
    /// The order is valid but the server did not provide a certificate URL
    MissingCertificate,
}

impl Error {
    /// Wrap a DNS provider SDK error
    pub(crate) fn dns_provider<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::DnsProvider(Box::new(err))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server(e) => {
                write!(f, "the ACME server returned an error: {}", e.code())?;
                if let Some(reason) = e.reason() {
                    write!(f, ": {reason}")?;
                }
                Ok(())
            }
            Self::Registration(e) => {
                write!(f, "account registration was rejected: {}", e.code())?;
                if let Some(reason) = e.reason() {
                    write!(f, ": {reason}")?;
                }
                Ok(())
            }
            Self::InvalidAccount(status) => {
                write!(f, "expected Valid account, got {status:?} account")
            }
            Self::Reqwest(_) => write!(f, "an error occurred while processing the request"),
            Self::Serialization(_) => write!(f, "an error occurred while serializing the request"),
            Self::OpenSsl(_) => write!(f, "an openssl operation failed"),
            Self::UnsupportedKeyType => write!(f, "the private key type cannot be used for JWS"),
            Self::UnsupportedEcdsaCurve => {
                write!(f, "the private key's ECDSA curve cannot be used for JWS")
            }
            Self::MissingHeader(name) => write!(f, "the `{name}` header was missing"),
            Self::InvalidHeader(name, _) => {
                write!(f, "the value of the `{name}` header was invalid")
            }
            Self::KeyLoad { path, .. } => write!(f, "cannot load key {}", path.display()),
            Self::Io(_) => write!(f, "a filesystem operation failed"),
            Self::MissingIdentifiers => write!(f, "at least one domain must be specified"),
            Self::AuthorizationMismatch { expected, actual } => write!(
                f,
                "expected {expected} authorizations for the order, got {actual}"
            ),
            Self::MissingDnsChallenge(identifier) => {
                write!(f, "no dns-01 challenge offered for {identifier}")
            }
            Self::ZoneNotFound(apex) => write!(f, "no hosted zone named {apex}"),
            Self::DnsProvider(_) => write!(f, "the DNS provider request failed"),
            Self::ProvisioningTimeout => {
                write!(f, "timed out waiting for the DNS record to propagate")
            }
            Self::ValidationTimeout => write!(
                f,
                "timed out waiting for the challenge to reach a terminal state"
            ),
            Self::FinalizationTimeout => {
                write!(f, "timed out waiting for the order to finish processing")
            }
            Self::ChallengeInvalid {
                identifier,
                status,
                reason,
            } => {
                write!(f, "challenge for {identifier} ended {status:?}")?;
                if let Some(reason) = reason {
                    write!(f, ": {reason}")?;
                }
                Ok(())
            }
            Self::OrderFailed(Some(e)) => write!(f, "the order failed: {}", e.code()),
            Self::OrderFailed(None) => write!(f, "the order failed"),
            Self::MissingCertificate => {
                write!(f, "the order is valid but no certificate was provided")
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Reqwest(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::OpenSsl(e) => Some(e),
            Self::InvalidHeader(_, e) => Some(e),
            Self::KeyLoad { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            Self::DnsProvider(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Reqwest(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(err: openssl::error::ErrorStack) -> Self {
        Self::OpenSsl(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::api::responses::{self, ErrorType};

    fn problem(detail: Option<&str>) -> responses::Error {
        responses::Error {
            type_: ErrorType::RateLimited,
            title: Some("Rate limited".to_owned()),
            detail: detail.map(str::to_owned),
            status: Some(429),
        }
    }

    #[test]
    fn server_error_display_includes_the_ca_reason() {
        let error = Error::Server(problem(Some("too many new orders in the last 3 hours")));
        assert_eq!(
            error.to_string(),
            "the ACME server returned an error: urn:ietf:params:acme:error:rateLimited: \
             too many new orders in the last 3 hours"
        );
    }

    #[test]
    fn server_error_display_falls_back_to_the_title() {
        let error = Error::Server(problem(None));
        assert_eq!(
            error.to_string(),
            "the ACME server returned an error: urn:ietf:params:acme:error:rateLimited: Rate limited"
        );
    }

    #[test]
    fn registration_rejection_display_includes_the_ca_reason() {
        let error = Error::Registration(responses::Error {
            type_: ErrorType::UserActionRequired,
            title: None,
            detail: Some("must agree to terms of service".to_owned()),
            status: Some(403),
        });
        assert_eq!(
            error.to_string(),
            "account registration was rejected: urn:ietf:params:acme:error:userActionRequired: \
             must agree to terms of service"
        );
    }
}
