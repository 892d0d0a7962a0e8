use crate::api::responses::DnsIdentifier;
use std::fmt::{self, Display, Formatter};

/// A domain an order is requested for.
///
/// Parsed once at the boundary so the wildcard marker never needs re-detecting
/// downstream. The verbatim form (wildcard prefix included) is what the CA and the
/// certificate see; the `*.` prefix is stripped only when computing the DNS
/// validation record name and the zone apex.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Identifier {
    /// An exact domain name, e.g. `www.example.com`
    Exact(String),
    /// A wildcard, stored as its base name: `*.example.com` becomes `example.com`
    Wildcard(String),
}

impl Identifier {
    /// Parse a domain as passed on the command line
    pub fn parse<S: AsRef<str>>(name: S) -> Identifier {
        let name = name.as_ref();
        match name.strip_prefix("*.") {
            Some(base) => Identifier::Wildcard(base.to_owned()),
            None => Identifier::Exact(name.to_owned()),
        }
    }

    /// The domain name without any wildcard marker
    pub fn base(&self) -> &str {
        match self {
            Identifier::Exact(name) | Identifier::Wildcard(name) => name,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Identifier::Wildcard(_))
    }

    /// The wire form submitted to the ACME server
    pub(crate) fn to_wire(&self) -> DnsIdentifier {
        DnsIdentifier::Dns(self.to_string())
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Exact(name) => f.write_str(name),
            Identifier::Wildcard(base) => write!(f, "*.{base}"),
        }
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::parse(name)
    }
}
