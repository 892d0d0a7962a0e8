use crate::{
    error::{Error, Result},
    identifier::Identifier,
};
use openssl::{
    hash::MessageDigest,
    pkey::{PKey, Private},
    stack::Stack,
    x509::{extension::SubjectAlternativeName, X509NameBuilder, X509ReqBuilder},
};

/// Build a DER-encoded certificate signing request for the identifiers.
///
/// The first identifier becomes the common name and every identifier appears as
/// a DNS subject alternative name in its submitted form, wildcard marker
/// included.
pub fn build(identifiers: &[Identifier], key: &PKey<Private>) -> Result<Vec<u8>> {
    let common_name = identifiers.first().ok_or(Error::MissingIdentifiers)?;

    let mut subject = X509NameBuilder::new()?;
    subject.append_entry_by_text("CN", &common_name.to_string())?;
    let subject = subject.build();

    let mut builder = X509ReqBuilder::new()?;
    builder.set_version(0)?;
    builder.set_subject_name(&subject)?;
    builder.set_pubkey(key)?;

    let mut names = SubjectAlternativeName::new();
    for identifier in identifiers {
        names.dns(&identifier.to_string());
    }
    let extension = names.build(&builder.x509v3_context(None))?;

    let mut extensions = Stack::new()?;
    extensions.push(extension)?;
    builder.add_extensions(&extensions)?;

    builder.sign(key, MessageDigest::sha256())?;

    Ok(builder.build().to_der()?)
}

#[cfg(test)]
mod tests {
    use super::build;
    use crate::{error::Error, identifier::Identifier};
    use openssl::{pkey::PKey, rsa::Rsa};
    use x509_parser::prelude::{
        FromDer, GeneralName, ParsedExtension, X509CertificationRequest,
    };

    fn identifiers(domains: &[&str]) -> Vec<Identifier> {
        domains.iter().map(|domain| Identifier::parse(domain)).collect()
    }

    fn dns_names(der: &[u8]) -> Vec<String> {
        let (_, request) = X509CertificationRequest::from_der(der).unwrap();

        let san = request
            .requested_extensions()
            .expect("no extensions requested")
            .find_map(|extension| match extension {
                ParsedExtension::SubjectAlternativeName(san) => Some(san),
                _ => None,
            })
            .expect("no subject alternative name extension");

        san.general_names
            .iter()
            .map(|name| match name {
                GeneralName::DNSName(name) => (*name).to_owned(),
                other => panic!("unexpected general name: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn requires_at_least_one_identifier() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let error = build(&[], &key).unwrap_err();
        assert!(matches!(error, Error::MissingIdentifiers));
    }

    #[test]
    fn common_name_is_the_first_identifier() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let der = build(&identifiers(&["example.com", "www.example.com"]), &key).unwrap();
        let (_, request) = X509CertificationRequest::from_der(&der).unwrap();

        let common_name = request
            .certification_request_info
            .subject
            .iter_common_name()
            .next()
            .unwrap();
        assert_eq!(common_name.as_str().unwrap(), "example.com");
    }

    #[test]
    fn every_identifier_appears_verbatim_in_the_san() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let der = build(
            &identifiers(&["example.com", "*.example.com", "www.example.org"]),
            &key,
        )
        .unwrap();

        assert_eq!(
            dns_names(&der),
            vec!["example.com", "*.example.com", "www.example.org"]
        );
    }

    #[test]
    fn request_is_signed_with_the_key() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let der = build(&identifiers(&["example.com"]), &key).unwrap();
        let (_, request) = X509CertificationRequest::from_der(&der).unwrap();

        assert!(request.verify_signature().is_ok());
    }
}
