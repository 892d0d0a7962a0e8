use super::responses::Jws;
use crate::error::{Error, Result};
use base64::engine::{general_purpose::URL_SAFE_NO_PAD as BASE64, Engine};
use openssl::{
    bn::{BigNum, BigNumContext},
    ecdsa::EcdsaSig,
    hash::{hash, MessageDigest},
    nid::Nid,
    pkey::{Id, PKey, Private},
    sha::{sha256, sha384, sha512},
    sign::Signer,
};
use serde::{ser::SerializeStruct, Serialize, Serializer};

/// Signature algorithms usable for ACME requests, per the restrictions of
/// [RFC 8555 Section 6.2](https://www.rfc-editor.org/rfc/rfc8555.html#section-6.2)
/// (`none` and MAC-based algorithms are denied).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
enum Algorithm {
    RS256,
    ES256,
    ES384,
    ES512,
}

impl TryFrom<&PKey<Private>> for Algorithm {
    type Error = Error;

    fn try_from(key: &PKey<Private>) -> Result<Self, Self::Error> {
        match key.id() {
            Id::RSA => Ok(Algorithm::RS256),
            Id::EC => {
                let ec = key.ec_key()?;
                match ec.group().curve_name() {
                    Some(Nid::X9_62_PRIME256V1) => Ok(Algorithm::ES256),
                    Some(Nid::SECP384R1) => Ok(Algorithm::ES384),
                    Some(Nid::SECP521R1) => Ok(Algorithm::ES512),
                    _ => Err(Error::UnsupportedEcdsaCurve),
                }
            }
            _ => Err(Error::UnsupportedKeyType),
        }
    }
}

/// The protected header of a JSON Web Signature according to
/// [RFC 8555 Section 6.2](https://www.rfc-editor.org/rfc/rfc8555.html#section-6.2)
#[derive(Debug, Serialize)]
struct Header<'h> {
    nonce: String,
    #[serde(rename = "alg")]
    algorithm: Algorithm,
    url: &'h str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'h str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<Jwk>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
enum Curve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl TryFrom<Nid> for Curve {
    type Error = Error;

    fn try_from(group: Nid) -> Result<Self, Self::Error> {
        match group {
            Nid::X9_62_PRIME256V1 => Ok(Curve::P256),
            Nid::SECP384R1 => Ok(Curve::P384),
            Nid::SECP521R1 => Ok(Curve::P521),
            _ => Err(Error::UnsupportedEcdsaCurve),
        }
    }
}

/// The public half of an account key
#[derive(Debug)]
enum Jwk {
    Rsa { e: String, n: String },
    Ec { crv: Curve, x: String, y: String },
}

impl TryFrom<&PKey<Private>> for Jwk {
    type Error = Error;

    fn try_from(key: &PKey<Private>) -> Result<Self, Self::Error> {
        match key.id() {
            Id::RSA => {
                let rsa = key.rsa()?;
                Ok(Jwk::Rsa {
                    e: BASE64.encode(rsa.e().to_vec()),
                    n: BASE64.encode(rsa.n().to_vec()),
                })
            }
            Id::EC => {
                let ec = key.ec_key()?;
                let ec_public = ec.public_key();

                let mut ctx = BigNumContext::new()?;
                let mut x = BigNum::new()?;
                let mut y = BigNum::new()?;
                ec_public.affine_coordinates_gfp(ec.group(), &mut x, &mut y, &mut ctx)?;

                let curve = ec
                    .group()
                    .curve_name()
                    .ok_or(Error::UnsupportedEcdsaCurve)?;

                Ok(Jwk::Ec {
                    x: BASE64.encode(x.to_vec()),
                    y: BASE64.encode(y.to_vec()),
                    crv: Curve::try_from(curve)?,
                })
            }
            _ => Err(Error::UnsupportedKeyType),
        }
    }
}

// Serialization is implemented manually to guarantee the lexicographical field
// ordering required by RFC 7638 Section 3 for thumbprint computation.
impl Serialize for Jwk {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // 1 + number of fields taking into account the `kty`
        let (fields, kty) = match self {
            Self::Rsa { .. } => (3, "RSA"),
            Self::Ec { .. } => (4, "EC"),
        };

        let mut state = serializer.serialize_struct("Jwk", fields)?;
        match self {
            Self::Rsa { e, n } => {
                state.serialize_field("e", e)?;
                state.serialize_field("kty", kty)?;
                state.serialize_field("n", n)?;
            }
            Self::Ec { crv, x, y } => {
                state.serialize_field("crv", crv)?;
                state.serialize_field("kty", kty)?;
                state.serialize_field("x", x)?;
                state.serialize_field("y", y)?;
            }
        }
        state.end()
    }
}

/// Create a JWS for the request. Requests made before an account exists embed the
/// public JWK; requests afterwards reference the account URL as the `kid`.
pub(crate) fn sign(
    url: &str,
    nonce: String,
    payload: &str,
    private_key: &PKey<Private>,
    account_id: Option<&str>,
) -> Result<Jws> {
    let payload = BASE64.encode(payload.as_bytes());

    let algorithm = Algorithm::try_from(private_key)?;
    let header = match account_id {
        Some(kid) => Header {
            algorithm,
            url,
            nonce,
            kid: Some(kid),
            jwk: None,
        },
        None => Header {
            algorithm,
            url,
            nonce,
            kid: None,
            jwk: Some(Jwk::try_from(private_key)?),
        },
    };

    let protected = serde_json::to_vec(&header)?;
    let protected = BASE64.encode(protected);

    let signature = signer(private_key, &protected, &payload)?;
    let signature = BASE64.encode(signature);

    Ok(Jws {
        protected,
        payload,
        signature,
    })
}

/// Generate the signature for the protected header and message payload
fn signer(private_key: &PKey<Private>, protected: &str, payload: &str) -> Result<Vec<u8>> {
    let data = format!("{protected}.{payload}").into_bytes();

    match private_key.id() {
        Id::RSA => {
            let sig =
                Signer::new(MessageDigest::sha256(), private_key)?.sign_oneshot_to_vec(&data)?;
            Ok(sig)
        }
        Id::EC => {
            let ec = private_key.ec_key()?;
            let digest = match ec.group().curve_name() {
                Some(Nid::X9_62_PRIME256V1) => sha256(&data).to_vec(),
                Some(Nid::SECP384R1) => sha384(&data).to_vec(),
                Some(Nid::SECP521R1) => sha512(&data).to_vec(),
                _ => return Err(Error::UnsupportedEcdsaCurve),
            };

            let sig = EcdsaSig::sign(&digest, &ec)?;
            let r = sig.r().to_vec();
            let s = sig.s().to_vec();

            let mut result = Vec::with_capacity(r.len() + s.len());
            result.extend_from_slice(&r);
            result.extend_from_slice(&s);
            Ok(result)
        }
        _ => Err(Error::UnsupportedKeyType),
    }
}

/// Generate the key authorization for the token and account key
pub(crate) fn key_authorization(token: &str, private_key: &PKey<Private>) -> Result<String> {
    let jwk = Jwk::try_from(private_key)?;
    let serialized = serde_json::to_vec(&jwk)?;
    let digest = hash(MessageDigest::sha256(), &serialized)?;
    let thumbprint = BASE64.encode(digest);

    Ok(format!("{token}.{thumbprint}"))
}

/// The TXT record value for a DNS-01 challenge: the base64url SHA-256 digest of the
/// key authorization, per [RFC 8555 Section 8.4](https://www.rfc-editor.org/rfc/rfc8555.html#section-8.4)
pub(crate) fn dns_record_content(token: &str, private_key: &PKey<Private>) -> Result<String> {
    let authorization = key_authorization(token, private_key)?;
    let digest = hash(MessageDigest::sha256(), authorization.as_bytes())?;
    Ok(BASE64.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::{dns_record_content, key_authorization, sign, Jwk, BASE64};
    use base64::Engine;
    use openssl::{
        ec::{EcGroup, EcKey},
        hash::MessageDigest,
        nid::Nid,
        pkey::{PKey, Private},
        rsa::Rsa,
        sign::Verifier,
    };

    fn rsa_key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    fn p256_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    const URL: &str = "https://acme-staging-v02.api.letsencrypt.org/acme/new-acct";
    const NONCE: &str = "A272VFpvC1e7H0YZ14_-fLlbt9Gg8bR-dGtl0PqjuGX_-o8";

    #[test]
    fn jwk_fields_are_ordered_rsa() {
        let jwk = Jwk::try_from(&rsa_key()).unwrap();
        let serialized = serde_json::to_string(&jwk).unwrap();

        let e = serialized.find("\"e\"").unwrap();
        let kty = serialized.find("\"kty\":\"RSA\"").unwrap();
        let n = serialized.find("\"n\"").unwrap();
        assert!(e < kty && kty < n);
    }

    #[test]
    fn jwk_fields_are_ordered_ec() {
        let jwk = Jwk::try_from(&p256_key()).unwrap();
        let serialized = serde_json::to_string(&jwk).unwrap();

        let crv = serialized.find("\"crv\":\"P-256\"").unwrap();
        let kty = serialized.find("\"kty\":\"EC\"").unwrap();
        let x = serialized.find("\"x\"").unwrap();
        let y = serialized.find("\"y\"").unwrap();
        assert!(crv < kty && kty < x && x < y);
    }

    #[test]
    fn sign_without_account_embeds_jwk() {
        let key = rsa_key();
        let jws = sign(URL, NONCE.into(), "{}", &key, None).unwrap();

        let protected = BASE64.decode(&jws.protected).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&protected).unwrap();

        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["nonce"], NONCE);
        assert_eq!(header["url"], URL);
        assert!(header.get("kid").is_none());
        assert_eq!(header["jwk"]["kty"], "RSA");
    }

    #[test]
    fn sign_with_account_references_kid() {
        let key = p256_key();
        let jws = sign(URL, NONCE.into(), "{}", &key, Some("0123456")).unwrap();

        let protected = BASE64.decode(&jws.protected).unwrap();
        let header: serde_json::Value = serde_json::from_slice(&protected).unwrap();

        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["kid"], "0123456");
        assert!(header.get("jwk").is_none());
    }

    #[test]
    fn rsa_signature_verifies() {
        let key = rsa_key();
        let jws = sign(URL, NONCE.into(), "this is a test payload", &key, None).unwrap();

        let data = format!("{}.{}", jws.protected, jws.payload);
        let signature = BASE64.decode(&jws.signature).unwrap();

        let mut verifier = Verifier::new(MessageDigest::sha256(), &key).unwrap();
        assert!(verifier.verify_oneshot(&signature, data.as_bytes()).unwrap());
    }

    #[test]
    fn key_authorization_format() {
        let key = rsa_key();
        let authorization = key_authorization("testing-token", &key).unwrap();

        let (token, thumbprint) = authorization.split_once('.').unwrap();
        assert_eq!(token, "testing-token");
        // base64url SHA-256 digests are always 43 characters unpadded
        assert_eq!(thumbprint.len(), 43);
    }

    #[test]
    fn dns_record_content_is_stable_digest() {
        let key = rsa_key();

        let first = dns_record_content("DGyRejmCefe7v4NfDGDKfA", &key).unwrap();
        let second = dns_record_content("DGyRejmCefe7v4NfDGDKfA", &key).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 43);
        assert!(!first.contains('='));

        let other = dns_record_content("another-token", &key).unwrap();
        assert_ne!(first, other);
    }
}
