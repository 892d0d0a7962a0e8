use crate::error::{Error, Result};
use openssl::pkey::{PKey, Private};
use reqwest::{header, Client, Response};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

mod jws;
mod nonce;
pub mod responses;

pub(crate) use jws::dns_record_content;
use responses::ErrorType;

/// The directory of Let's Encrypt's production environment
pub const LETS_ENCRYPT_PRODUCTION_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
/// The directory of Let's Encrypt's staging environment
pub const LETS_ENCRYPT_STAGING_URL: &str =
    "https://acme-staging-v02.api.letsencrypt.org/directory";

/// A handle to an ACME directory's operation endpoints.
///
/// Cheap to clone; all clones share the underlying HTTP client and nonce pool.
#[derive(Debug)]
pub struct Api(Arc<ApiInner>);

#[derive(Debug)]
struct ApiInner {
    client: Client,
    urls: responses::Directory,
    nonces: nonce::Pool,
}

impl Api {
    /// Construct the API for a directory from its root URL
    pub async fn from_url(url: &str, client: Client, max_nonces: usize) -> Result<Api> {
        let urls = client.get(url).send().await?.json().await?;

        let inner = ApiInner {
            client,
            urls,
            nonces: nonce::Pool::new(max_nonces),
        };
        Ok(Api(Arc::new(inner)))
    }

    /// Retrieve the next nonce, falling back to the newNonce endpoint when the pool
    /// is empty
    async fn next_nonce(&self) -> Result<String> {
        if let Some(nonce) = self.0.nonces.take() {
            return Ok(nonce);
        }

        let response = self.0.client.head(&self.0.urls.new_nonce).send().await?;
        header_value(&response, "replay-nonce")
    }

    /// Harvest the nonce from a response into the pool, if a usable one was
    /// provided
    fn stash_nonce(&self, response: &Response) {
        if let Some(nonce) = harvest_nonce(response) {
            self.0.nonces.stash(nonce);
        }
    }

    /// Perform an authenticated request to the API with a JSON body
    async fn request_json<S: Serialize>(
        &self,
        url: &str,
        body: S,
        private_key: &PKey<Private>,
        account_id: Option<&str>,
    ) -> Result<Response> {
        let body = serde_json::to_string(&body)?;
        self.request(url, &body, private_key, account_id).await
    }

    /// Perform an authenticated request to the API, retrying on a stale nonce
    async fn request(
        &self,
        url: &str,
        body: &str,
        private_key: &PKey<Private>,
        account_id: Option<&str>,
    ) -> Result<Response> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let nonce = self.next_nonce().await?;
            let body = jws::sign(url, nonce, body, private_key, account_id)?;
            let body = serde_json::to_vec(&body)?;

            let response = self
                .0
                .client
                .post(url)
                .header(header::CONTENT_TYPE, "application/jose+json")
                .body(body)
                .send()
                .await?;

            self.stash_nonce(&response);

            if response.status().is_success() {
                return Ok(response);
            }

            let err = response.json::<responses::Error>().await?;
            if err.type_ == ErrorType::BadNonce && attempt <= 3 {
                continue;
            }

            return Err(Error::Server(err));
        }
    }

    /// Perform the [newAccount](https://www.rfc-editor.org/rfc/rfc8555.html#section-7.3) operation.
    /// Returns the account's URL (kid) and creation response.
    pub(crate) async fn new_account(
        &self,
        contacts: Option<Vec<String>>,
        terms_of_service_agreed: bool,
        only_return_existing: bool,
        private_key: &PKey<Private>,
    ) -> Result<(String, responses::Account)> {
        let payload = responses::NewAccount {
            contacts,
            terms_of_service_agreed,
            only_return_existing,
        };
        let response = self
            .request_json(&self.0.urls.new_account, &payload, private_key, None)
            .await
            .map_err(registration_error)?;

        let id = location_header(&response)?;
        let account = response.json::<responses::Account>().await?;
        Ok((id, account))
    }

    /// Perform the [newOrder](https://www.rfc-editor.org/rfc/rfc8555.html#section-7.4) operation.
    /// Returns the order's URL and creation response.
    pub(crate) async fn new_order(
        &self,
        identifiers: Vec<responses::DnsIdentifier>,
        private_key: &PKey<Private>,
        account_id: &str,
    ) -> Result<(String, responses::Order)> {
        let payload = responses::NewOrder { identifiers };
        let response = self
            .request_json(
                &self.0.urls.new_order,
                &payload,
                private_key,
                Some(account_id),
            )
            .await?;

        let url = location_header(&response)?;
        let order = response.json().await?;
        Ok((url, order))
    }

    /// Fetch an order (POST-as-GET)
    pub(crate) async fn fetch_order(
        &self,
        url: &str,
        private_key: &PKey<Private>,
        account_id: &str,
    ) -> Result<responses::Order> {
        let response = self.request(url, "", private_key, Some(account_id)).await?;
        let order = response.json().await?;
        Ok(order)
    }

    /// Fetch an authorization (POST-as-GET)
    pub(crate) async fn fetch_authorization(
        &self,
        url: &str,
        private_key: &PKey<Private>,
        account_id: &str,
    ) -> Result<responses::Authorization> {
        let response = self.request(url, "", private_key, Some(account_id)).await?;
        let authorization = response.json().await?;
        Ok(authorization)
    }

    /// Fetch a challenge's current server-side state (POST-as-GET)
    pub(crate) async fn fetch_challenge(
        &self,
        url: &str,
        private_key: &PKey<Private>,
        account_id: &str,
    ) -> Result<responses::Challenge> {
        let response = self.request(url, "", private_key, Some(account_id)).await?;
        let challenge = response.json().await?;
        Ok(challenge)
    }

    /// Ask the server to validate a challenge
    pub(crate) async fn validate_challenge(
        &self,
        url: &str,
        private_key: &PKey<Private>,
        account_id: &str,
    ) -> Result<responses::Challenge> {
        let response = self
            .request(url, "{}", private_key, Some(account_id))
            .await?;
        let challenge = response.json().await?;
        Ok(challenge)
    }

    /// Finalize an order using the provided CSR (base64url DER)
    pub(crate) async fn finalize_order(
        &self,
        url: &str,
        csr: String,
        private_key: &PKey<Private>,
        account_id: &str,
    ) -> Result<responses::Order> {
        let payload = responses::FinalizeOrder { csr };
        let response = self
            .request_json(url, &payload, private_key, Some(account_id))
            .await?;
        let order = response.json().await?;
        Ok(order)
    }

    /// Download the issued certificate chain in PEM form
    pub(crate) async fn download_certificate(
        &self,
        url: &str,
        private_key: &PKey<Private>,
        account_id: &str,
    ) -> Result<String> {
        let response = self.request(url, "", private_key, Some(account_id)).await?;
        let certificate = response.text().await?;
        Ok(certificate)
    }
}

impl Clone for Api {
    fn clone(&self) -> Self {
        Api(Arc::clone(&self.0))
    }
}

/// Rejections of the registration itself get their own channel so the operator
/// sees them as such
fn registration_error(err: Error) -> Error {
    match err {
        Error::Server(e) => Error::Registration(e),
        other => other,
    }
}

/// Extract the replay nonce from a response. Harvesting is opportunistic, so a
/// missing or malformed header drops the nonce instead of failing the request.
fn harvest_nonce(response: &Response) -> Option<String> {
    let header = response.headers().get("replay-nonce")?;
    match header.to_str() {
        Ok(nonce) => Some(nonce.to_owned()),
        Err(_) => {
            warn!("ignoring malformed replay-nonce header");
            None
        }
    }
}

fn location_header(response: &Response) -> Result<String> {
    Ok(response
        .headers()
        .get(header::LOCATION)
        .ok_or(Error::MissingHeader("location"))?
        .to_str()
        .map_err(|e| Error::InvalidHeader("location", e))?
        .to_owned())
}

fn header_value(response: &Response, name: &'static str) -> Result<String> {
    Ok(response
        .headers()
        .get(name)
        .ok_or(Error::MissingHeader(name))?
        .to_str()
        .map_err(|e| Error::InvalidHeader(name, e))?
        .to_owned())
}
