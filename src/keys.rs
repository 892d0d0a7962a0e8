//! Private key loading and on-demand generation.
//!
//! Keys passed explicitly on the command line must already exist; the default
//! account and certificate keys are generated and persisted on first use.

use crate::error::{Error, Result};
use openssl::{
    pkey::{PKey, Private},
    rsa::Rsa,
};
use std::{io, path::Path};
use tokio::fs;
use tracing::{debug, info};

const GENERATED_KEY_BITS: u32 = 4096;

/// Load a PEM private key, generating and persisting one at `default` when no
/// explicit path is given and the default does not exist yet
pub async fn load_or_generate(explicit: Option<&Path>, default: &Path) -> Result<PKey<Private>> {
    if let Some(path) = explicit {
        let pem = fs::read(path).await.map_err(|source| Error::KeyLoad {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "loaded private key");
        return Ok(PKey::private_key_from_pem(&pem)?);
    }

    match fs::read(default).await {
        Ok(pem) => {
            debug!(path = %default.display(), "loaded private key");
            Ok(PKey::private_key_from_pem(&pem)?)
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %default.display(), bits = GENERATED_KEY_BITS, "generating RSA key");
            let key = PKey::from_rsa(Rsa::generate(GENERATED_KEY_BITS)?)?;
            fs::write(default, key.private_key_to_pem_pkcs8()?).await?;
            Ok(key)
        }
        Err(error) => Err(Error::Io(error)),
    }
}
