//! rustls client configuration for resolved credentials.

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls::version::{TLS12, TLS13};
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};

use crate::credentials::CredentialConfig;
use crate::error::CredentialError;

/// Protocol versions offered on TLS channels. Not configurable.
pub static SUPPORTED_TLS_VERSIONS: &[&SupportedProtocolVersion] = &[&TLS12, &TLS13];

/// Crypto provider for TLS channels.
///
/// Uses the process default when one is installed, otherwise an aws-lc-rs
/// provider that is not installed globally.
#[must_use]
pub fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

pub(crate) fn client_config(
    credentials: &CredentialConfig,
) -> Result<Option<ClientConfig>, CredentialError> {
    let (trust, identity) = match credentials {
        CredentialConfig::Insecure => return Ok(None),
        CredentialConfig::ServerTls(trust) => (trust, None),
        CredentialConfig::MutualTls(trust, identity) => (trust, Some(identity)),
    };

    let mut roots = RootCertStore::empty();
    for cert in trust.certificates() {
        roots.add(cert.clone())?;
    }

    let provider = crypto_provider();
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(SUPPORTED_TLS_VERSIONS)?
        .with_root_certificates(roots);

    let config = match identity {
        None => builder.with_no_client_auth(),
        Some(identity) => {
            let key = identity.private_key()?;
            let signing_key = provider.key_provider.load_private_key(key.clone_key())?;
            CertifiedKey::new(identity.certificate_chain().to_vec(), signing_key).keys_match()?;
            builder.with_client_auth_cert(identity.certificate_chain().to_vec(), key)?
        }
    };

    Ok(Some(config))
}
