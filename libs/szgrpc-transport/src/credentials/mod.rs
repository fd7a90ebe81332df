//! Channel credential selection.
//!
//! The operator selects a mode through the `SENZING_TOOLS_*` settings:
//!
//! | Server CA | Client cert and key | Mode         |
//! |-----------|---------------------|--------------|
//! | unset     | any                 | `Insecure`   |
//! | set       | either unset        | `ServerTls`  |
//! | set       | both set            | `MutualTls`  |
//!
//! Any failure while loading a TLS mode is returned as an error. There is no
//! fallback to a weaker mode.

mod pem;
mod settings;

use std::fmt;

use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use zeroize::Zeroizing;

use crate::error::{CredentialError, PemRole};

pub use settings::{
    CLIENT_CERTIFICATE_FILE_ENV, CLIENT_KEY_FILE_ENV, CLIENT_KEY_PASSPHRASE_ENV,
    CredentialSettings, SERVER_CA_CERTIFICATE_FILE_ENV,
};

/// Trust anchors used to verify the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTrust {
    certificates: Vec<CertificateDer<'static>>,
}

impl ServerTrust {
    /// Parse a PEM bundle of CA certificates.
    ///
    /// # Errors
    /// Returns [`CredentialError::Parse`] or [`CredentialError::NoCertificates`].
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Result<Self, CredentialError> {
        let certificates = pem::parse_certificates(
            PemRole::ServerCaCertificate,
            std::path::Path::new("<memory>"),
            &pem.into(),
        )?;
        Ok(Self { certificates })
    }

    fn load(path: &std::path::Path) -> Result<Self, CredentialError> {
        let pem = pem::read_file(PemRole::ServerCaCertificate, path)?;
        let certificates = pem::parse_certificates(PemRole::ServerCaCertificate, path, &pem)?;
        Ok(Self { certificates })
    }

    #[must_use]
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }
}

/// Client certificate chain and its (decrypted) private key.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    certificate_chain: Vec<CertificateDer<'static>>,
    key_pem: Zeroizing<Vec<u8>>,
}

impl ClientIdentity {
    fn load(
        cert_path: &std::path::Path,
        key_path: &std::path::Path,
        passphrase: &str,
    ) -> Result<Self, CredentialError> {
        let certificate_pem = pem::read_file(PemRole::ClientCertificate, cert_path)?;
        let certificate_chain =
            pem::parse_certificates(PemRole::ClientCertificate, cert_path, &certificate_pem)?;

        let raw_key = Zeroizing::new(pem::read_file(PemRole::ClientKey, key_path)?);
        let key_pem = pem::load_private_key(key_path, &raw_key, passphrase)?;

        Ok(Self {
            certificate_chain,
            key_pem,
        })
    }

    #[must_use]
    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.certificate_chain
    }

    /// Decode the private key for a TLS handshake.
    ///
    /// # Errors
    /// Returns [`CredentialError::Parse`] if the stored key cannot be decoded.
    pub fn private_key(&self) -> Result<PrivateKeyDer<'static>, CredentialError> {
        pem::parse_private_key(&self.key_pem).map_err(|e| CredentialError::Parse {
            role: PemRole::ClientKey,
            path: std::path::PathBuf::from("<memory>"),
            reason: e.to_string(),
        })
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("certificates", &self.certificate_chain.len())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Credentials for a gRPC channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialConfig {
    /// Plaintext HTTP/2.
    Insecure,
    /// TLS with server verification only.
    ServerTls(ServerTrust),
    /// TLS with server verification and a client certificate.
    MutualTls(ServerTrust, ClientIdentity),
}

impl CredentialConfig {
    /// Mode name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insecure => "insecure",
            Self::ServerTls(_) => "server_tls",
            Self::MutualTls(..) => "mutual_tls",
        }
    }

    #[must_use]
    pub fn is_tls(&self) -> bool {
        !matches!(self, Self::Insecure)
    }

    /// Build a rustls client config restricted to TLS 1.2 and 1.3.
    ///
    /// Returns `None` for [`CredentialConfig::Insecure`].
    ///
    /// # Errors
    /// Returns [`CredentialError::Tls`] if rustls rejects the material, for
    /// example a client key that does not belong to the certificate.
    pub fn rustls_client_config(&self) -> Result<Option<rustls::ClientConfig>, CredentialError> {
        crate::tls::client_config(self)
    }
}

/// Resolve channel credentials from settings.
///
/// # Errors
/// Returns a [`CredentialError`] if a configured file cannot be read or
/// parsed, an encrypted key cannot be decrypted, or rustls rejects the
/// resulting configuration.
pub fn resolve(settings: &CredentialSettings) -> Result<CredentialConfig, CredentialError> {
    let Some(ca_path) = settings.server_ca_certificate_file() else {
        tracing::info!(mode = "insecure", "resolved gRPC channel credentials");
        return Ok(CredentialConfig::Insecure);
    };

    let trust = ServerTrust::load(ca_path)?;

    let config = match (settings.client_certificate_file(), settings.client_key_file()) {
        (Some(cert_path), Some(key_path)) => {
            let identity =
                ClientIdentity::load(cert_path, key_path, settings.client_key_passphrase())?;
            CredentialConfig::MutualTls(trust, identity)
        }
        (cert, key) => {
            if cert.is_some() || key.is_some() {
                tracing::warn!(
                    has_certificate = cert.is_some(),
                    has_key = key.is_some(),
                    "client certificate and key must both be set for mutual TLS, using server TLS"
                );
            }
            CredentialConfig::ServerTls(trust)
        }
    };

    config.rustls_client_config()?;

    tracing::info!(
        mode = config.name(),
        ca_certificates = config_ca_count(&config),
        "resolved gRPC channel credentials"
    );
    Ok(config)
}

fn config_ca_count(config: &CredentialConfig) -> usize {
    match config {
        CredentialConfig::Insecure => 0,
        CredentialConfig::ServerTls(trust) | CredentialConfig::MutualTls(trust, _) => {
            trust.certificates().len()
        }
    }
}
