use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which credential file an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemRole {
    ServerCaCertificate,
    ClientCertificate,
    ClientKey,
}

impl fmt::Display for PemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ServerCaCertificate => "server CA certificate",
            Self::ClientCertificate => "client certificate",
            Self::ClientKey => "client key",
        })
    }
}

/// Errors raised while resolving channel credentials.
///
/// Every variant is fatal to connection setup; there is no fallback to a
/// weaker credential.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    #[error("failed to read {role} file '{}': {source}", .path.display())]
    Read {
        role: PemRole,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {role} file '{}': {reason}", .path.display())]
    Parse {
        role: PemRole,
        path: PathBuf,
        reason: String,
    },

    #[error("no certificates found in {role} file '{}'", .path.display())]
    NoCertificates { role: PemRole, path: PathBuf },

    #[error("client key file '{}' is encrypted but no passphrase is set", .path.display())]
    MissingPassphrase { path: PathBuf },

    #[error("failed to decrypt client key file '{}': {reason}", .path.display())]
    Decrypt { path: PathBuf, reason: String },

    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] rustls::Error),

    #[error("environment variable {variable} is not valid unicode")]
    NotUnicode { variable: &'static str },

    #[error("invalid credential settings: {0}")]
    Settings(#[from] Box<figment::Error>),
}

/// Errors raised while building a channel endpoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EndpointError {
    #[error("invalid gRPC endpoint: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("URI scheme '{scheme}' cannot be used with {mode} credentials")]
    SchemeMismatch { scheme: String, mode: &'static str },

    #[error("invalid TLS domain '{domain}': {reason}")]
    InvalidTlsDomain { domain: String, reason: String },

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}
