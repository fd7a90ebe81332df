use std::ffi::OsString;
use std::path::{Path, PathBuf};

use figment::Figment;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::CredentialError;

pub const SERVER_CA_CERTIFICATE_FILE_ENV: &str = "SENZING_TOOLS_SERVER_CA_CERTIFICATE_FILE";
pub const CLIENT_CERTIFICATE_FILE_ENV: &str = "SENZING_TOOLS_CLIENT_CERTIFICATE_FILE";
pub const CLIENT_KEY_FILE_ENV: &str = "SENZING_TOOLS_CLIENT_KEY_FILE";
pub const CLIENT_KEY_PASSPHRASE_ENV: &str = "SENZING_TOOLS_CLIENT_KEY_PASSPHRASE";

/// Operator-supplied credential locations.
///
/// Empty values are treated as unset, so an exported-but-blank variable
/// never selects a TLS mode.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub server_ca_certificate_file: Option<PathBuf>,
    pub client_certificate_file: Option<PathBuf>,
    pub client_key_file: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub client_key_passphrase: Option<SecretString>,
}

impl CredentialSettings {
    /// Read settings from the `SENZING_TOOLS_*` process environment.
    ///
    /// # Errors
    /// Returns [`CredentialError::NotUnicode`] if the passphrase variable is
    /// not valid unicode.
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    /// Read settings through an arbitrary environment view.
    ///
    /// Paths are taken as raw OS strings, so a path that is not valid
    /// unicode is still honored.
    ///
    /// # Errors
    /// Returns [`CredentialError::NotUnicode`] if the passphrase is not valid
    /// unicode.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let client_key_passphrase = value(CLIENT_KEY_PASSPHRASE_ENV)
            .map(|raw| {
                raw.into_string().map_err(|_| CredentialError::NotUnicode {
                    variable: CLIENT_KEY_PASSPHRASE_ENV,
                })
            })
            .transpose()?
            .map(SecretString::from);

        Ok(Self {
            server_ca_certificate_file: value(SERVER_CA_CERTIFICATE_FILE_ENV).map(PathBuf::from),
            client_certificate_file: value(CLIENT_CERTIFICATE_FILE_ENV).map(PathBuf::from),
            client_key_file: value(CLIENT_KEY_FILE_ENV).map(PathBuf::from),
            client_key_passphrase,
        })
    }

    /// Extract settings from a figment, e.g. a YAML config section.
    ///
    /// # Errors
    /// Returns [`CredentialError::Settings`] if the figment does not
    /// deserialize into settings.
    pub fn from_figment(figment: &Figment) -> Result<Self, CredentialError> {
        figment
            .extract()
            .map_err(|e| CredentialError::Settings(Box::new(e)))
    }

    #[must_use]
    pub fn server_ca_certificate_file(&self) -> Option<&Path> {
        non_empty(self.server_ca_certificate_file.as_deref())
    }

    #[must_use]
    pub fn client_certificate_file(&self) -> Option<&Path> {
        non_empty(self.client_certificate_file.as_deref())
    }

    #[must_use]
    pub fn client_key_file(&self) -> Option<&Path> {
        non_empty(self.client_key_file.as_deref())
    }

    /// The passphrase for an encrypted client key; empty when unset.
    #[must_use]
    pub fn client_key_passphrase(&self) -> &str {
        self.client_key_passphrase
            .as_ref()
            .map_or("", |secret| secret.expose_secret())
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|s| !s.is_empty())
        .map(SecretString::from))
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}
