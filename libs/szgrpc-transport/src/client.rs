//! gRPC channel configuration and connection helpers.
//!
//! Channels are built from a [`GrpcClientConfig`] and a resolved
//! [`CredentialConfig`]:
//! - Configurable connect and RPC timeouts
//! - HTTP/2 keepalive settings for connection health
//! - TLS or mutual TLS when the credentials ask for it, negotiated by rustls
//!   with the versions in [`crate::tls::SUPPORTED_TLS_VERSIONS`]
//! - Tracing spans around connection establishment
//!
//! The returned client owns its channel. Clone it into whatever needs it;
//! nothing here keeps a process-wide connection.
//!
//! For RPC-level retries see [`crate::rpc_retry`].

use std::time::Duration;

use hyper_rustls::{FixedServerNameResolver, HttpsConnector};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls_pki_types::ServerName;
use tonic::transport::{Channel, Endpoint};
use tracing::Instrument;

use crate::credentials::CredentialConfig;
use crate::error::EndpointError;

const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

/// TLS connector used for `ServerTls` and `MutualTls` channels.
pub type TlsConnector = HttpsConnector<HttpConnector>;

fn duration_to_i64_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn duration_to_u64_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Configuration for a gRPC client channel.
///
/// Retry fields are carried here so one value configures both the channel
/// and [`crate::rpc_retry::call_with_retry`].
#[derive(Debug, Clone)]
pub struct GrpcClientConfig {
    /// Timeout for establishing the initial connection.
    pub connect_timeout: Duration,

    /// Timeout for individual RPC calls.
    pub rpc_timeout: Duration,

    /// Maximum number of retry attempts.
    pub max_retries: u32,

    /// Base duration for backoff between retries.
    pub base_backoff: Duration,

    /// Upper bound for backoff between retries.
    pub max_backoff: Duration,

    /// Service name for tracing.
    pub service_name: &'static str,

    /// Log a summary line once connected.
    pub enable_tracing: bool,

    /// Server name to verify instead of the URI host.
    pub tls_domain: Option<String>,
}

impl Default for GrpcClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            rpc_timeout: Duration::from_secs(30),
            max_retries: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            service_name: "senzing_grpc",
            enable_tracing: true,
            tls_domain: None,
        }
    }
}

impl GrpcClientConfig {
    /// Create a new configuration with the given service name.
    #[must_use]
    pub fn new(service_name: &'static str) -> Self {
        Self {
            service_name,
            ..Default::default()
        }
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the RPC timeout.
    #[must_use]
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    ///
    /// This value is used by [`connect_with_retry`] and
    /// [`crate::rpc_retry::RpcRetryConfig`].
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Verify the server certificate against `domain`.
    #[must_use]
    pub fn with_tls_domain(mut self, domain: impl Into<String>) -> Self {
        self.tls_domain = Some(domain.into());
        self
    }

    /// Disable tracing.
    #[must_use]
    pub fn without_tracing(mut self) -> Self {
        self.enable_tracing = false;
        self
    }
}

/// Build a tonic `Endpoint` for the given credentials.
///
/// Configures:
/// - Connect timeout
/// - Per-RPC timeout
/// - TCP keepalive (30 seconds)
/// - HTTP/2 keepalive interval (30 seconds)
/// - Keepalive timeout (10 seconds)
/// - Keep alive while idle
///
/// TLS is not part of the endpoint. It is applied by the connector from
/// [`build_connector`].
///
/// # Errors
/// Returns [`EndpointError::SchemeMismatch`] for an `https` URI with
/// insecure credentials or an `http` URI with TLS credentials, and
/// [`EndpointError::Transport`] for an unparsable URI.
pub fn build_endpoint(
    uri: String,
    cfg: &GrpcClientConfig,
    credentials: &CredentialConfig,
) -> Result<Endpoint, EndpointError> {
    let endpoint = Endpoint::from_shared(uri)?
        .connect_timeout(cfg.connect_timeout)
        .timeout(cfg.rpc_timeout)
        .tcp_keepalive(Some(TCP_KEEPALIVE))
        .http2_keep_alive_interval(Duration::from_secs(30))
        .keep_alive_timeout(Duration::from_secs(10))
        .keep_alive_while_idle(true);

    let scheme = endpoint.uri().scheme_str().unwrap_or_default().to_owned();
    let mismatch = match credentials {
        CredentialConfig::Insecure => scheme == "https",
        _ => scheme == "http",
    };
    if mismatch {
        return Err(EndpointError::SchemeMismatch {
            scheme,
            mode: credentials.name(),
        });
    }

    Ok(endpoint)
}

/// Build the TLS connector for the given credentials.
///
/// The connector wraps the rustls config from
/// [`CredentialConfig::rustls_client_config`], so the channel negotiates
/// only the protocol versions that config allows. HTTP/2 is advertised
/// through ALPN. `tls_domain`, when set, replaces the URI host as the name
/// the server certificate is verified against.
///
/// Returns `None` for [`CredentialConfig::Insecure`].
///
/// # Errors
/// Returns [`EndpointError::Credentials`] if the rustls config cannot be
/// built and [`EndpointError::InvalidTlsDomain`] if `tls_domain` is not a
/// valid server name.
pub fn build_connector(
    cfg: &GrpcClientConfig,
    credentials: &CredentialConfig,
) -> Result<Option<TlsConnector>, EndpointError> {
    let Some(tls) = credentials.rustls_client_config()? else {
        return Ok(None);
    };

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    http.set_keepalive(Some(TCP_KEEPALIVE));
    http.set_connect_timeout(Some(cfg.connect_timeout));

    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_only();

    let connector = match &cfg.tls_domain {
        Some(domain) => {
            let name = ServerName::try_from(domain.clone()).map_err(|e| {
                EndpointError::InvalidTlsDomain {
                    domain: domain.clone(),
                    reason: e.to_string(),
                }
            })?;
            builder
                .with_server_name_resolver(FixedServerNameResolver::new(name))
                .enable_http2()
                .wrap_connector(http)
        }
        None => builder.enable_http2().wrap_connector(http),
    };

    Ok(Some(connector))
}

/// Connect to a Senzing gRPC server.
///
/// This does not retry. Use [`connect_with_retry`] to retry the connection
/// and [`crate::rpc_retry::call_with_retry`] to retry individual calls.
///
/// # Example
///
/// ```ignore
/// use szgrpc_transport::client::{connect_with_stack, GrpcClientConfig};
/// use szgrpc_transport::credentials::{resolve, CredentialSettings};
///
/// let credentials = resolve(&CredentialSettings::from_env()?)?;
/// let config = GrpcClientConfig::new("szengine");
/// let client: SzEngineClient<Channel> =
///     connect_with_stack("https://localhost:8261", &config, &credentials).await?;
/// ```
///
/// # Errors
/// Returns an error if the endpoint is invalid or the connection fails.
pub async fn connect_with_stack<TClient>(
    uri: impl Into<String>,
    cfg: &GrpcClientConfig,
    credentials: &CredentialConfig,
) -> anyhow::Result<TClient>
where
    TClient: From<Channel>,
{
    let uri_string = uri.into();
    let span = tracing::debug_span!(
        "grpc_connect",
        service = cfg.service_name,
        uri = %uri_string,
        credentials = credentials.name()
    );

    async move {
        let endpoint = build_endpoint(uri_string, cfg, credentials)?;
        let channel = match build_connector(cfg, credentials)? {
            Some(connector) => endpoint.connect_with_connector(connector).await?,
            None => endpoint.connect().await?,
        };

        if cfg.enable_tracing {
            let connect_timeout_ms = duration_to_i64_ms(cfg.connect_timeout);
            let rpc_timeout_ms = duration_to_i64_ms(cfg.rpc_timeout);
            tracing::info!(
                service_name = cfg.service_name,
                credentials = credentials.name(),
                connect_timeout_ms,
                rpc_timeout_ms,
                "gRPC client connected"
            );
        }

        Ok(TClient::from(channel))
    }
    .instrument(span)
    .await
}

/// Connect with up to `max_retries` further attempts.
///
/// The backoff is `base_backoff * attempt`, capped at `max_backoff`.
/// Endpoint errors such as a scheme mismatch are returned without retrying.
///
/// # Errors
/// Returns the last connection error once all attempts are used.
pub async fn connect_with_retry<TClient>(
    uri: impl Into<String>,
    cfg: &GrpcClientConfig,
    credentials: &CredentialConfig,
) -> anyhow::Result<TClient>
where
    TClient: From<Channel>,
{
    use anyhow::Context;

    let uri_string = uri.into();
    build_endpoint(uri_string.clone(), cfg, credentials)?;
    build_connector(cfg, credentials)?;

    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match connect_with_stack::<TClient>(&uri_string, cfg, credentials).await {
            Ok(client) => {
                if attempt > 1 {
                    tracing::info!(
                        service = cfg.service_name,
                        attempt,
                        "gRPC connection established after retries"
                    );
                }
                return Ok(client);
            }
            Err(e) if attempt <= cfg.max_retries => {
                let backoff = (cfg.base_backoff * attempt).min(cfg.max_backoff);
                tracing::warn!(
                    service = cfg.service_name,
                    attempt,
                    max_retries = cfg.max_retries,
                    error = %e,
                    backoff_ms = duration_to_u64_ms(backoff),
                    "gRPC connection failed, retrying..."
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                tracing::error!(
                    service = cfg.service_name,
                    attempt,
                    error = %e,
                    "gRPC connection failed after all retries"
                );
                return Err(e).context(format!(
                    "Failed to connect to {} after {} attempts",
                    cfg.service_name, attempt
                ));
            }
        }
    }
}

/// Connect with the default configuration and the given service name.
///
/// # Errors
/// Returns an error if the endpoint is invalid or the connection fails.
pub async fn connect<TClient>(
    uri: impl Into<String>,
    service_name: &'static str,
    credentials: &CredentialConfig,
) -> anyhow::Result<TClient>
where
    TClient: From<Channel>,
{
    let cfg = GrpcClientConfig::new(service_name);
    connect_with_stack(uri, &cfg, credentials).await
}
