//! Channel plumbing for the Senzing gRPC SDK.
//!
//! - [`credentials`] selects insecure, server TLS or mutual TLS from the
//!   `SENZING_TOOLS_*` settings
//! - [`client`] builds and connects channels
//! - [`rpc_retry`] retries unary calls on transient failures
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod client;
pub mod credentials;
pub mod error;
pub mod rpc_retry;
pub mod tls;

pub use client::{
    GrpcClientConfig, TlsConnector, build_connector, build_endpoint, connect, connect_with_retry,
    connect_with_stack,
};
pub use credentials::{
    ClientIdentity, CredentialConfig, CredentialSettings, ServerTrust, resolve,
};
pub use error::{CredentialError, EndpointError, PemRole};
pub use rpc_retry::{RpcRetryConfig, call_with_retry, is_retryable};
pub use tls::SUPPORTED_TLS_VERSIONS;
