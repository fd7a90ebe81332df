//! RPC-level retry helper for unary Senzing gRPC calls.
//!
//! [`call_with_retry`] translates every failed call with
//! [`szgrpc_errors::translate`] and decides from the result.
//!
//! ## Retry Policy
//!
//! A call is retried when:
//! - the transport code is [`tonic::Code::Unavailable`] or
//!   [`tonic::Code::DeadlineExceeded`], or
//! - the translated engine error is under [`ErrorKind::Retryable`]
//!   (lost database connection, transient database error, retry timeout).
//!
//! Everything else, including payloads that could not be translated, is
//! returned immediately.
//!
//! ## Idempotency Warning
//!
//! **This helper assumes the operation is idempotent.** Engine calls that add
//! or delete records are safe to repeat with the same record ID; calls that
//! generate new IDs are not.
//!
//! ## Example
//!
//! ```ignore
//! use szgrpc_transport::client::{connect_with_stack, GrpcClientConfig};
//! use szgrpc_transport::rpc_retry::{call_with_retry, RpcRetryConfig};
//! use std::sync::Arc;
//!
//! let cfg = GrpcClientConfig::new("szengine");
//! let retry_cfg = Arc::new(RpcRetryConfig::from(&cfg));
//! let mut client: SzEngineClient<Channel> =
//!     connect_with_stack("http://127.0.0.1:8261", &cfg, &credentials).await?;
//!
//! let resp = call_with_retry(
//!     &mut client,
//!     retry_cfg.clone(),
//!     GetEntityByEntityIdRequest { entity_id: 1, flags: 0 },
//!     |c, r| async move { c.get_entity_by_entity_id(r).await.map(|resp| resp.into_inner()) },
//!     "szengine.get_entity_by_entity_id",
//! ).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use szgrpc_errors::{ErrorKind, GrpcError, translate};
use tokio::time::sleep;
use tonic::{Code, Status};
use tracing::Instrument;

fn duration_to_i64_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Configuration for RPC-level retry policy.
#[derive(Debug, Clone)]
#[must_use]
pub struct RpcRetryConfig {
    /// Maximum number of retry attempts (not including the initial call).
    pub max_retries: u32,

    /// Base duration for backoff.
    ///
    /// The actual backoff duration is `base_backoff * attempt_number`,
    /// capped at `max_backoff`.
    pub base_backoff: Duration,

    /// Maximum duration for backoff.
    pub max_backoff: Duration,
}

impl Default for RpcRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl From<&crate::client::GrpcClientConfig> for RpcRetryConfig {
    fn from(cfg: &crate::client::GrpcClientConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_backoff: cfg.base_backoff,
            max_backoff: cfg.max_backoff,
        }
    }
}

impl RpcRetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn with_base_backoff(mut self, duration: Duration) -> Self {
        self.base_backoff = duration;
        self
    }

    pub fn with_max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }
}

/// Whether a translated failure is worth another attempt.
#[must_use]
pub fn is_retryable(err: &GrpcError) -> bool {
    match err {
        GrpcError::Transport(status) => {
            matches!(status.code(), Code::Unavailable | Code::DeadlineExceeded)
        }
        GrpcError::Domain(sz) => sz.is(ErrorKind::Retryable),
        GrpcError::Translation(_) => false,
    }
}

/// Run a unary call, retrying transient failures with backoff.
///
/// # Arguments
///
/// * `client` - The tonic gRPC client instance
/// * `cfg` - Shared retry configuration
/// * `req` - Request payload, cloned for every attempt
/// * `call` - Closure that performs the actual RPC call
/// * `op_name` - Operation name for logging (e.g. `"szengine.add_record"`)
///
/// # Errors
/// Returns the translated [`GrpcError`] of the last attempt when the failure
/// is not retryable or all retries are used.
pub async fn call_with_retry<TClient, F, Fut, Req, Res>(
    client: &mut TClient,
    cfg: Arc<RpcRetryConfig>,
    req: Req,
    call: F,
    op_name: &'static str,
) -> Result<Res, GrpcError>
where
    F: Fn(&mut TClient, Req) -> Fut,
    Fut: std::future::Future<Output = Result<Res, Status>>,
    Req: Clone,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let span = tracing::debug_span!("grpc_call", op = op_name, attempt);

        let result = async {
            let res = call(client, req.clone()).await;
            if let Err(ref status) = res {
                tracing::warn!(
                    code = ?status.code(),
                    attempt,
                    op = op_name,
                    "gRPC call failed",
                );
            }
            res
        }
        .instrument(span)
        .await;

        let err = match result {
            Ok(res) => {
                if attempt > 1 {
                    tracing::info!(op = op_name, attempt, "gRPC call succeeded after retries");
                }
                return Ok(res);
            }
            Err(status) => translate(status),
        };

        if !is_retryable(&err) || attempt > cfg.max_retries {
            tracing::error!(
                op = op_name,
                attempt,
                code = ?err.status().code(),
                engine_code = err.as_sz_error().map(szgrpc_errors::SzError::code),
                "gRPC call giving up"
            );
            return Err(err);
        }

        let backoff = (cfg.base_backoff * attempt).min(cfg.max_backoff);

        tracing::debug!(
            op = op_name,
            attempt,
            backoff_ms = duration_to_i64_ms(backoff),
            "Retrying gRPC call after backoff"
        );

        sleep(backoff).await;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockClient {
        call_count: Arc<AtomicU32>,
    }

    fn mock() -> (MockClient, Arc<AtomicU32>) {
        let call_count = Arc::new(AtomicU32::new(0));
        (
            MockClient {
                call_count: call_count.clone(),
            },
            call_count,
        )
    }

    fn fast(max_retries: u32) -> Arc<RpcRetryConfig> {
        Arc::new(
            RpcRetryConfig::new(max_retries)
                .with_base_backoff(Duration::from_millis(1))
                .with_max_backoff(Duration::from_millis(10)),
        )
    }

    fn engine_status(reason: &str) -> Status {
        Status::unknown(format!(r#"{{"reason": "{reason}"}}"#))
    }

    #[test]
    fn test_default_retry_config() {
        let cfg = RpcRetryConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.base_backoff, Duration::from_millis(100));
        assert_eq!(cfg.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_retry_config_from_grpc_config() {
        let grpc_cfg = crate::client::GrpcClientConfig::new("test").with_max_retries(5);
        let retry_cfg = RpcRetryConfig::from(&grpc_cfg);

        assert_eq!(retry_cfg.max_retries, 5);
        assert_eq!(retry_cfg.base_backoff, grpc_cfg.base_backoff);
        assert_eq!(retry_cfg.max_backoff, grpc_cfg.max_backoff);
    }

    #[test]
    fn retryable_classification() {
        assert!(is_retryable(&translate(Status::unavailable("down"))));
        assert!(is_retryable(&translate(Status::deadline_exceeded("slow"))));
        assert!(!is_retryable(&translate(Status::invalid_argument("bad"))));
        assert!(is_retryable(&translate(engine_status(
            "SENZ1008|Database transient error"
        ))));
        assert!(is_retryable(&translate(engine_status(
            "SENZ0010|Retry timeout exceeded"
        ))));
        assert!(!is_retryable(&translate(engine_status(
            "SENZ0033|Unknown record"
        ))));
        assert!(!is_retryable(&translate(engine_status("bad"))));
    }

    #[tokio::test]
    async fn test_call_with_retry_succeeds_first_attempt() {
        let (mut client, _) = mock();

        let result = call_with_retry(
            &mut client,
            Arc::new(RpcRetryConfig::default()),
            "test_request".to_owned(),
            |_c, req| async move { Ok::<_, Status>(format!("response: {req}")) },
            "test.op",
        )
        .await;

        assert_eq!(result.expect("success"), "response: test_request");
    }

    #[tokio::test]
    async fn test_call_with_retry_retries_on_unavailable() {
        let (mut client, call_count) = mock();

        let result = call_with_retry(
            &mut client,
            fast(3),
            (),
            |c, _req| {
                let count = c.call_count.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if count < 3 {
                        Err(Status::unavailable("temporarily unavailable"))
                    } else {
                        Ok("success".to_owned())
                    }
                }
            },
            "test.op",
        )
        .await;

        assert_eq!(result.expect("success"), "success");
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_call_with_retry_retries_lost_database_connection() {
        let (mut client, call_count) = mock();

        let result = call_with_retry(
            &mut client,
            fast(3),
            (),
            |c, _req| {
                let count = c.call_count.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if count < 2 {
                        Err(engine_status("SENZ1006|Database connection lost"))
                    } else {
                        Ok(42_i64)
                    }
                }
            },
            "szengine.get_entity_by_entity_id",
        )
        .await;

        assert_eq!(result.expect("success"), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_call_with_retry_gives_up_on_bad_input() {
        let (mut client, call_count) = mock();

        let result = call_with_retry(
            &mut client,
            fast(3),
            (),
            |c, _req| {
                c.call_count.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err::<String, _>(engine_status(
                        "SENZ0037|Unknown resolved entity value '-1'",
                    ))
                }
            },
            "szengine.get_entity_by_entity_id",
        )
        .await;

        let err = result.expect_err("should fail");
        let sz = err.as_sz_error().expect("domain error");
        assert_eq!(sz.kind(), ErrorKind::NotFound);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_with_retry_non_retryable_transport_error() {
        let (mut client, call_count) = mock();

        let result = call_with_retry(
            &mut client,
            fast(3),
            (),
            |c, _req| {
                c.call_count.fetch_add(1, Ordering::SeqCst);
                async move { Err::<String, _>(Status::invalid_argument("bad request")) }
            },
            "test.op",
        )
        .await;

        let err = result.expect_err("should fail");
        assert!(matches!(err, GrpcError::Transport(_)));
        assert_eq!(err.status().code(), Code::InvalidArgument);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_call_with_retry_gives_up_after_max_retries() {
        let (mut client, call_count) = mock();

        let result = call_with_retry(
            &mut client,
            fast(2),
            (),
            |c, _req| {
                c.call_count.fetch_add(1, Ordering::SeqCst);
                async move { Err::<String, _>(Status::unavailable("always unavailable")) }
            },
            "test.op",
        )
        .await;

        let err = result.expect_err("should fail");
        assert_eq!(err.status().code(), Code::Unavailable);
        // Initial attempt + 2 retries = 3 total calls
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_call_with_retry_respects_max_backoff() {
        use std::time::Instant;

        let (mut client, _) = mock();

        let cfg = Arc::new(
            RpcRetryConfig::new(2)
                .with_base_backoff(Duration::from_millis(100))
                .with_max_backoff(Duration::from_millis(50)),
        );

        let start = Instant::now();
        let _ = call_with_retry(
            &mut client,
            cfg,
            (),
            |c, _req| {
                c.call_count.fetch_add(1, Ordering::SeqCst);
                async move { Err::<String, _>(Status::unavailable("unavailable")) }
            },
            "test.op",
        )
        .await;
        let elapsed = start.elapsed();

        // 50ms + 50ms when capped, 100ms + 200ms otherwise
        assert!(
            elapsed < Duration::from_millis(200),
            "Backoff should be capped; elapsed: {elapsed:?}"
        );
    }
}
