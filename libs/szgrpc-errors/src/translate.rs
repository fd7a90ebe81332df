//! Transport status to domain error translation.
//!
//! A Senzing gRPC server reports engine failures as a status whose message
//! is a JSON document holding a `reason` such as
//! `"SENZ0037|Unknown resolved entity value '-1'"`. Layered servers wrap the
//! document of the hop below them under `error` or `function`, either as an
//! object or as a JSON string. The translator walks down to the innermost
//! `reason` and reads the 4-digit code at a fixed offset.

use serde_json::Value;
use tonic::{Code, Status};

use crate::error::{BoxError, GrpcError, SzError, TranslationError, TranslationProblem};

/// Leading text of every transport status description.
pub const TRANSPORT_PREFIX: &str = "rpc error: code = ";

/// Token between the status code name and the payload.
pub const DESC_SEPARATOR: &str = " desc = ";

/// Keys that may hold the document of an upstream hop, in lookup order.
const NESTED_KEYS: &[&str] = &["error", "function"];

const REASON_KEY: &str = "reason";

const MIN_REASON_LEN: usize = 10;

/// Character offsets of the code inside a reason string: right after the
/// 4-letter `SENZ` prefix. Kept fixed for compatibility with the server
/// format even though a longer prefix would misalign it.
const CODE_START: usize = 4;
const CODE_END: usize = 8;

const MAX_NESTING_DEPTH: usize = 16;

/// Canonical gRPC name of a status code, as used in descriptions.
#[must_use]
pub fn code_name(code: Code) -> &'static str {
    match code {
        Code::Ok => "OK",
        Code::Cancelled => "Canceled",
        Code::Unknown => "Unknown",
        Code::InvalidArgument => "InvalidArgument",
        Code::DeadlineExceeded => "DeadlineExceeded",
        Code::NotFound => "NotFound",
        Code::AlreadyExists => "AlreadyExists",
        Code::PermissionDenied => "PermissionDenied",
        Code::ResourceExhausted => "ResourceExhausted",
        Code::FailedPrecondition => "FailedPrecondition",
        Code::Aborted => "Aborted",
        Code::OutOfRange => "OutOfRange",
        Code::Unimplemented => "Unimplemented",
        Code::Internal => "Internal",
        Code::Unavailable => "Unavailable",
        Code::DataLoss => "DataLoss",
        Code::Unauthenticated => "Unauthenticated",
    }
}

/// Render a status as `rpc error: code = <Code> desc = <message>`.
#[must_use]
pub fn describe(status: &Status) -> String {
    format!(
        "{TRANSPORT_PREFIX}{}{DESC_SEPARATOR}{}",
        code_name(status.code()),
        status.message()
    )
}

/// Extract the payload of a transport description.
///
/// Returns everything after the first `" desc = "`, or `None` when the
/// description does not start with [`TRANSPORT_PREFIX`].
#[must_use]
pub fn parse_description(description: &str) -> Option<&str> {
    if !description.starts_with(TRANSPORT_PREFIX) {
        return None;
    }
    description
        .split_once(DESC_SEPARATOR)
        .map(|(_, payload)| payload)
}

enum Outcome {
    PassThrough,
    Recognized {
        code: u16,
        payload: String,
    },
    Failed {
        problem: TranslationProblem,
        offending: String,
    },
}

impl Outcome {
    fn finish(self, status: Status) -> GrpcError {
        match self {
            Self::PassThrough => GrpcError::Transport(status),
            Self::Recognized { code, payload } => {
                let err = SzError::new(code, payload, status);
                tracing::debug!(
                    code = err.code(),
                    kind = %err.kind(),
                    "translated transport status to engine error"
                );
                GrpcError::Domain(err)
            }
            Self::Failed { problem, offending } => {
                tracing::warn!(
                    problem = %problem,
                    offending = %offending,
                    "transport status payload could not be translated"
                );
                GrpcError::Translation(TranslationError::new(problem, offending, status))
            }
        }
    }
}

struct NestingTooDeep;

fn classify(status: &Status) -> Outcome {
    let description = describe(status);
    let Some(payload) = parse_description(&description) else {
        return Outcome::PassThrough;
    };

    // Non-JSON and non-object payloads are freeform server text.
    let Ok(document @ Value::Object(_)) = serde_json::from_str::<Value>(payload) else {
        return Outcome::PassThrough;
    };

    let reason = match find_reason(&document, 0) {
        Ok(Some(reason)) => reason,
        Ok(None) => {
            return Outcome::Failed {
                problem: TranslationProblem::MissingReason,
                offending: payload.to_owned(),
            };
        }
        Err(NestingTooDeep) => {
            return Outcome::Failed {
                problem: TranslationProblem::NestingTooDeep,
                offending: payload.to_owned(),
            };
        }
    };

    match parse_reason_code(&reason) {
        Ok(code) => Outcome::Recognized {
            code,
            payload: payload.to_owned(),
        },
        Err(problem) => Outcome::Failed {
            problem,
            offending: reason,
        },
    }
}

/// Innermost `reason` string of a (possibly nested) error document.
fn find_reason(value: &Value, depth: usize) -> Result<Option<String>, NestingTooDeep> {
    if depth > MAX_NESTING_DEPTH {
        return Err(NestingTooDeep);
    }
    let Some(object) = value.as_object() else {
        return Ok(None);
    };

    for key in NESTED_KEYS {
        let found = match object.get(*key) {
            Some(child @ Value::Object(_)) => find_reason(child, depth + 1)?,
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(nested) => find_reason(&nested, depth + 1)?,
                Err(_) => None,
            },
            _ => None,
        };
        if found.is_some() {
            return Ok(found);
        }
    }

    Ok(object
        .get(REASON_KEY)
        .and_then(Value::as_str)
        .map(str::to_owned))
}

/// Parse the code at [`CODE_START`]..[`CODE_END`] of a reason string.
/// Lengths and offsets count characters, not bytes.
fn parse_reason_code(reason: &str) -> Result<u16, TranslationProblem> {
    if reason.chars().count() < MIN_REASON_LEN {
        return Err(TranslationProblem::ReasonTooShort);
    }
    reason
        .chars()
        .skip(CODE_START)
        .take(CODE_END - CODE_START)
        .try_fold(0u16, |code, c| {
            c.to_digit(10)
                .and_then(|digit| u16::try_from(digit).ok())
                .map(|digit| code * 10 + digit)
        })
        .ok_or(TranslationProblem::NonNumericCode)
}

/// Translate a transport status into a typed error.
#[must_use]
pub fn translate(status: Status) -> GrpcError {
    classify(&status).finish(status)
}

/// Translate an arbitrary boxed error.
///
/// `None` stays `None`. Errors that are not a [`Status`], and statuses whose
/// payload is not a JSON error document, come back as the very same box.
#[must_use]
pub fn convert(err: Option<BoxError>) -> Option<BoxError> {
    let err = err?;
    let outcome = match err.downcast_ref::<Status>() {
        Some(status) => classify(status),
        None => return Some(err),
    };
    if matches!(outcome, Outcome::PassThrough) {
        return Some(err);
    }
    match err.downcast::<Status>() {
        Ok(status) => Some(outcome.finish(*status).into_box_error()),
        Err(err) => Some(err),
    }
}
