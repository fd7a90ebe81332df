use thiserror::Error;
use tonic::Status;

use crate::kind::ErrorKind;

/// Boxed error as returned by the dynamic [`crate::convert`] entry point.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A Senzing engine error recovered from a transport status.
///
/// `Display` renders the full payload the server sent, so logs keep the
/// whole upstream context. The original [`Status`] is the error source.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SzError {
    code: u16,
    kind: ErrorKind,
    message: String,
    #[source]
    source: Status,
}

impl SzError {
    pub(crate) fn new(code: u16, message: String, source: Status) -> Self {
        Self {
            code,
            kind: ErrorKind::from_code(code),
            message,
            source,
        }
    }

    /// The 4-digit reason code, `0..=9999`.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The full payload text as received from the server.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The transport status this error was translated from.
    #[must_use]
    pub fn status(&self) -> &Status {
        &self.source
    }

    /// Whether this error is of `category` or falls under it.
    #[must_use]
    pub fn is(&self, category: ErrorKind) -> bool {
        self.kind.is(category)
    }
}

/// What went wrong while translating a JSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TranslationProblem {
    /// No `reason` string was found in the payload.
    MissingReason,
    /// The reason is too short to hold a prefix and a code.
    ReasonTooShort,
    /// Characters 4..8 of the reason are not four ASCII digits.
    NonNumericCode,
    /// Nested `error`/`function` documents exceed the descent bound.
    NestingTooDeep,
}

impl std::fmt::Display for TranslationProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingReason => f.write_str("payload has no reason field"),
            Self::ReasonTooShort => f.write_str("reason is shorter than 10 characters"),
            Self::NonNumericCode => f.write_str("reason code segment is not numeric"),
            Self::NestingTooDeep => f.write_str("error nesting is too deep"),
        }
    }
}

/// A transport error carried a JSON payload that could not be turned into
/// an [`SzError`].
///
/// This signals a contract violation between the SDK and the server and is
/// not retryable.
#[derive(Debug, Error)]
#[error("could not translate transport error: {problem}: {offending:?}")]
pub struct TranslationError {
    problem: TranslationProblem,
    offending: String,
    #[source]
    source: Status,
}

impl TranslationError {
    pub(crate) fn new(problem: TranslationProblem, offending: impl Into<String>, source: Status) -> Self {
        Self {
            problem,
            offending: offending.into(),
            source,
        }
    }

    #[must_use]
    pub fn problem(&self) -> TranslationProblem {
        self.problem
    }

    /// The reason or payload string that failed to parse.
    #[must_use]
    pub fn offending(&self) -> &str {
        &self.offending
    }

    #[must_use]
    pub fn status(&self) -> &Status {
        &self.source
    }
}

/// Outcome of translating a transport status.
///
/// `Transport` is the pass-through case: it formats and chains exactly
/// like the original [`Status`].
#[derive(Debug, Error)]
pub enum GrpcError {
    #[error(transparent)]
    Domain(#[from] SzError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Transport(#[from] Status),
}

impl GrpcError {
    #[must_use]
    pub fn as_sz_error(&self) -> Option<&SzError> {
        match self {
            Self::Domain(err) => Some(err),
            Self::Translation(_) | Self::Transport(_) => None,
        }
    }

    /// Whether this is a domain error of `category` or falls under it.
    #[must_use]
    pub fn is(&self, category: ErrorKind) -> bool {
        self.as_sz_error().is_some_and(|err| err.is(category))
    }

    /// The transport status underlying every variant.
    #[must_use]
    pub fn status(&self) -> &Status {
        match self {
            Self::Domain(err) => err.status(),
            Self::Translation(err) => err.status(),
            Self::Transport(status) => status,
        }
    }

    /// Box the inner error, keeping the pass-through status as its own type.
    #[must_use]
    pub fn into_box_error(self) -> BoxError {
        match self {
            Self::Domain(err) => Box::new(err),
            Self::Translation(err) => Box::new(err),
            Self::Transport(status) => Box::new(status),
        }
    }
}
