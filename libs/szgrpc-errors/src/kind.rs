//! Error taxonomy and the reason-code table.
//!
//! Every Senzing reason code maps to exactly one [`ErrorKind`]. Kinds form a
//! shallow hierarchy: a leaf such as [`ErrorKind::NotFound`] is also a
//! [`ErrorKind::BadInput`], so callers can branch on the broad category
//! without enumerating every leaf.

use std::fmt;
use std::ops::RangeInclusive;

/// Classification of a Senzing engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request was malformed or referenced invalid data.
    BadInput,
    /// The referenced record or entity does not exist.
    NotFound,
    /// The referenced data source is not registered.
    UnknownDataSource,
    /// The engine configuration is invalid or missing.
    Configuration,
    /// A configuration replace raced with another writer.
    ReplaceConflict,
    /// The operation may succeed if attempted again.
    Retryable,
    DatabaseConnectionLost,
    DatabaseTransient,
    RetryTimeoutExceeded,
    /// The engine cannot continue without operator intervention.
    Unrecoverable,
    Database,
    License,
    NotInitialized,
    Unhandled,
    /// Unspecified engine error; the code is outside every known range.
    General,
}

/// Ordered code table. The first matching range wins.
const CODE_TABLE: &[(RangeInclusive<u16>, ErrorKind)] = &[
    (10..=10, ErrorKind::RetryTimeoutExceeded),
    (33..=33, ErrorKind::NotFound),
    (37..=37, ErrorKind::NotFound),
    (48..=48, ErrorKind::NotInitialized),
    (87..=88, ErrorKind::ReplaceConflict),
    (999..=999, ErrorKind::Unhandled),
    (1006..=1007, ErrorKind::DatabaseConnectionLost),
    (1008..=1008, ErrorKind::DatabaseTransient),
    (1000..=1099, ErrorKind::Database),
    (2207..=2207, ErrorKind::UnknownDataSource),
    (2209..=2209, ErrorKind::UnknownDataSource),
    (2000..=2999, ErrorKind::Configuration),
    (9000..=9099, ErrorKind::License),
    (1..=998, ErrorKind::BadInput),
];

impl ErrorKind {
    /// Look up the kind for a reason code.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        CODE_TABLE
            .iter()
            .find(|(range, _)| range.contains(&code))
            .map_or(Self::General, |(_, kind)| *kind)
    }

    /// Broader category this kind belongs to, if any.
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::NotFound | Self::UnknownDataSource => Some(Self::BadInput),
            Self::DatabaseConnectionLost | Self::DatabaseTransient | Self::RetryTimeoutExceeded => {
                Some(Self::Retryable)
            }
            Self::Database | Self::License | Self::NotInitialized | Self::Unhandled => {
                Some(Self::Unrecoverable)
            }
            Self::BadInput
            | Self::Configuration
            | Self::ReplaceConflict
            | Self::Retryable
            | Self::Unrecoverable
            | Self::General => None,
        }
    }

    /// Whether this kind is `category` or falls under it.
    #[must_use]
    pub fn is(self, category: Self) -> bool {
        self == category || self.parent() == Some(category)
    }

    /// Stable snake-case name, used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BadInput => "bad_input",
            Self::NotFound => "not_found",
            Self::UnknownDataSource => "unknown_data_source",
            Self::Configuration => "configuration",
            Self::ReplaceConflict => "replace_conflict",
            Self::Retryable => "retryable",
            Self::DatabaseConnectionLost => "database_connection_lost",
            Self::DatabaseTransient => "database_transient",
            Self::RetryTimeoutExceeded => "retry_timeout_exceeded",
            Self::Unrecoverable => "unrecoverable",
            Self::Database => "database",
            Self::License => "license",
            Self::NotInitialized => "not_initialized",
            Self::Unhandled => "unhandled",
            Self::General => "general",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        assert_eq!(ErrorKind::from_code(33), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_code(37), ErrorKind::NotFound);
    }

    #[test]
    fn explicit_codes_win_over_ranges() {
        assert_eq!(ErrorKind::from_code(1006), ErrorKind::DatabaseConnectionLost);
        assert_eq!(ErrorKind::from_code(1008), ErrorKind::DatabaseTransient);
        assert_eq!(ErrorKind::from_code(1001), ErrorKind::Database);
        assert_eq!(ErrorKind::from_code(2207), ErrorKind::UnknownDataSource);
        assert_eq!(ErrorKind::from_code(2001), ErrorKind::Configuration);
        assert_eq!(ErrorKind::from_code(999), ErrorKind::Unhandled);
    }

    #[test]
    fn unlisted_codes_are_general() {
        assert_eq!(ErrorKind::from_code(0), ErrorKind::General);
        assert_eq!(ErrorKind::from_code(5000), ErrorKind::General);
        assert_eq!(ErrorKind::from_code(9999), ErrorKind::General);
    }

    #[test]
    fn lookup_is_stable() {
        for code in 0..=9999 {
            assert_eq!(ErrorKind::from_code(code), ErrorKind::from_code(code));
        }
    }

    #[test]
    fn category_checks() {
        assert!(ErrorKind::NotFound.is(ErrorKind::BadInput));
        assert!(ErrorKind::NotFound.is(ErrorKind::NotFound));
        assert!(!ErrorKind::NotFound.is(ErrorKind::Retryable));
        assert!(ErrorKind::RetryTimeoutExceeded.is(ErrorKind::Retryable));
        assert!(ErrorKind::License.is(ErrorKind::Unrecoverable));
        assert!(!ErrorKind::General.is(ErrorKind::BadInput));
    }

    #[test]
    fn display_uses_snake_case() {
        assert_eq!(ErrorKind::UnknownDataSource.to_string(), "unknown_data_source");
    }
}
