use std::error::Error;

use tonic::Status;

use crate::error::{GrpcError, SzError};
use crate::kind::ErrorKind;
use crate::translate::translate;

/// Translate the error side of a stub call result.
///
/// ```ignore
/// let response = client
///     .get_entity_by_entity_id(request)
///     .await
///     .translate_err()?;
/// ```
pub trait ResultExt<T> {
    /// # Errors
    /// Returns the translated [`GrpcError`] when `self` is `Err`.
    fn translate_err(self) -> Result<T, GrpcError>;
}

impl<T> ResultExt<T> for Result<T, Status> {
    fn translate_err(self) -> Result<T, GrpcError> {
        self.map_err(translate)
    }
}

/// Whether any [`SzError`] in the source chain of `err` falls under
/// `category`. A [`GrpcError`] is looked through as well.
#[must_use]
pub fn has_kind(err: &(dyn Error + 'static), category: ErrorKind) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(sz) = e.downcast_ref::<SzError>() {
            if sz.is(category) {
                return true;
            }
        } else if let Some(grpc) = e.downcast_ref::<GrpcError>() {
            if grpc.is(category) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("add record failed")]
    struct Wrapper(#[source] GrpcError);

    fn not_found_status() -> Status {
        Status::unknown(r#"{"reason":"SENZ0033|Unknown record"}"#)
    }

    #[test]
    fn translate_err_keeps_ok() {
        let res: Result<u8, Status> = Ok(7);
        assert_eq!(res.translate_err().ok(), Some(7));
    }

    #[test]
    fn translate_err_translates_status() {
        let res: Result<u8, Status> = Err(not_found_status());
        let err = res.translate_err().expect_err("should fail");
        assert!(err.is(ErrorKind::NotFound));
    }

    #[test]
    fn has_kind_walks_wrapping_errors() {
        let wrapped = Wrapper(translate(not_found_status()));
        assert!(has_kind(&wrapped, ErrorKind::BadInput));
        assert!(has_kind(&wrapped, ErrorKind::NotFound));
        assert!(!has_kind(&wrapped, ErrorKind::Retryable));
    }

    #[test]
    fn has_kind_ignores_other_errors() {
        let err = std::io::Error::other("disk");
        assert!(!has_kind(&err, ErrorKind::General));
    }
}
