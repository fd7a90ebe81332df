//! Typed errors for the Senzing gRPC SDK.
//!
//! Every façade call hands the `tonic::Status` it got back to this crate:
//! - [`translate`] turns it into a [`GrpcError`]
//! - [`convert`] does the same for an arbitrary boxed error
//! - [`ErrorKind`] classifies recovered engine errors by reason code
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod error;
pub mod kind;
pub mod result_ext;
pub mod translate;

pub use error::{BoxError, GrpcError, SzError, TranslationError, TranslationProblem};
pub use kind::ErrorKind;
pub use result_ext::{ResultExt, has_kind};
pub use translate::{convert, describe, parse_description, translate};
