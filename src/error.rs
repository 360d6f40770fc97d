//! The error taxonomy shared by the format queries and the limit search.

use thiserror::Error;

/// Errors reported by the analysis routines.
///
/// All errors are raised synchronously at the call that detects them, and
/// nothing is retried internally; the computations are deterministic and
/// retrying cannot change the outcome.
#[derive(Error, Debug)]
pub enum Error {
    /// The input is not finite, or a function is undefined at the point
    /// where it was evaluated.
    #[error("domain error: {0}")]
    Domain(String),

    /// The exponential search reached its exponent cap without finding any
    /// input at which the approximation rounds to the reference value. This
    /// usually signals a bug in the approximation rather than a transient
    /// condition.
    #[error("no agreement region found down to 2^-{max_exponent}")]
    NoLimitFound { max_exponent: i64 },

    /// The requested precision or format is invalid.
    #[error("invalid precision configuration: {0}")]
    PrecisionConfig(String),
}
