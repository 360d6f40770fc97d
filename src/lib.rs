//! Analysis of floating-point approximation error against
//! arbitrary-precision reference values.
//!
//! The crate answers three questions about a binary floating-point format:
//! what does an arbitrary-precision real round to, how many representable
//! steps (ULPs) lie between two values, and below which input magnitude
//! does an approximation round to the same value as the function it
//! approximates.
//!
//! The boundary can be approached from either side: [`find_limit`] walks
//! down from the search start, [`find_limit_reverse`] walks up from the
//! format's smallest positive value.
//!
//! Formats are plain values and precision is always an explicit parameter,
//! so independent searches can run concurrently without any shared
//! rounding state.
//!
//! ```
//! use arpfloat::Float;
//! use fplimit::{find_limit, SINGLE};
//!
//! // Below which x is sin(x) indistinguishable from x in single
//! // precision?
//! let res = find_limit(
//!     |x: &Float| x.sin(),
//!     |x: &Float| x.clone(),
//!     &SINGLE,
//! )
//! .unwrap();
//! let x0 = res.x0.as_f64();
//! assert!(x0 > 4.0e-4 && x0 < 5.0e-4);
//! ```

mod error;
mod format;
mod limits;

pub use self::error::Error;
pub use self::format::{PrecisionFormat, DOUBLE, EXTENDED, SINGLE};
pub use self::limits::{
    bisect_limit, find_limit, find_limit_fast, find_limit_reverse,
    find_limit_reverse_fast, find_limit_reverse_with, find_limit_with,
    LimitOptions, LimitResult,
};
