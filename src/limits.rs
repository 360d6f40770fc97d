//! The limit search: given a reference function and an approximation, find
//! the largest input magnitude below which the approximation rounds to the
//! reference value at a target precision.
//!
//! The search runs in two phases. An exponential phase walks the powers of
//! two 2^-n downward until the rounded values of the two functions agree,
//! which brackets the boundary between one power of two and the next. A
//! bisection phase then refines the bracket until its endpoints round to
//! adjacent representable values of the target format.
//!
//! [`find_limit_reverse`] approaches the same boundary from the other side:
//! its exponential phase starts at the format's smallest positive value and
//! doubles until agreement first fails. With a monotone error both
//! directions land on the same bracket; when the error oscillates they can
//! differ, which is itself useful evidence.

use arpfloat::{Float, RoundingMode};
use log::{debug, trace};

use crate::error::Error;
use crate::format::PrecisionFormat;

/// Tuning knobs for the limit search.
#[derive(Debug, Clone)]
pub struct LimitOptions {
    /// Agreement tolerance, in representable steps of the target format.
    /// Zero demands that the two functions round to the identical value.
    pub tolerance_ulps: u64,
    /// The first exponent tried by the forward exponential phase, and the
    /// last one tried by the reverse ascent (x = 2^-n).
    pub start_exponent: i64,
    /// Largest exponent tried by the exponential phase: the forward
    /// descent stops there, the reverse ascent starts there. `None`
    /// selects the magnitude of the format's smallest subnormal exponent,
    /// below which every input rounds to zero anyway.
    pub max_exponent: Option<i64>,
    /// Hard cap on bisection refinement steps.
    pub max_bisection_steps: usize,
}

impl Default for LimitOptions {
    fn default() -> Self {
        LimitOptions {
            tolerance_ulps: 0,
            start_exponent: 1,
            max_exponent: None,
            max_bisection_steps: 1024,
        }
    }
}

/// The outcome of a limit search.
#[derive(Debug, Clone)]
pub struct LimitResult {
    /// The discovered supremum of the agreement region: the functions round
    /// to the same value at `x0`, and no longer do at its successor in the
    /// target format (within the resolution of the bisection).
    pub x0: Float,
    /// The exponent n of the last power of two 2^-n accepted by the
    /// exponential phase.
    pub exponent_min: i64,
    /// Number of bisection refinement iterations performed.
    pub bisection_steps: usize,
}

/// Finds the supremum x0 such that `f` and `g` round to the same value of
/// `format` for all 0 < x <= x0, using the default [`LimitOptions`].
///
/// The error of the approximation is assumed to be monotonically
/// non-decreasing in |x| near zero; the search never evaluates the
/// functions at x == 0.
pub fn find_limit<F, G>(
    f: F,
    g: G,
    format: &PrecisionFormat,
) -> Result<LimitResult, Error>
where
    F: Fn(&Float) -> Float,
    G: Fn(&Float) -> Float,
{
    find_limit_with(f, g, format, &LimitOptions::default())
}

/// [`find_limit`] with explicit options.
pub fn find_limit_with<F, G>(
    f: F,
    g: G,
    format: &PrecisionFormat,
    options: &LimitOptions,
) -> Result<LimitResult, Error>
where
    F: Fn(&Float) -> Float,
    G: Fn(&Float) -> Float,
{
    let (exponent_min, x_l) = find_limit_fast(&f, &g, format, options)?;
    let hi = x_l.scale(1, RoundingMode::NearestTiesToEven);
    // When the very first exponent agreed, the upper bracket end was never
    // tested; check it once so a start inside the agreement region shows
    // up in the log instead of silently clamping the result to 2^-(n-1).
    if exponent_min == options.start_exponent
        && agree(&f, &g, &hi, format, options.tolerance_ulps)?
    {
        debug!(
            "agreement already holds at 2^-{}; the boundary lies above \
             the search start",
            exponent_min - 1
        );
    }
    let (bisection_steps, x0) =
        bisect_limit(&f, &g, format, &x_l, &hi, options)?;
    debug!(
        "limit at {} after {} bisection steps (bracket exponent {})",
        x0, bisection_steps, exponent_min
    );
    Ok(LimitResult {
        x0,
        exponent_min,
        bisection_steps,
    })
}

/// Phase one: exponential bracket search.
///
/// Tests x = 2^-n for n = start, start + 1, ... until the agreement
/// predicate holds, and returns `(n, 2^-n)`. Larger n means smaller x and a
/// smaller approximation error, so the first accepted exponent brackets the
/// boundary: `x_l <= x0 <= 2 * x_l`. Exhausting the exponent cap without
/// agreement is a [`Error::NoLimitFound`] failure.
pub fn find_limit_fast<F, G>(
    f: F,
    g: G,
    format: &PrecisionFormat,
    options: &LimitOptions,
) -> Result<(i64, Float), Error>
where
    F: Fn(&Float) -> Float,
    G: Fn(&Float) -> Float,
{
    let wide = format.compute_semantics();
    let max_exponent = options
        .max_exponent
        .unwrap_or_else(|| -format.min_subnormal_exponent());

    let mut n = options.start_exponent;
    while n <= max_exponent {
        let x = Float::one(wide, false)
            .scale(-n, RoundingMode::NearestTiesToEven);
        if agree(&f, &g, &x, format, options.tolerance_ulps)? {
            debug!("agreement at 2^-{}", n);
            return Ok((n, x));
        }
        trace!("disagreement at 2^-{}", n);
        n += 1;
    }
    Err(Error::NoLimitFound { max_exponent })
}

/// Finds the agreement boundary by approaching it from below: the
/// exponential phase starts at the format's smallest positive value and
/// doubles x until agreement first fails, then bisection refines the
/// bracket. Uses the default [`LimitOptions`].
///
/// With a monotone approximation error this returns the same supremum as
/// [`find_limit`]; disagreement between the two directions indicates an
/// error that oscillates somewhere inside the range.
pub fn find_limit_reverse<F, G>(
    f: F,
    g: G,
    format: &PrecisionFormat,
) -> Result<LimitResult, Error>
where
    F: Fn(&Float) -> Float,
    G: Fn(&Float) -> Float,
{
    find_limit_reverse_with(f, g, format, &LimitOptions::default())
}

/// [`find_limit_reverse`] with explicit options.
pub fn find_limit_reverse_with<F, G>(
    f: F,
    g: G,
    format: &PrecisionFormat,
    options: &LimitOptions,
) -> Result<LimitResult, Error>
where
    F: Fn(&Float) -> Float,
    G: Fn(&Float) -> Float,
{
    let (exponent_min, x_l) = find_limit_reverse_fast(&f, &g, format, options)?;
    let hi = x_l.scale(1, RoundingMode::NearestTiesToEven);
    let (bisection_steps, x0) =
        bisect_limit(&f, &g, format, &x_l, &hi, options)?;
    debug!(
        "reverse limit at {} after {} bisection steps (bracket exponent {})",
        x0, bisection_steps, exponent_min
    );
    Ok(LimitResult {
        x0,
        exponent_min,
        bisection_steps,
    })
}

/// Phase one of the reverse search: exponential ascent.
///
/// Tests x = 2^-n for n = cap, cap - 1, ... where the cap is the
/// `max_exponent` option (by default the format's subnormal floor), so x
/// doubles at every step. The walk stops at the first exponent whose x
/// fails the agreement predicate and returns `(m, 2^-m)` for the last
/// accepted exponent m, the same bracket shape as the forward phase:
/// `x_l <= x0 <= 2 * x_l`.
///
/// Disagreement at the very first value means no agreement region exists
/// anywhere in the searched range and is a [`Error::NoLimitFound`]
/// failure. Agreement all the way up to `start_exponent` returns that
/// exponent; the boundary then lies above the searched range and only the
/// final bracket is refined.
pub fn find_limit_reverse_fast<F, G>(
    f: F,
    g: G,
    format: &PrecisionFormat,
    options: &LimitOptions,
) -> Result<(i64, Float), Error>
where
    F: Fn(&Float) -> Float,
    G: Fn(&Float) -> Float,
{
    let wide = format.compute_semantics();
    let floor = options
        .max_exponent
        .unwrap_or_else(|| -format.min_subnormal_exponent());

    let mut n = floor;
    while n >= options.start_exponent {
        let x = Float::one(wide, false)
            .scale(-n, RoundingMode::NearestTiesToEven);
        if !agree(&f, &g, &x, format, options.tolerance_ulps)? {
            if n == floor {
                // Even the smallest value in the range disagrees.
                return Err(Error::NoLimitFound { max_exponent: floor });
            }
            debug!("agreement last held at 2^-{}", n + 1);
            let lo = x.scale(-1, RoundingMode::NearestTiesToEven);
            return Ok((n + 1, lo));
        }
        trace!("agreement at 2^-{}", n);
        n -= 1;
    }

    let stop = options.start_exponent;
    debug!("agreement held up to 2^-{}; boundary above the range", stop);
    let x = Float::one(wide, false)
        .scale(-stop, RoundingMode::NearestTiesToEven);
    Ok((stop, x))
}

/// Phase two: bisection refinement.
///
/// `lo` and `hi` bracket the boundary: the agreement predicate holds at
/// `lo` and fails at `hi`. Midpoints are tested and the bracket halved
/// until the endpoints round to values of `format` that are no more than
/// `max(tolerance_ulps, 1)` steps apart, until the midpoint stops moving at
/// working precision, or until the hard step cap. Returns the step count
/// and the final lower endpoint, at which the predicate is known to hold.
///
/// Correctness relies on the predicate being monotone inside the bracket;
/// with oscillating agreement the result still satisfies the local bracket
/// conditions but need not be the global supremum.
pub fn bisect_limit<F, G>(
    f: F,
    g: G,
    format: &PrecisionFormat,
    lo: &Float,
    hi: &Float,
    options: &LimitOptions,
) -> Result<(usize, Float), Error>
where
    F: Fn(&Float) -> Float,
    G: Fn(&Float) -> Float,
{
    let wide = format.compute_semantics();
    let stop_ulps = options.tolerance_ulps.max(1);

    let mut lo = lo.cast(wide);
    let mut hi = hi.cast(wide);
    let mut last_mid: Option<Float> = None;
    let mut steps = 0;

    while steps < options.max_bisection_steps {
        if format.distance(&lo, &hi)?.unsigned_abs() <= stop_ulps {
            break;
        }

        let mid = (&lo + &hi).scale(-1, RoundingMode::NearestTiesToEven);
        if let Some(prev) = &last_mid {
            // The bracket collapsed at working precision.
            if *prev == mid {
                break;
            }
        }

        if agree(&f, &g, &mid, format, options.tolerance_ulps)? {
            lo = mid.clone();
        } else {
            hi = mid.clone();
        }
        last_mid = Some(mid);
        steps += 1;
    }

    Ok((steps, lo))
}

/// The agreement predicate: do `f` and `g` round to values of `format`
/// that are within `tolerance` steps of each other?
fn agree<F, G>(
    f: &F,
    g: &G,
    x: &Float,
    format: &PrecisionFormat,
    tolerance: u64,
) -> Result<bool, Error>
where
    F: Fn(&Float) -> Float,
    G: Fn(&Float) -> Float,
{
    let fx = eval(f, x, "reference function")?;
    let gx = eval(g, x, "approximation")?;
    if tolerance == 0 {
        return Ok(format.round(&fx) == format.round(&gx));
    }
    let d = format.distance(&fx, &gx)?;
    Ok(d.unsigned_abs() <= tolerance)
}

fn eval<F>(func: &F, x: &Float, what: &str) -> Result<Float, Error>
where
    F: Fn(&Float) -> Float,
{
    let y = func(x);
    if y.is_nan() {
        return Err(Error::Domain(format!(
            "{} is undefined at the evaluation point",
            what
        )));
    }
    Ok(y)
}

#[test]
fn test_sine_limit_single() {
    use crate::format::SINGLE;

    // Where does sin(x) stop being distinguishable from x in single
    // precision? Reference boundary: 4.43632889e-4.
    let res = find_limit(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
    )
    .unwrap();

    let x0 = res.x0.as_f64();
    assert!((x0 - 4.43632889e-4).abs() < 1e-8, "x0 was {}", x0);
    assert_eq!(res.exponent_min, 12);
    assert!(
        res.bisection_steps >= 15 && res.bisection_steps <= 40,
        "took {} steps",
        res.bisection_steps
    );
}

#[test]
fn test_sine_limit_boundary_invariant() {
    use crate::format::SINGLE;

    let res = find_limit(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
    )
    .unwrap();

    // Agreement holds at x0.
    assert_eq!(SINGLE.round(&res.x0.sin()), SINGLE.round(&res.x0));

    // And fails at the next representable value above it.
    let next = SINGLE
        .successor(&res.x0)
        .unwrap()
        .cast(res.x0.get_semantics());
    assert!(SINGLE.round(&next.sin()) != SINGLE.round(&next));
}

#[test]
fn test_fast_phase_bracket_guarantee() {
    use crate::format::SINGLE;

    let opts = LimitOptions::default();
    let (n, x_l) = find_limit_fast(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
        &opts,
    )
    .unwrap();
    assert_eq!(n, 12);
    assert_eq!(x_l.as_f64(), 2f64.powi(-12));

    let res = find_limit(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
    )
    .unwrap();
    assert!(res.x0.as_f64() >= x_l.as_f64());
    assert!(res.x0.as_f64() <= 2.0 * x_l.as_f64());
}

#[test]
fn test_bisect_limit_standalone() {
    use crate::format::SINGLE;

    // Hand the bisection the bracket the exponential phase would find.
    let wide = SINGLE.compute_semantics();
    let rm = RoundingMode::NearestTiesToEven;
    let lo = Float::one(wide, false).scale(-12, rm);
    let hi = lo.scale(1, rm);

    let (steps, x0) = bisect_limit(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
        &lo,
        &hi,
        &LimitOptions::default(),
    )
    .unwrap();

    assert!(steps >= 15 && steps <= 40);
    assert!(x0.as_f64() >= lo.as_f64() && x0.as_f64() <= hi.as_f64());
}

#[test]
fn test_cosine_limit_single() {
    use crate::format::SINGLE;

    // cos(x) rounds to 1.0 exactly up to x = 2^-12: at that point the
    // deficit is half an ULP of 1.0 and ties-to-even keeps the even side.
    let res = find_limit(
        |x: &Float| x.cos(),
        |x: &Float| Float::one(x.get_semantics(), false),
        &SINGLE,
    )
    .unwrap();

    assert_eq!(res.x0.as_f64(), 2f64.powi(-12));
    assert_eq!(res.exponent_min, 12);
}

#[test]
fn test_reverse_sine_limit_single() {
    use crate::format::SINGLE;

    // Walking up from the smallest value lands on the same boundary as
    // the forward search.
    let res = find_limit_reverse(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
    )
    .unwrap();

    let x0 = res.x0.as_f64();
    assert!((x0 - 4.43632889e-4).abs() < 1e-8, "x0 was {}", x0);
    assert_eq!(res.exponent_min, 12);
}

#[test]
fn test_reverse_no_agreement_at_the_floor() {
    use crate::format::SINGLE;

    // When even the smallest value disagrees there is no agreement region
    // to walk through.
    let res = find_limit_reverse(
        |x: &Float| x.clone(),
        |x: &Float| {
            let one = Float::one(x.get_semantics(), false);
            x + &one
        },
        &SINGLE,
    );
    assert!(matches!(
        res,
        Err(Error::NoLimitFound { max_exponent: 149 })
    ));
}

#[test]
fn test_reverse_agreement_spans_the_whole_range() {
    use crate::format::SINGLE;

    // Identical functions agree everywhere; the ascent reaches the top of
    // the range and the refined result stays inside the final bracket.
    let res = find_limit_reverse(
        |x: &Float| x.sin(),
        |x: &Float| x.sin(),
        &SINGLE,
    )
    .unwrap();
    assert_eq!(res.exponent_min, 1);
    let x0 = res.x0.as_f64();
    assert!(x0 >= 0.5 && x0 <= 1.0, "x0 was {}", x0);
}

#[test]
fn test_start_inside_the_agreement_region() {
    use crate::format::SINGLE;

    // Starting the forward phase below the true boundary means the upper
    // bracket end also agrees; the search still terminates and the result
    // stays inside the bracket it was handed.
    let opts = LimitOptions {
        start_exponent: 13,
        ..Default::default()
    };
    let res = find_limit_with(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
        &opts,
    )
    .unwrap();
    assert_eq!(res.exponent_min, 13);
    let x0 = res.x0.as_f64();
    assert!(x0 >= 2f64.powi(-13) && x0 <= 2f64.powi(-12), "x0 was {}", x0);
}

#[test]
fn test_tolerance_widens_the_region() {
    use crate::format::SINGLE;

    let exact = find_limit(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
    )
    .unwrap();

    let opts = LimitOptions {
        tolerance_ulps: 4,
        ..Default::default()
    };
    let loose = find_limit_with(
        |x: &Float| x.sin(),
        |x: &Float| x.clone(),
        &SINGLE,
        &opts,
    )
    .unwrap();

    assert!(loose.x0.as_f64() > exact.x0.as_f64());
}

#[test]
fn test_no_limit_found() {
    use crate::format::SINGLE;

    // An approximation that is off by one everywhere never agrees, no
    // matter how close to zero the search gets.
    let opts = LimitOptions {
        max_exponent: Some(32),
        ..Default::default()
    };
    let res = find_limit_with(
        |x: &Float| x.clone(),
        |x: &Float| {
            let one = Float::one(x.get_semantics(), false);
            x + &one
        },
        &SINGLE,
        &opts,
    );
    assert!(matches!(res, Err(Error::NoLimitFound { max_exponent: 32 })));
}

#[test]
fn test_undefined_function_is_a_domain_error() {
    use crate::format::SINGLE;

    let res = find_limit(
        |x: &Float| Float::nan(x.get_semantics(), false),
        |x: &Float| x.clone(),
        &SINGLE,
    );
    assert!(matches!(res, Err(Error::Domain(_))));
}

#[test]
fn test_default_cap_matches_format_range() {
    use crate::format::SINGLE;

    // With no explicit cap the search stops at the subnormal floor.
    let res = find_limit(
        |x: &Float| x.clone(),
        |x: &Float| {
            let one = Float::one(x.get_semantics(), false);
            x + &one
        },
        &SINGLE,
    );
    assert!(matches!(
        res,
        Err(Error::NoLimitFound { max_exponent: 149 })
    ));
}
