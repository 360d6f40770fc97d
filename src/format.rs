//! Describes binary floating-point encodings, and the rounding, ULP and
//! step-distance queries defined over them.

use arpfloat::{Float, RoundingMode, Semantics};

use crate::error::Error;

/// Extra significand bits used when evaluating expressions that are later
/// rounded into a format. The guard is generous so that intermediate
/// subtraction and division never disturb the bits that survive rounding.
const COMPUTE_GUARD_BITS: usize = 64;

/// An immutable descriptor of a binary floating-point encoding: the number
/// of exponent bits and the number of significand bits, counting the
/// implicit leading bit.
///
/// Two formats are equal iff both fields are equal. The three standard
/// widths are available as [`SINGLE`], [`DOUBLE`] and [`EXTENDED`], or by
/// total width through [`PrecisionFormat::from_total_bits`]; any other
/// combination can be constructed with [`PrecisionFormat::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrecisionFormat {
    exponent_bits: usize,
    significand_bits: usize,
}

/// IEEE 754 single precision: 8 exponent bits, 24 significand bits.
pub const SINGLE: PrecisionFormat = PrecisionFormat {
    exponent_bits: 8,
    significand_bits: 24,
};
/// IEEE 754 double precision: 11 exponent bits, 53 significand bits.
pub const DOUBLE: PrecisionFormat = PrecisionFormat {
    exponent_bits: 11,
    significand_bits: 53,
};
/// 80-bit extended precision: 15 exponent bits, 65 significand bits.
pub const EXTENDED: PrecisionFormat = PrecisionFormat {
    exponent_bits: 15,
    significand_bits: 65,
};

impl PrecisionFormat {
    /// Create a format from explicit bit counts. The exponent needs at
    /// least two bits for a meaningful bias, and the significand at least
    /// two bits (the implicit bit plus one stored bit).
    pub fn new(
        exponent_bits: usize,
        significand_bits: usize,
    ) -> Result<Self, Error> {
        if !(2..=60).contains(&exponent_bits) {
            return Err(Error::PrecisionConfig(format!(
                "exponent width of {} bits is out of range",
                exponent_bits
            )));
        }
        if significand_bits < 2 {
            return Err(Error::PrecisionConfig(format!(
                "significand width of {} bits is out of range",
                significand_bits
            )));
        }
        Ok(PrecisionFormat {
            exponent_bits,
            significand_bits,
        })
    }

    /// Look up a standard format by its total bit width. Only the three
    /// named widths (32, 64, 80) resolve; everything else must go through
    /// [`PrecisionFormat::new`].
    pub fn from_total_bits(bits: usize) -> Result<Self, Error> {
        match bits {
            32 => Ok(SINGLE),
            64 => Ok(DOUBLE),
            80 => Ok(EXTENDED),
            _ => Err(Error::PrecisionConfig(format!(
                "no standard format with {} total bits",
                bits
            ))),
        }
    }

    /// Returns the number of exponent bits.
    pub fn exponent_bits(&self) -> usize {
        self.exponent_bits
    }

    /// Returns the number of significand bits, including the implicit bit.
    pub fn significand_bits(&self) -> usize {
        self.significand_bits
    }

    /// The precision, in bits, used when rounding a value into the format.
    pub fn working_precision(&self) -> usize {
        self.significand_bits
    }

    /// The total encoded width: sign, exponent, and the stored part of the
    /// significand.
    pub fn total_bits(&self) -> usize {
        1 + self.exponent_bits + (self.significand_bits - 1)
    }

    /// Returns the exponent bias, as a positive number.
    pub fn exponent_bias(&self) -> i64 {
        ((1u64 << (self.exponent_bits - 1)) - 1) as i64
    }

    /// The smallest exponent of a normal value.
    pub fn min_normal_exponent(&self) -> i64 {
        1 - self.exponent_bias()
    }

    /// The exponent of the smallest positive subnormal value, which is also
    /// the step size everywhere inside the subnormal range.
    pub fn min_subnormal_exponent(&self) -> i64 {
        self.min_normal_exponent() - (self.significand_bits as i64 - 1)
    }

    /// Returns the smallest positive value of the format.
    pub fn smallest_positive(&self) -> Float {
        self.power_of_two(self.min_subnormal_exponent())
    }

    /// The arbitrary-precision semantics matching this format, rounding
    /// ties-to-even.
    pub fn semantics(&self) -> Semantics {
        self.semantics_with_rm(RoundingMode::NearestTiesToEven)
    }

    /// The arbitrary-precision semantics matching this format under an
    /// explicit rounding mode.
    pub fn semantics_with_rm(&self, rm: RoundingMode) -> Semantics {
        Semantics::new(self.exponent_bits, self.significand_bits, rm)
    }

    /// A widened semantics for evaluating expressions whose result is later
    /// rounded into the format.
    pub(crate) fn compute_semantics(&self) -> Semantics {
        self.semantics()
            .increase_precision(COMPUTE_GUARD_BITS)
            .increase_exponent(2)
    }

    /// Rounds `value` to the nearest value representable in this format,
    /// ties-to-even.
    ///
    /// The conversion happens by re-evaluating the value under the target
    /// working precision (the library's correctly rounded cast), not by bit
    /// manipulation, so it inherits the reference semantics of the
    /// underlying arithmetic.
    pub fn round(&self, value: &Float) -> Float {
        self.round_with_rm(value, RoundingMode::NearestTiesToEven)
    }

    /// Rounds `value` into this format under an explicit rounding mode.
    pub fn round_with_rm(&self, value: &Float, rm: RoundingMode) -> Float {
        value.cast_with_rm(self.semantics_with_rm(rm), rm)
    }

    /// Returns the gap between `value` and its next representable neighbor
    /// of larger magnitude under this format.
    ///
    /// The value is rounded into the format first, so the result reflects
    /// the binade of the representable value: the gap is constant within a
    /// binade and doubles at each power-of-two boundary. Zero, and any
    /// value that rounds into the subnormal range, yields the smallest
    /// subnormal step. Non-finite inputs, and values that overflow the
    /// format, are domain errors.
    pub fn ulp(&self, value: &Float) -> Result<Float, Error> {
        if value.is_nan() || value.is_inf() {
            return Err(Error::Domain(
                "ulp of a non-finite value".to_string(),
            ));
        }
        let rounded = self.round(value);
        if rounded.is_inf() {
            return Err(Error::Domain(
                "value overflows the format".to_string(),
            ));
        }

        let step_exp = if self.is_below_normal_range(&rounded) {
            self.min_subnormal_exponent()
        } else {
            rounded.get_exp() - (self.significand_bits as i64 - 1)
        };
        Ok(self.power_of_two(step_exp))
    }

    /// Counts the representable steps between `a` and `b` in this format.
    ///
    /// The count is signed: positive when `b > a`, so that
    /// `distance(a, b) == -distance(b, a)`. Both values are rounded into
    /// the format first, and the ULP used for sizing is taken at the
    /// larger-magnitude of the two rounded values, since the step size
    /// changes across binade boundaries. Separations of 2^53 steps or more
    /// cannot be converted exactly and are reported as
    /// [`Error::Domain`] rather than as a truncated count.
    pub fn distance(&self, a: &Float, b: &Float) -> Result<i64, Error> {
        if a.is_nan() || a.is_inf() || b.is_nan() || b.is_inf() {
            return Err(Error::Domain(
                "distance between non-finite values".to_string(),
            ));
        }
        let ra = self.round(a);
        let rb = self.round(b);
        if ra == rb {
            return Ok(0);
        }

        let rep = if ra.abs() > rb.abs() {
            ra.clone()
        } else {
            rb.clone()
        };
        let step = self.ulp(&rep)?;

        let wide = self.compute_semantics();
        let diff = &rb.cast(wide) - &ra.cast(wide);
        let steps = &diff / &step.cast(wide);

        // The quotient is an exact integer at the widened precision as
        // long as it stays below 2^53; past that the f64 conversion can
        // no longer carry it.
        let cap = Float::one(wide, false)
            .scale(53, RoundingMode::NearestTiesToEven);
        if steps.abs() >= cap {
            return Err(Error::Domain(format!(
                "step distance between {} and {} is 2^53 or more",
                ra, rb
            )));
        }
        Ok(steps.as_f64().round() as i64)
    }

    /// Returns the next value representable in this format strictly greater
    /// than `round(value)`. Saturates to infinity above the largest finite
    /// value.
    pub fn successor(&self, value: &Float) -> Result<Float, Error> {
        let rounded = self.round(value);
        let step = self.ulp(&rounded)?;

        // Adding half a step and rounding up lands exactly on the neighbor,
        // including for negative values at a binade boundary where the gap
        // above is half the ULP of the magnitude.
        let wide = self.compute_semantics();
        let half = step.cast(wide).scale(-1, RoundingMode::NearestTiesToEven);
        let nudged = &rounded.cast(wide) + &half;
        Ok(self.round_with_rm(&nudged, RoundingMode::Positive))
    }

    /// Returns 2^k in the format's own semantics. `k` must be within the
    /// format's representable range.
    fn power_of_two(&self, k: i64) -> Float {
        Float::one(self.semantics(), false)
            .scale(k, RoundingMode::NearestTiesToEven)
    }

    fn is_below_normal_range(&self, rounded: &Float) -> bool {
        if rounded.is_zero() {
            return true;
        }
        let min_normal = self.power_of_two(self.min_normal_exponent());
        rounded.abs() < min_normal
    }
}

#[test]
fn test_standard_formats() {
    assert_eq!(PrecisionFormat::from_total_bits(32).unwrap(), SINGLE);
    assert_eq!(PrecisionFormat::from_total_bits(64).unwrap(), DOUBLE);
    assert_eq!(PrecisionFormat::from_total_bits(80).unwrap(), EXTENDED);
    assert!(PrecisionFormat::from_total_bits(16).is_err());
    assert!(PrecisionFormat::from_total_bits(128).is_err());

    assert_eq!(SINGLE.total_bits(), 32);
    assert_eq!(DOUBLE.total_bits(), 64);
    assert_eq!(EXTENDED.total_bits(), 80);

    assert_eq!(SINGLE.working_precision(), 24);
    assert_eq!(SINGLE.exponent_bias(), 127);
    assert_eq!(SINGLE.min_normal_exponent(), -126);
    assert_eq!(SINGLE.min_subnormal_exponent(), -149);
    assert_eq!(DOUBLE.exponent_bias(), 1023);
    assert_eq!(DOUBLE.min_subnormal_exponent(), -1074);
}

#[test]
fn test_invalid_formats() {
    assert!(PrecisionFormat::new(0, 24).is_err());
    assert!(PrecisionFormat::new(1, 24).is_err());
    assert!(PrecisionFormat::new(61, 24).is_err());
    assert!(PrecisionFormat::new(8, 0).is_err());
    assert!(PrecisionFormat::new(8, 1).is_err());
    // The half-precision layout is not a named format but is constructible.
    assert!(PrecisionFormat::new(5, 11).is_ok());
}

#[test]
fn test_round_idempotent() {
    for v in [0.1, 1.5, -3.14159265, 123456.789, 6.1e-5, 1e-40] {
        let x = Float::from_f64(v);
        let once = SINGLE.round(&x);
        let twice = SINGLE.round(&once);
        assert_eq!(once, twice);
    }
}

#[test]
fn test_ulp_at_one() {
    let u = SINGLE.ulp(&Float::from_f64(1.0)).unwrap();
    assert_eq!(u.as_f64(), 2f64.powi(-23));
    assert_eq!(DOUBLE.ulp(&Float::from_f64(1.0)).unwrap().as_f64(), 2f64.powi(-52));

    // One plus a full ULP is distinguishable from one at the format's
    // precision; one plus half a ULP rounds back to one (ties-to-even).
    let one = Float::one(SINGLE.semantics(), false);
    let full = &one + &u;
    assert!(full != one);
    let half = u.scale(-1, RoundingMode::NearestTiesToEven);
    let same = &one + &half;
    assert!(same == one);
}

#[test]
fn test_ulp_at_zero_and_subnormals() {
    let zero = Float::zero(SINGLE.semantics(), false);
    assert_eq!(SINGLE.ulp(&zero).unwrap().as_f64(), 2f64.powi(-149));
    assert_eq!(SINGLE.smallest_positive().as_f64(), 2f64.powi(-149));

    // Everything inside the subnormal range shares the same step.
    let tiny = Float::from_f64(1e-41);
    assert_eq!(SINGLE.ulp(&tiny).unwrap().as_f64(), 2f64.powi(-149));
}

#[test]
fn test_ulp_non_finite() {
    let sem = SINGLE.semantics();
    assert!(SINGLE.ulp(&Float::inf(sem, false)).is_err());
    assert!(SINGLE.ulp(&Float::nan(sem, false)).is_err());
    // A value beyond the format's range rounds to infinity and is rejected.
    assert!(SINGLE.ulp(&Float::from_f64(1e80)).is_err());
}

#[test]
fn test_ulp_constant_within_binade() {
    for e in -10..10 {
        let mid = Float::from_f64(1.5 * 2f64.powi(e));
        let top = Float::from_f64(1.999 * 2f64.powi(e));
        let expected = 2f64.powi(e - 23);
        assert_eq!(SINGLE.ulp(&mid).unwrap().as_f64(), expected);
        assert_eq!(SINGLE.ulp(&top).unwrap().as_f64(), expected);
    }
}

#[test]
fn test_ulp_doubles_across_binade() {
    assert_eq!(SINGLE.ulp(&Float::from_f64(1.0)).unwrap().as_f64(), 2f64.powi(-23));
    assert_eq!(SINGLE.ulp(&Float::from_f64(2.0)).unwrap().as_f64(), 2f64.powi(-22));
    assert_eq!(SINGLE.ulp(&Float::from_f64(4.0)).unwrap().as_f64(), 2f64.powi(-21));
    // The sign plays no role in the step size.
    assert_eq!(SINGLE.ulp(&Float::from_f64(-2.0)).unwrap().as_f64(), 2f64.powi(-22));
}

#[test]
fn test_distance_decimal_strings() {
    // Parse at a precision well above the target format so that the only
    // rounding that happens is the explicit one inside `distance`.
    let wide = DOUBLE.semantics();
    let a = Float::try_from_str("1.00001001", wide).unwrap();
    let b = Float::try_from_str("1.00001013", wide).unwrap();
    assert_eq!(SINGLE.distance(&a, &b).unwrap(), 1);

    let c = Float::try_from_str("1.000011", wide).unwrap();
    let d = SINGLE.distance(&a, &c).unwrap();
    assert!(d > 1 && d < 10, "distance was {}", d);
}

#[test]
fn test_distance_is_signed() {
    let a = Float::from_f64(1.0);
    let b = Float::from_f64(1.000001);
    let d = SINGLE.distance(&a, &b).unwrap();
    assert!(d > 0);
    assert_eq!(SINGLE.distance(&b, &a).unwrap(), -d);
    assert_eq!(SINGLE.distance(&a, &a).unwrap(), 0);
}

#[test]
fn test_distance_rejects_counts_past_exact_range() {
    // Adjacent binades of the 80-bit format are 2^63 steps apart, far
    // beyond what the i64 conversion can carry exactly.
    let one = Float::from_f64(1.0);
    let two = Float::from_f64(2.0);
    assert!(EXTENDED.distance(&one, &two).is_err());

    // One step past 2^53 at double precision: (4 + 2^-51) / 2^-51.
    let a = Float::from_f64(-2.0);
    let b = Float::from_f64(2.0 + 2f64.powi(-51));
    assert!(DOUBLE.distance(&a, &b).is_err());

    // Large but exactly convertible counts still resolve.
    assert_eq!(DOUBLE.distance(&one, &two).unwrap(), 1i64 << 51);
}

#[test]
fn test_distance_rejects_non_finite() {
    let sem = SINGLE.semantics();
    let one = Float::one(sem, false);
    assert!(SINGLE.distance(&one, &Float::inf(sem, false)).is_err());
    assert!(SINGLE.distance(&Float::nan(sem, false), &one).is_err());
}

#[test]
fn test_successor() {
    let one = Float::from_f64(1.0);
    assert_eq!(
        SINGLE.successor(&one).unwrap().as_f64(),
        1.0 + 2f64.powi(-23)
    );
    // Upward across a binade boundary the step grows.
    let two = Float::from_f64(2.0);
    assert_eq!(
        SINGLE.successor(&two).unwrap().as_f64(),
        2.0 + 2f64.powi(-22)
    );
    // For a negative value at a boundary the gap above is half the ULP of
    // the magnitude.
    let neg_two = Float::from_f64(-2.0);
    assert_eq!(
        SINGLE.successor(&neg_two).unwrap().as_f64(),
        -2.0 + 2f64.powi(-23)
    );
}

#[test]
fn test_round_half_ulp_never_overshoots() {
    // round(x + ulp/2) is either round(x) or its successor, never further.
    let wide = DOUBLE.semantics();
    for v in [0.37, 1.0, 1.5, 2.0, 3.1415926, 1234.5678, 6.1e-5] {
        let x = Float::from_f64(v).cast(wide);
        let u = SINGLE.ulp(&x).unwrap().cast(wide);
        let half = u.scale(-1, RoundingMode::NearestTiesToEven);
        let shifted = &x + &half;

        let r = SINGLE.round(&shifted);
        let base = SINGLE.round(&x);
        let succ = SINGLE.successor(&x).unwrap();
        assert!(r == base || r == succ, "overshoot at {}", v);
    }
}
