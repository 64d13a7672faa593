//! ═══════════════════════════════════════════════════════════════════════════════
//! FILE: rational.rs | CORE/SYMCIRC_ENGINE/src/rational.rs
//! PURPOSE: Exact rational arithmetic with shift-approximation on overflow
//! MODIFIED: 2026-07-21
//! LAYER: CORE → SYMCIRC_ENGINE
//! ═══════════════════════════════════════════════════════════════════════════════
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ CONTRACT                                                                    │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │ Every stored value is canonical: gcd(|num|, den) == 1, den > 0.             │
//! │ Arithmetic runs in i128 and re-canonicalizes. When a result does not fit    │
//! │ back into i64, both halves are right-shifted (with gcd reduction after      │
//! │ each shift) until they do, and the operation reports `exact = false`.       │
//! │ Callers pick per call: `lossy()` keeps the approximation, `strict()`        │
//! │ turns inexactness into `AnalysisError::Overflow`.                           │
//! │                                                                             │
//! │ `lcm` is always non-negative; `lcm(0, 0) == 0`.                             │
//! └─────────────────────────────────────────────────────────────────────────────┘

// ─────────────────────────────────────────────────────────────────────────────────
// CODE BELOW
// ─────────────────────────────────────────────────────────────────────────────────

use crate::error::AnalysisError;
use serde::Serialize;
use std::fmt;

/// Exact rational number in canonical form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Rat {
    num: i64,
    den: i64,
}

/// Outcome of one arithmetic operation: the canonical value plus an
/// exactness marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatResult {
    pub value: Rat,
    pub exact: bool,
}

impl RatResult {
    /// Early-exit combinator: inexact results become overflow errors.
    pub fn strict(self) -> Result<Rat, AnalysisError> {
        if self.exact {
            Ok(self.value)
        } else {
            Err(AnalysisError::Overflow)
        }
    }

    /// Keep the shift-approximation and forget the marker.
    pub fn lossy(self) -> Rat {
        self.value
    }

    /// Chain another operation, accumulating inexactness.
    pub fn and_then(self, f: impl FnOnce(Rat) -> RatResult) -> RatResult {
        let next = f(self.value);
        RatResult {
            value: next.value,
            exact: self.exact && next.exact,
        }
    }
}

fn gcd_u128(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn gcd_i128(a: i128, b: i128) -> i128 {
    gcd_u128(a.unsigned_abs(), b.unsigned_abs()) as i128
}

/// Non-negative gcd; `gcd(0, 0) == 0`.
pub fn gcd(a: i64, b: i64) -> i64 {
    let g = gcd_u128(a.unsigned_abs() as u128, b.unsigned_abs() as u128);
    debug_assert!(g <= i64::MAX as u128, "gcd of canonical values fits i64");
    g as i64
}

/// Non-negative lcm; `lcm(0, 0) == 0`. `None` when the result does not fit.
pub fn lcm(a: i64, b: i64) -> Option<i64> {
    if a == 0 && b == 0 {
        return Some(0);
    }
    let g = gcd(a, b) as i128;
    let l = ((a as i128) / g * (b as i128)).abs();
    i64::try_from(l).ok()
}

/// Canonicalize an i128 fraction, shift-approximating until it fits i64.
fn make(mut num: i128, mut den: i128) -> RatResult {
    debug_assert!(den != 0, "rational denominator must be non-zero");
    if den < 0 {
        num = -num;
        den = -den;
    }
    if num == 0 {
        return RatResult {
            value: Rat { num: 0, den: 1 },
            exact: true,
        };
    }
    let g = gcd_i128(num, den);
    num /= g;
    den /= g;

    let limit = i64::MAX as i128;
    let mut exact = true;
    while num > limit || num < -limit || den > limit {
        exact = false;
        num >>= 1;
        den >>= 1;
        if den == 0 {
            den = 1;
        }
        if num == 0 {
            den = 1;
            break;
        }
        let g = gcd_i128(num, den);
        num /= g;
        den /= g;
    }

    RatResult {
        value: Rat {
            num: num as i64,
            den: den as i64,
        },
        exact,
    }
}

impl Rat {
    pub const ZERO: Rat = Rat { num: 0, den: 1 };
    pub const ONE: Rat = Rat { num: 1, den: 1 };

    /// Canonicalized value; `None` when `den == 0`.
    pub fn new(num: i64, den: i64) -> Option<Rat> {
        if den == 0 {
            return None;
        }
        Some(make(num as i128, den as i128).value)
    }

    pub fn integer(n: i64) -> Rat {
        Rat { num: n, den: 1 }
    }

    pub fn num(self) -> i64 {
        self.num
    }

    pub fn den(self) -> i64 {
        self.den
    }

    /// -1, 0, or +1. The sign of zero is 0 here, but callers must not rely
    /// on the sign of results that merely happen to be zero.
    pub fn sign(self) -> i32 {
        match self.num.cmp(&0) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }
    }

    pub fn is_zero(self) -> bool {
        self.num == 0
    }

    pub fn is_one(self) -> bool {
        self.num == 1 && self.den == 1
    }

    pub fn is_integer(self) -> bool {
        self.den == 1
    }

    pub fn neg(self) -> Rat {
        // Canonical values never hold i64::MIN, so this cannot wrap.
        Rat {
            num: -self.num,
            den: self.den,
        }
    }

    pub fn abs(self) -> Rat {
        Rat {
            num: self.num.abs(),
            den: self.den,
        }
    }

    /// Multiplicative inverse; `None` when the numerator is zero.
    pub fn recip(self) -> Option<Rat> {
        if self.num == 0 {
            return None;
        }
        let (num, den) = if self.num < 0 {
            (-self.den, -self.num)
        } else {
            (self.den, self.num)
        };
        Some(Rat { num, den })
    }

    pub fn add(self, other: Rat) -> RatResult {
        make(
            self.num as i128 * other.den as i128 + other.num as i128 * self.den as i128,
            self.den as i128 * other.den as i128,
        )
    }

    pub fn sub(self, other: Rat) -> RatResult {
        self.add(other.neg())
    }

    pub fn mul(self, other: Rat) -> RatResult {
        make(
            self.num as i128 * other.num as i128,
            self.den as i128 * other.den as i128,
        )
    }

    /// `None` when the divisor is zero.
    pub fn div(self, other: Rat) -> Option<RatResult> {
        if other.num == 0 {
            return None;
        }
        Some(make(
            self.num as i128 * other.den as i128,
            self.den as i128 * other.num as i128,
        ))
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Rat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_construction() {
        let r = Rat::new(4, -6).unwrap();
        assert_eq!((r.num(), r.den()), (-2, 3));
        assert_eq!(Rat::new(0, 5).unwrap(), Rat::ZERO);
        assert!(Rat::new(1, 0).is_none());
    }

    #[test]
    fn test_arithmetic_exact() {
        let a = Rat::new(1, 3).unwrap();
        let b = Rat::new(1, 6).unwrap();
        assert_eq!(a.add(b).strict().unwrap(), Rat::new(1, 2).unwrap());
        assert_eq!(a.mul(b).strict().unwrap(), Rat::new(1, 18).unwrap());
        assert_eq!(
            a.div(b).unwrap().strict().unwrap(),
            Rat::integer(2),
            "1/3 over 1/6 is 2"
        );
        assert!(b.div(Rat::ZERO).is_none());
    }

    #[test]
    fn test_recip_requires_nonzero() {
        assert!(Rat::ZERO.recip().is_none());
        assert_eq!(
            Rat::new(-2, 3).unwrap().recip().unwrap(),
            Rat::new(-3, 2).unwrap()
        );
    }

    #[test]
    fn test_overflow_is_flagged_and_approximated() {
        let big = Rat::new(i64::MAX, 1).unwrap();
        let r = big.mul(big);
        assert!(!r.exact, "i64::MAX squared cannot be exact");
        assert!(r.value.to_f64() > 0.0);
        assert!(r.strict().is_err());
    }

    #[test]
    fn test_lcm_contract() {
        assert_eq!(lcm(0, 0), Some(0));
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(-4, 6), Some(12), "lcm is non-negative");
        assert_eq!(lcm(-4, -6), Some(12));
        assert!(lcm(i64::MAX, i64::MAX - 1).is_none());
    }

    proptest! {
        #[test]
        fn prop_results_are_canonical(an in -10_000i64..10_000, ad in 1i64..10_000,
                                      bn in -10_000i64..10_000, bd in 1i64..10_000) {
            let a = Rat::new(an, ad).unwrap();
            let b = Rat::new(bn, bd).unwrap();
            for r in [a.add(b).value, a.sub(b).value, a.mul(b).value] {
                prop_assert!(r.den() > 0);
                prop_assert_eq!(gcd(r.num(), r.den()), if r.num() == 0 { r.den() } else { 1 });
            }
        }

        #[test]
        fn prop_mul_div_roundtrip(an in -1000i64..1000, ad in 1i64..1000,
                                  bn in 1i64..1000, bd in 1i64..1000) {
            let a = Rat::new(an, ad).unwrap();
            let b = Rat::new(bn, bd).unwrap();
            let back = a.mul(b).strict().unwrap().div(b).unwrap().strict().unwrap();
            prop_assert_eq!(back, a);
        }

        #[test]
        fn prop_lcm_non_negative(a in i64::MIN / 2..i64::MAX / 2, b in -1000i64..1000) {
            if let Some(l) = lcm(a, b) {
                prop_assert!(l >= 0);
            }
        }
    }
}
