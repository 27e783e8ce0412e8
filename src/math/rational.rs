use anyhow::{Error, anyhow};
use fraction::{BigFraction, GenericFraction, Sign};
use num_bigint::BigUint;
use num_rational::Ratio;
use num_traits::ToPrimitive;
use std::{
    borrow::Borrow,
    cmp::Ordering,
    hash::Hash,
    iter::Sum,
    ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use super::traits::{Infinite, One, Signed, Zero};

/// Number of leading bits kept of numerator and denominator when approximating by a float.
const APPROX_BITS: u64 = 64;

/// An exact rational number, or one of the two signed infinities.
///
/// NaN never occurs as a result of the operations performed on matrix data: coefficients are
/// finite and infinite bounds are never combined with infinities of the opposite sign.
#[derive(Clone)]
pub struct Rational(pub fraction::BigFraction);

/// Shorthand for creating exact rationals from integers, `r!(3)`, or from a numerator and a
/// denominator, `r!(-1, 3)`.
#[macro_export]
macro_rules! r {
    ($n:expr) => {
        $crate::math::rational::Rational::from($n as i64)
    };
    ($n:expr, $d:expr) => {
        $crate::math::rational::Rational::from(($n as i64, $d as u64))
    };
}

impl Rational {
    pub fn is_sign_negative(&self) -> bool {
        self.0.is_sign_negative()
    }

    pub fn is_nan(&self) -> bool {
        self.0.is_nan()
    }

    pub fn sign(&self) -> Option<Sign> {
        self.0.sign()
    }

    /**
     * Float approximation within two units in the last place. Infinities map to the float
     * infinities; finite values too large for a float become a float infinity as well.
     */
    pub fn to_f64(&self) -> f64 {
        match &self.0 {
            GenericFraction::Rational(sign, ratio) => {
                let (numer, numer_shift) = leading_bits(ratio.numer());
                let (denom, denom_shift) = leading_bits(ratio.denom());
                let value = scale_by_power_of_two(
                    numer / denom,
                    numer_shift as i64 - denom_shift as i64,
                );
                match sign {
                    Sign::Plus => value,
                    Sign::Minus => -value,
                }
            }
            GenericFraction::Infinity(Sign::Plus) => f64::INFINITY,
            GenericFraction::Infinity(Sign::Minus) => f64::NEG_INFINITY,
            GenericFraction::NaN => f64::NAN,
        }
    }

    /**
     * A pair of floats that encloses this value: the approximation is widened by two units in
     * the last place on either side, which covers the truncation and rounding of numerator and
     * denominator and of their quotient.
     */
    pub fn to_interval(&self) -> (f64, f64) {
        let approx = self.to_f64();
        if self.is_abs_infinity() || approx.is_nan() {
            return (approx, approx);
        }
        (approx.next_down().next_down(), approx.next_up().next_up())
    }
}

/// The leading `APPROX_BITS` bits of a value as a float, and the number of bits dropped.
fn leading_bits(value: &BigUint) -> (f64, u64) {
    let shift = value.bits().saturating_sub(APPROX_BITS);
    let leading = value >> shift;
    (leading.to_f64().unwrap_or(f64::INFINITY), shift)
}

/// `value * 2^exponent`, in steps that keep the factor itself representable.
fn scale_by_power_of_two(mut value: f64, mut exponent: i64) -> f64 {
    const STEP: i64 = 512;
    while exponent > STEP && value.is_finite() && value != 0.0 {
        value *= 2f64.powi(STEP as i32);
        exponent -= STEP;
    }
    while exponent < -STEP && value != 0.0 {
        value *= 2f64.powi(-STEP as i32);
        exponent += STEP;
    }
    value * 2f64.powi(exponent as i32)
}

impl Infinite for Rational {
    fn infinity() -> Self {
        Self(BigFraction::infinity())
    }

    fn neg_infinity() -> Self {
        Self(BigFraction::neg_infinity())
    }

    fn is_infinity(&self) -> bool {
        matches!(self.0, GenericFraction::Infinity(Sign::Plus))
    }

    fn is_neg_infinity(&self) -> bool {
        matches!(self.0, GenericFraction::Infinity(Sign::Minus))
    }
}

impl One for Rational {
    fn one() -> Self {
        Self(GenericFraction::Rational(Sign::Plus, num::One::one()))
    }

    fn is_one(&self) -> bool {
        fraction::One::is_one(&self.0)
    }
}

impl Zero for Rational {
    fn zero() -> Self {
        Self(GenericFraction::Rational(Sign::Plus, num::Zero::zero()))
    }

    fn is_zero(&self) -> bool {
        fraction::Zero::is_zero(&self.0)
    }
}

impl Signed for Rational {
    fn abs(&self) -> Self {
        Self(fraction::Signed::abs(&self.0))
    }

    fn is_positive(&self) -> bool {
        !fraction::Zero::is_zero(&self.0) && fraction::Signed::is_positive(&self.0)
    }

    fn is_negative(&self) -> bool {
        !fraction::Zero::is_zero(&self.0) && fraction::Signed::is_negative(&self.0)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Rational {
    type Err = Error;

    fn from_str(s: &str) -> std::prelude::v1::Result<Self, Self::Err> {
        match s.trim() {
            "inf" | "+inf" | "infinity" => Ok(Self::infinity()),
            "-inf" | "-infinity" => Ok(Self::neg_infinity()),
            s => Ok(Self(
                BigFraction::from_str(s).map_err(|e| anyhow!("cannot parse `{}` as a rational: {:?}", s, e))?,
            )),
        }
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        let sign = if value < 0 { Sign::Minus } else { Sign::Plus };
        Self(GenericFraction::Rational(
            sign,
            Ratio::new(BigUint::from(value.unsigned_abs()), BigUint::from(1u32)),
        ))
    }
}

impl From<(i64, u64)> for Rational {
    fn from(value: (i64, u64)) -> Self {
        let sign = if value.0 < 0 { Sign::Minus } else { Sign::Plus };
        Self(GenericFraction::Rational(
            sign,
            Ratio::new(BigUint::from(value.0.unsigned_abs()), BigUint::from(value.1)),
        ))
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::fmt::Debug for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rational").field(&self.0).finish()
    }
}

impl Add<&Rational> for &Rational {
    type Output = Rational;

    fn add(self, rhs: &Rational) -> Self::Output {
        Rational((&self.0).add(&rhs.0))
    }
}

impl<T> AddAssign<T> for Rational
where
    T: Borrow<Rational>,
{
    fn add_assign(&mut self, rhs: T) {
        self.0.add_assign(&rhs.borrow().0)
    }
}

impl Sub<&Rational> for &Rational {
    type Output = Rational;

    fn sub(self, rhs: &Rational) -> Self::Output {
        Rational((&self.0).sub(&rhs.0))
    }
}

impl<T> SubAssign<T> for Rational
where
    T: Borrow<Rational>,
{
    fn sub_assign(&mut self, rhs: T) {
        self.0.sub_assign(&rhs.borrow().0)
    }
}

impl Mul<&Rational> for &Rational {
    type Output = Rational;

    fn mul(self, rhs: &Rational) -> Self::Output {
        Rational((&self.0).mul(&rhs.0))
    }
}

impl<T> MulAssign<T> for Rational
where
    T: Borrow<Rational>,
{
    fn mul_assign(&mut self, rhs: T) {
        self.0.mul_assign(&rhs.borrow().0)
    }
}

impl Div<&Rational> for &Rational {
    type Output = Rational;

    fn div(self, rhs: &Rational) -> Self::Output {
        Rational((&self.0).div(&rhs.0))
    }
}

impl Neg for Rational {
    type Output = Rational;

    fn neg(self) -> Self::Output {
        Rational(self.0.neg())
    }
}

impl<'a> Neg for &'a Rational {
    type Output = Rational;

    fn neg(self) -> Self::Output {
        Rational((&self.0).neg())
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Rational {}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Hash for Rational {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl Sum for Rational {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |sum, f| &sum + &f)
    }
}

impl<'a> Sum<&'a Rational> for Rational {
    fn sum<I: Iterator<Item = &'a Rational>>(iter: I) -> Self {
        iter.fold(Rational::zero(), |sum, f| &sum + f)
    }
}
