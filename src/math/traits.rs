pub trait One: Sized {
    fn one() -> Self;

    fn is_one(&self) -> bool;
}

pub trait Zero: Sized {
    fn zero() -> Self;

    fn is_zero(&self) -> bool;
}

pub trait Signed: Sized {
    fn abs(&self) -> Self;

    /// Returns true if the number is positive and false if the number is zero or negative.
    fn is_positive(&self) -> bool;

    /// Returns true if the number is negative and false if the number is zero or positive.
    fn is_negative(&self) -> bool;
}

/// Signed infinity markers, as used for absent variable bounds and row sides.
pub trait Infinite: Sized {
    fn infinity() -> Self;

    fn neg_infinity() -> Self;

    /// True for +infinity only.
    fn is_infinity(&self) -> bool;

    /// True for -infinity only.
    fn is_neg_infinity(&self) -> bool;

    /// True for either infinity.
    fn is_abs_infinity(&self) -> bool {
        self.is_infinity() || self.is_neg_infinity()
    }
}
