//! Prime-field arithmetic over a ~384-bit modulus.
//!
//! [`FieldElement`] wraps a [`BigUint`] that is always kept in the range `[0, p)`. The modulus
//! itself is carried alongside the value rather than fixed at compile time, since the spec wants
//! `p` supplied at construction.

use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;
use rand_core::OsRng;

use crate::error::FieldError;

/// Default ~384-bit safe prime shipped with the core. Overridable via [`crate::config::Config`].
pub const DEFAULT_PRIME_DEC: &str =
    "3217764205203799784932704752664304146054249718236929650854413664663160419593347462060702926221334876307624599301\
879017296421514319479";

/// Placeholder generator of the multiplicative group; unused by the current protocols beyond
/// being carried through [`FieldParams`].
pub const DEFAULT_GENERATOR_DEC: &str = "2";

/// The modulus and generator a computation runs over.
#[derive(Clone, Debug)]
pub struct FieldParams {
    pub p: BigUint,
    pub g: BigUint,
}

impl FieldParams {
    pub fn new(p: BigUint, g: BigUint) -> Self {
        Self { p, g }
    }

    /// Builds the default ~384-bit field shipped with the core.
    pub fn default_params() -> Self {
        Self {
            p: DEFAULT_PRIME_DEC.parse().expect("default prime is valid"),
            g: DEFAULT_GENERATOR_DEC.parse().expect("default generator is valid"),
        }
    }

    pub fn elem(&self, value: impl Into<BigUint>) -> FieldElement {
        FieldElement::new(value.into(), &self.p)
    }

    pub fn zero(&self) -> FieldElement {
        FieldElement::new(BigUint::zero(), &self.p)
    }

    pub fn one(&self) -> FieldElement {
        FieldElement::new(BigUint::one(), &self.p)
    }

    /// Samples a uniform element in `[0, p)` using a CSPRNG.
    pub fn random(&self) -> FieldElement {
        FieldElement::new(sample_below(&self.p), &self.p)
    }

    /// Samples a uniform element in `[1, p)` using a CSPRNG.
    pub fn random_nonzero(&self) -> FieldElement {
        loop {
            let candidate = sample_below(&self.p);
            if !candidate.is_zero() {
                return FieldElement::new(candidate, &self.p);
            }
        }
    }
}

fn sample_below(bound: &BigUint) -> BigUint {
    let bits = bound.bits() as usize;
    let bytes = bits.div_ceil(8);
    let mut rng = OsRng;
    loop {
        let mut buf = vec![0u8; bytes];
        rng.fill(buf.as_mut_slice());
        let candidate = BigUint::from_bytes_be(&buf);
        if &candidate < bound {
            return candidate;
        }
    }
}

/// A non-negative integer strictly less than the field modulus `p`.
#[derive(Clone, PartialEq, Eq)]
pub struct FieldElement {
    value: BigUint,
    p: BigUint,
}

impl FieldElement {
    pub fn new(value: BigUint, p: &BigUint) -> Self {
        Self { value: value % p, p: p.clone() }
    }

    pub fn from_u64(value: u64, p: &BigUint) -> Self {
        Self::new(BigUint::from(value), p)
    }

    pub fn modulus(&self) -> &BigUint {
        &self.p
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    fn check_compatible(&self, other: &Self) {
        debug_assert_eq!(self.p, other.p, "field elements from different moduli combined");
    }

    pub fn add(&self, other: &Self) -> Self {
        self.check_compatible(other);
        Self::new(&self.value + &other.value, &self.p)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.check_compatible(other);
        let a = BigInt::from_biguint(Sign::Plus, self.value.clone());
        let b = BigInt::from_biguint(Sign::Plus, other.value.clone());
        let p = BigInt::from_biguint(Sign::Plus, self.p.clone());
        let diff = ((a - b) % &p + &p) % &p;
        Self::new(diff.to_biguint().expect("non-negative by construction"), &self.p)
    }

    pub fn mul(&self, other: &Self) -> Self {
        self.check_compatible(other);
        Self::new(&self.value * &other.value, &self.p)
    }

    pub fn neg(&self) -> Self {
        if self.is_zero() {
            self.clone()
        } else {
            Self::new(&self.p - &self.value, &self.p)
        }
    }

    /// Computes `self^-1 mod p` via the extended Euclidean algorithm.
    ///
    /// # Errors
    /// Returns [`FieldError::NotInvertible`] when `gcd(self, p) != 1` (in particular when
    /// `self` is zero).
    pub fn inverse(&self) -> Result<Self, FieldError> {
        let a = BigInt::from_biguint(Sign::Plus, self.value.clone());
        let m = BigInt::from_biguint(Sign::Plus, self.p.clone());
        let egcd = a.extended_gcd(&m);
        if egcd.gcd != BigInt::one() {
            return Err(FieldError::NotInvertible);
        }
        let inv = ((egcd.x % &m) + &m) % &m;
        Ok(Self::new(inv.to_biguint().expect("non-negative by construction"), &self.p))
    }

    pub fn div(&self, other: &Self) -> Result<Self, FieldError> {
        Ok(self.mul(&other.inverse()?))
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.value)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> FieldParams {
        FieldParams::new(BigUint::from(31u32), BigUint::from(3u32))
    }

    #[test]
    fn inverse_law_holds_for_all_nonzero_elements() {
        let params = small_params();
        for v in 1u64..31 {
            let a = params.elem(BigUint::from(v));
            let inv = a.inverse().unwrap();
            assert!(a.mul(&inv).value().is_one());
        }
    }

    #[test]
    fn inverse_of_zero_is_domain_error() {
        let params = small_params();
        let zero = params.zero();
        assert!(matches!(zero.inverse(), Err(FieldError::NotInvertible)));
    }

    #[test]
    fn sub_wraps_around_modulus() {
        let params = small_params();
        let a = params.elem(BigUint::from(2u32));
        let b = params.elem(BigUint::from(5u32));
        let diff = a.sub(&b);
        assert_eq!(diff.value(), &BigUint::from(28u32));
    }

    #[test]
    fn default_params_parse() {
        let params = FieldParams::default_params();
        assert!(params.p.bits() >= 380);
    }

    proptest::proptest! {
        #[test]
        fn add_is_commutative(a in 0u64..31, b in 0u64..31) {
            let params = small_params();
            let x = params.elem(BigUint::from(a));
            let y = params.elem(BigUint::from(b));
            proptest::prop_assert_eq!(x.add(&y).value().clone(), y.add(&x).value().clone());
        }

        #[test]
        fn sub_then_add_recovers_original(a in 0u64..31, b in 0u64..31) {
            let params = small_params();
            let x = params.elem(BigUint::from(a));
            let y = params.elem(BigUint::from(b));
            proptest::prop_assert_eq!(x.sub(&y).add(&y).value().clone(), x.value().clone());
        }
    }
}
