//! Multiplicative (`one_share`) and additive (`zero_share`) sharing primitives used to blind
//! private values during the masked-multiplication sub-protocols.
//!
//! Shares are generated fresh per sub-protocol and dropped once consumed; nothing here is
//! persisted across calls.

use crate::error::SharingError;
use crate::field::{FieldElement, FieldParams};

/// A sequence of field elements produced by [`one_share`] or [`zero_share`].
pub type Shares = Vec<FieldElement>;

/// Samples `k` values whose product is `1 (mod p)`.
///
/// Draws `r_1, ..., r_{k-1}` uniformly from `[1, p)` and sets `r_k` to the modular inverse of
/// their product, so `r_1 * ... * r_k == 1`. Each `r_m` is uniform when viewed by any strict
/// subset of holders.
///
/// # Errors
/// Returns [`SharingError::ShareSizeTooSmall`] when `k < 2`.
pub fn one_share(k: usize, params: &FieldParams) -> Result<Shares, SharingError> {
    if k < 2 {
        return Err(SharingError::ShareSizeTooSmall(k));
    }
    let mut shares: Shares = (0..k - 1).map(|_| params.random_nonzero()).collect();
    let mut product = params.one();
    for r in &shares {
        product = product.mul(r);
    }
    // product is nonzero (product of nonzero elements mod a prime), so this cannot fail.
    let last = product.inverse().expect("product of nonzero elements is invertible mod a prime");
    shares.push(last);
    Ok(shares)
}

/// Samples `k` values whose sum is `0 (mod p)`.
///
/// Draws `r_1, ..., r_{k-1}` uniformly from `[0, p)` and sets `r_k = -(r_1 + ... + r_{k-1})`.
///
/// # Errors
/// Returns [`SharingError::ShareSizeTooSmall`] when `k < 2`.
pub fn zero_share(k: usize, params: &FieldParams) -> Result<Shares, SharingError> {
    if k < 2 {
        return Err(SharingError::ShareSizeTooSmall(k));
    }
    let mut shares: Shares = (0..k - 1).map(|_| params.random()).collect();
    let mut sum = params.zero();
    for r in &shares {
        sum = sum.add(r);
    }
    shares.push(sum.neg());
    Ok(shares)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    fn params() -> FieldParams {
        FieldParams::default_params()
    }

    #[test]
    fn one_share_product_is_one_for_various_k() {
        let params = params();
        for k in 2..6 {
            let shares = one_share(k, &params).unwrap();
            assert_eq!(shares.len(), k);
            let mut product = params.one();
            for r in &shares {
                product = product.mul(r);
            }
            assert!(product.value().eq(&BigUint::from(1u32)));
        }
    }

    #[test]
    fn zero_share_sum_is_zero_for_various_k() {
        let params = params();
        for k in 2..6 {
            let shares = zero_share(k, &params).unwrap();
            assert_eq!(shares.len(), k);
            let mut sum = params.zero();
            for r in &shares {
                sum = sum.add(r);
            }
            assert!(sum.is_zero());
        }
    }

    #[test]
    fn rejects_share_size_below_two() {
        let params = params();
        assert_eq!(one_share(1, &params), Err(SharingError::ShareSizeTooSmall(1)));
        assert_eq!(zero_share(0, &params), Err(SharingError::ShareSizeTooSmall(0)));
    }
}
