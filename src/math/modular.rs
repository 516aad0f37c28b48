//! # Modular Arithmetic
//!
//! The kernel every other part of the crate builds on: Euclid's algorithm,
//! its extended form, modular inversion and square-and-multiply
//! exponentiation. All functions are pure and operate on non-negative
//! `BigUint` values; only the extended GCD needs signed coefficients.
//!
//! ```rust
//! use num_bigint::BigUint;
//! use toycrypt::math::modular::{mod_inverse, mod_pow};
//!
//! let p = BigUint::from(29u32);
//! let inv = mod_inverse(&BigUint::from(3u32), &p).unwrap();
//! assert_eq!(inv, BigUint::from(10u32)); // 3 * 10 = 30 = 1 (mod 29)
//! assert_eq!(mod_pow(&BigUint::from(2u32), &BigUint::from(26u32), &p), BigUint::from(22u32));
//! ```

use num_bigint::{BigInt, BigUint, ToBigUint};
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::error::{Error, Result};

/// Greatest common divisor by the iterative Euclidean algorithm.
///
/// Operand order does not matter: if `a < b` the first step swaps them.
/// `gcd(0, n) == n`.
pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    let mut larger = a.clone();
    let mut smaller = b.clone();

    while !smaller.is_zero() {
        let remainder = &larger % &smaller;
        larger = smaller;
        smaller = remainder;
    }

    larger
}

/// Returns `true` if `gcd(x, y) == 1`.
pub fn are_relatively_prime(x: &BigUint, y: &BigUint) -> bool {
    gcd(x, y).is_one()
}

/// Extended Euclidean Algorithm.
/// Returns `(g, x, y)` such that `a*x + b*y = g = gcd(a, b)`.
///
/// Iterative: the remainder sequence and both coefficient sequences are
/// advanced together, so deep inputs cannot overflow the stack.
pub fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let quotient = old_r.div_floor(&r);

        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, next_s);

        let next_t = &old_t - &quotient * &t;
        old_t = std::mem::replace(&mut t, next_t);
    }

    (old_r, old_s, old_t)
}

/// Finds `x` in `[0, m)` with `a * x = 1 (mod m)`.
///
/// Fails with [`Error::NoInverse`] when `gcd(a, m) != 1` and with
/// [`Error::InvalidParameter`] for a zero modulus.
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint> {
    if m.is_zero() {
        return Err(Error::InvalidParameter(
            "modular inverse needs a nonzero modulus".to_string(),
        ));
    }

    let a_int = BigInt::from(a % m);
    let m_int = BigInt::from(m.clone());
    let (g, x, _) = extended_gcd(&a_int, &m_int);

    if !g.is_one() {
        return Err(Error::NoInverse {
            value: a.clone(),
            modulus: m.clone(),
        });
    }

    // mod_floor keeps the residue in [0, m) even for a negative coefficient.
    let residue = x.mod_floor(&m_int);
    match residue.to_biguint() {
        Some(value) => Ok(value),
        None => Err(Error::NoInverse {
            value: a.clone(),
            modulus: m.clone(),
        }),
    }
}

/// Computes `base^exp mod modulus` by right-to-left square-and-multiply.
///
/// `base` is reduced into `[0, modulus)` first; the loop performs
/// `O(log exp)` multiplications.
///
/// # Panics
/// Panics if `modulus` is zero, like `BigUint::modpow`.
pub fn mod_pow(base: &BigUint, exp: &BigUint, modulus: &BigUint) -> BigUint {
    assert!(!modulus.is_zero(), "mod_pow: modulus must be nonzero");

    if modulus.is_one() {
        return BigUint::zero();
    }

    let mut result = BigUint::one();
    let mut base = base % modulus;
    let mut exp = exp.clone();

    while !exp.is_zero() {
        if exp.is_odd() {
            result = (&result * &base) % modulus;
        }
        base = (&base * &base) % modulus;
        exp >>= 1;
    }

    result
}

/// Absolute difference of two unsigned values.
pub(crate) fn abs_diff(a: &BigUint, b: &BigUint) -> BigUint {
    if a >= b {
        a - b
    } else {
        b - a
    }
}
