//! Randomness helpers and the bootstrap generator.
//!
//! [`Bootstrap`] is the general-purpose source used for prime candidates,
//! Miller-Rabin bases, private exponents and ephemeral keys. It wraps a
//! ChaCha20 stream that is either seeded from the OS or from a fixed `u64`
//! for reproducible runs.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{Error, Result};

/// Draws a uniform integer in `[0, bound)` by rejection sampling over the
/// smallest number of bits that spans `[0, bound - 1]`. A zero or unit bound
/// yields zero without drawing.
pub fn sample_below<R: Rng + ?Sized>(rng: &mut R, bound: &BigUint) -> BigUint {
    if bound <= &BigUint::one() {
        return BigUint::zero();
    }

    let bits = (bound - 1u32).bits();
    loop {
        let candidate = rng.gen_biguint(bits);
        if &candidate < bound {
            return candidate;
        }
    }
}

/// Draws a uniform integer in the inclusive range `[min, max]`.
///
/// Sampling is rejection based, so there is no modulo bias.
pub fn random_in_range<R: Rng + ?Sized>(
    rng: &mut R,
    min: &BigUint,
    max: &BigUint,
) -> Result<BigUint> {
    if min > max {
        return Err(Error::InvalidRange {
            min: min.clone(),
            max: max.clone(),
        });
    }

    let span = max - min + BigUint::one();
    Ok(min + sample_below(rng, &span))
}

/// Draws an odd integer with exactly `bit_length` bits (top bit forced).
pub fn random_candidate<R: Rng + ?Sized>(rng: &mut R, bit_length: u64) -> Result<BigUint> {
    if bit_length < 2 {
        return Err(Error::InvalidParameter(format!(
            "prime candidates need at least 2 bits, got {}",
            bit_length
        )));
    }

    let mut candidate = rng.gen_biguint(bit_length);
    candidate |= BigUint::one() << (bit_length - 1);
    candidate |= BigUint::one();
    Ok(candidate)
}

/// The bootstrap random source.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    rng: ChaCha20Rng,
}

impl Bootstrap {
    /// Seeds from operating system entropy.
    pub fn from_entropy() -> Self {
        Bootstrap {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Deterministic stream for tests and reproducible demos.
    pub fn seed_from_u64(seed: u64) -> Self {
        Bootstrap {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Uses `seed` when given, entropy otherwise.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seed_from_u64(s),
            None => Self::from_entropy(),
        }
    }

    pub fn random_in_range(&mut self, min: &BigUint, max: &BigUint) -> Result<BigUint> {
        random_in_range(self, min, max)
    }

    pub fn random_candidate(&mut self, bit_length: u64) -> Result<BigUint> {
        random_candidate(self, bit_length)
    }

    /// A value in `[2, n-1]` coprime to `n`, suitable as a BBS seed.
    pub fn generate_seed(&mut self, n: &BigUint) -> Result<BigUint> {
        let two = BigUint::from(2u32);
        if n <= &two {
            return Err(Error::InvalidParameter(format!(
                "seed modulus must exceed 2, got {}",
                n
            )));
        }

        let upper = n - BigUint::one();
        loop {
            let seed = self.random_in_range(&two, &upper)?;
            if super::modular::are_relatively_prime(n, &seed) {
                return Ok(seed);
            }
        }
    }
}

impl RngCore for Bootstrap {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
