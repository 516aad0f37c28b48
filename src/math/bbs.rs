//! # Blum-Blum-Shub
//!
//! A pseudo-random bit generator built on two Blum primes `p = q = 3 (mod 4)`.
//! Every output bit is the parity of the next quadratic residue
//! `s <- s^2 mod n`, with `n = p*q`. The state only moves forward; it is
//! never exposed.
//!
//! The primes and seed come from a [`Bootstrap`] source that is used once
//! for construction and then dropped, so draws from the generator never
//! touch the bootstrap stream again.
//!
//! ```rust
//! use toycrypt::math::bbs::BlumBlumShub;
//!
//! let mut bbs = BlumBlumShub::with_seed(32, 7).unwrap();
//! let value = bbs.rand();
//! assert!(value.bits() <= 32);
//! ```

use num_bigint::BigUint;
use num_integer::Integer;
use rand::RngCore;

use super::primality::PrimeSource;
use super::random::Bootstrap;
use crate::error::{Error, Result};

/// Smallest prime bit length accepted by [`BlumBlumShub::new`].
pub const MIN_BBS_BITS: u64 = 8;

pub struct BlumBlumShub {
    n: BigUint,
    state: BigUint,
    bit_length: u64,
}

impl BlumBlumShub {
    /// Generator whose primes each have `bit_length` bits; `rand()` returns
    /// up to `bit_length` bits.
    pub fn new(bit_length: u64) -> Result<Self> {
        Self::from_bootstrap(bit_length, Bootstrap::from_entropy())
    }

    /// Deterministic variant of [`BlumBlumShub::new`].
    pub fn with_seed(bit_length: u64, seed: u64) -> Result<Self> {
        Self::from_bootstrap(bit_length, Bootstrap::seed_from_u64(seed))
    }

    fn from_bootstrap(bit_length: u64, mut bootstrap: Bootstrap) -> Result<Self> {
        if bit_length < MIN_BBS_BITS {
            return Err(Error::InvalidParameter(format!(
                "Blum-Blum-Shub needs primes of at least {} bits, got {}",
                MIN_BBS_BITS, bit_length
            )));
        }

        let (p, q) = bootstrap.generate_prime_pair(&PrimeSource::Bits(bit_length), true)?;
        Self::from_primes(&p, &q, bit_length, &mut bootstrap)
    }

    /// Generator whose primes are drawn from `[min, max]`; `rand()` returns
    /// as many bits as the modulus has.
    pub fn in_range(min: &BigUint, max: &BigUint) -> Result<Self> {
        let mut bootstrap = Bootstrap::from_entropy();
        let source = PrimeSource::Range {
            min: min.clone(),
            max: max.clone(),
        };
        let (p, q) = bootstrap.generate_prime_pair(&source, true)?;
        let bits = (&p * &q).bits();
        Self::from_primes(&p, &q, bits, &mut bootstrap)
    }

    fn from_primes(
        p: &BigUint,
        q: &BigUint,
        bit_length: u64,
        bootstrap: &mut Bootstrap,
    ) -> Result<Self> {
        let n = p * q;
        let state = bootstrap.generate_seed(&n)?;
        Ok(BlumBlumShub {
            n,
            state,
            bit_length,
        })
    }

    /// Number of bits produced by [`BlumBlumShub::rand`].
    pub fn bit_length(&self) -> u64 {
        self.bit_length
    }

    /// The public modulus `n = p*q`.
    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    /// Produces the next `bit_length` bits, least significant bit first.
    pub fn rand(&mut self) -> BigUint {
        let bits = self.bit_length;
        self.next_bits(bits)
    }

    /// Produces `count` fresh bits as an integer, least significant bit first.
    pub fn next_bits(&mut self, count: u64) -> BigUint {
        let mut bytes = vec![0u8; ((count + 7) / 8) as usize];
        self.squeeze(&mut bytes, count);
        BigUint::from_bytes_le(&bytes)
    }

    /// Advances the state once per bit and writes each parity into `out`.
    fn squeeze(&mut self, out: &mut [u8], count: u64) {
        for position in 0..count {
            self.state = (&self.state * &self.state) % &self.n;
            if self.state.is_odd() {
                out[(position / 8) as usize] |= 1 << (position % 8);
            }
        }
    }
}

impl std::fmt::Debug for BlumBlumShub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlumBlumShub")
            .field("n", &self.n)
            .field("bit_length", &self.bit_length)
            .finish_non_exhaustive()
    }
}

impl RngCore for BlumBlumShub {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
        let count = dest.len() as u64 * 8;
        self.squeeze(dest, count);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::RandBigInt;
    use num_traits::One;

    #[test]
    fn test_rand_respects_bit_length() {
        let mut bbs = BlumBlumShub::with_seed(16, 1).unwrap();
        assert_eq!(bbs.bit_length(), 16);
        for _ in 0..100 {
            assert!(bbs.rand().bits() <= 16);
        }
    }

    #[test]
    fn test_modulus_is_product_of_blum_primes() {
        let bbs = BlumBlumShub::with_seed(12, 2).unwrap();
        let n = bbs.modulus();
        // A product of two primes that are each 3 mod 4 is 1 mod 4.
        assert_eq!(n % 4u32, BigUint::one());
        assert!(n.bits() >= 23 && n.bits() <= 24);
    }

    #[test]
    fn test_state_advances_between_draws() {
        let mut bbs = BlumBlumShub::with_seed(64, 3).unwrap();
        let draws: Vec<BigUint> = (0..8).map(|_| bbs.rand()).collect();
        let distinct: std::collections::BTreeSet<_> = draws.iter().collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_seeded_generators_agree() {
        let mut a = BlumBlumShub::with_seed(32, 77).unwrap();
        let mut b = BlumBlumShub::with_seed(32, 77).unwrap();
        assert_eq!(a.rand(), b.rand());
        assert_eq!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn test_in_range_uses_full_modulus_width() {
        let mut bbs = BlumBlumShub::in_range(&BigUint::from(1000u32), &BigUint::from(10_000u32))
            .unwrap();
        assert_eq!(bbs.bit_length(), bbs.modulus().bits());
        assert!(bbs.rand() < (BigUint::one() << bbs.bit_length()));
    }

    #[test]
    fn test_rejects_tiny_parameters() {
        assert!(matches!(
            BlumBlumShub::with_seed(4, 0),
            Err(Error::InvalidParameter(_))
        ));
        // Only 23 is a Blum prime in [20, 24]; two distinct ones are needed.
        assert!(matches!(
            BlumBlumShub::in_range(&BigUint::from(20u32), &BigUint::from(24u32)),
            Err(Error::NoPrimeInRange { .. })
        ));
    }

    #[test]
    fn test_usable_as_rng_source() {
        let mut bbs = BlumBlumShub::with_seed(32, 9).unwrap();
        let bound = BigUint::from(8051u32);
        for _ in 0..20 {
            assert!(bbs.gen_biguint_below(&bound) < bound);
        }
    }
}
