//! # Primality Testing and Prime Generation
//!
//! Miller-Rabin probable-prime testing plus the candidate searches used for
//! key generation: by bit length or inside an inclusive numeric range,
//! optionally restricted to primes congruent to 3 mod 4 (Blum primes).
//!
//! A search draws uniform candidates until one passes
//! [`MILLER_RABIN_ROUNDS`] rounds. Random search has no retry cap, so a
//! narrow range is first swept once to prove that enough qualifying primes
//! exist; otherwise the search would spin forever on a prime-free range.

use log::debug;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand::Rng;

use super::modular::mod_pow;
use super::random::{random_candidate, random_in_range, sample_below, Bootstrap};
use crate::error::{Error, Result};

/// Witness rounds used for every generated prime. Error bound is `4^-20`.
pub const MILLER_RABIN_ROUNDS: usize = 20;

/// Ranges at most this wide are swept before random sampling starts.
const SCAN_LIMIT: u64 = 1 << 20;

/// Miller-Rabin probable-prime test with `rounds` random bases.
///
/// Writes `n - 1 = 2^r * m` with `m` odd and returns `false` on the first
/// base that witnesses compositeness.
pub fn miller_rabin_test<R: Rng + ?Sized>(n: &BigUint, rounds: usize, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    let three = BigUint::from(3u32);

    if n < &two {
        return false;
    }
    if n <= &three {
        return true;
    }
    if n.is_even() {
        return false;
    }

    let n_minus_1 = n - BigUint::one();
    let (r, m) = factor_powers_of_two(&n_minus_1);
    // Bases are drawn from [2, n-2], a span of n-3 values.
    let base_span = n - &three;

    'witness: for _ in 0..rounds {
        let b = &two + sample_below(rng, &base_span);
        let mut x = mod_pow(&b, &m, n);

        if x.is_one() || x == n_minus_1 {
            continue;
        }

        for _ in 1..r {
            x = mod_pow(&x, &two, n);
            if x == n_minus_1 {
                continue 'witness;
            }
        }

        return false;
    }

    true
}

/// Splits `n` into `(r, m)` with `n = 2^r * m` and `m` odd. `n` must be nonzero.
pub fn factor_powers_of_two(n: &BigUint) -> (u64, BigUint) {
    let r = n.trailing_zeros().unwrap_or(0);
    (r, n >> r)
}

/// Deterministic trial division, `6k +- 1` wheel.
pub fn is_prime(n: &BigUint) -> bool {
    let n = match n.to_u64() {
        Some(small) => small,
        None => return is_prime_big(n),
    };

    if n <= 1 {
        return false;
    }
    if n <= 3 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }

    let mut i = 5u64;
    while i.saturating_mul(i) <= n {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

fn is_prime_big(n: &BigUint) -> bool {
    if n.is_even() || (n % 3u32).is_zero() {
        return false;
    }
    let mut i = BigUint::from(5u32);
    while &(&i * &i) <= n {
        if (n % &i).is_zero() || (n % (&i + 2u32)).is_zero() {
            return false;
        }
        i += 6u32;
    }
    true
}

/// Where the next prime candidate comes from.
#[derive(Debug, Clone)]
pub enum PrimeSource {
    /// Odd values with exactly this many bits.
    Bits(u64),
    /// Odd values in the inclusive range.
    Range { min: BigUint, max: BigUint },
}

/// Nudges an odd candidate into the `3 mod 4` class by adding 2.
fn nudge_congruent_3_mod_4(candidate: &mut BigUint) {
    if (&*candidate % 4u32) != BigUint::from(3u32) {
        *candidate += 2u32;
    }
}

fn qualifies<R: Rng + ?Sized>(candidate: &BigUint, congruent_3_mod_4: bool, rng: &mut R) -> bool {
    if congruent_3_mod_4 && (candidate % 4u32) != BigUint::from(3u32) {
        return false;
    }
    miller_rabin_test(candidate, MILLER_RABIN_ROUNDS, rng)
}

/// Sweeps a narrow range for at least `needed` qualifying primes.
fn ensure_range_has_primes<R: Rng + ?Sized>(
    rng: &mut R,
    min: &BigUint,
    max: &BigUint,
    congruent_3_mod_4: bool,
    needed: usize,
) -> Result<()> {
    if min > max {
        return Err(Error::InvalidRange {
            min: min.clone(),
            max: max.clone(),
        });
    }

    let width = max - min;
    if width > BigUint::from(SCAN_LIMIT) {
        return Ok(());
    }

    // Candidates are always odd: 2 is unreachable, exactly as in sampling.
    let mut candidate = if min.is_odd() {
        min.clone()
    } else {
        min + 1u32
    };
    let mut found = 0usize;

    while &candidate <= max {
        if qualifies(&candidate, congruent_3_mod_4, rng) {
            found += 1;
            if found >= needed {
                return Ok(());
            }
        }
        candidate += 2u32;
    }

    Err(Error::NoPrimeInRange {
        min: min.clone(),
        max: max.clone(),
    })
}

/// Draws one candidate from `source`, nudged to be odd and optionally 3 mod 4.
/// Returns `None` if the nudge pushed a range candidate past its maximum.
fn draw_candidate<R: Rng + ?Sized>(
    rng: &mut R,
    source: &PrimeSource,
    congruent_3_mod_4: bool,
) -> Result<Option<BigUint>> {
    let mut candidate = match source {
        PrimeSource::Bits(bits) => random_candidate(rng, *bits)?,
        PrimeSource::Range { min, max } => {
            let mut value = random_in_range(rng, min, max)?;
            if value.is_even() {
                value += 1u32;
            }
            value
        }
    };

    if congruent_3_mod_4 {
        nudge_congruent_3_mod_4(&mut candidate);
    }

    match source {
        PrimeSource::Range { max, .. } if &candidate > max => Ok(None),
        // An all-ones value is already 3 mod 4, so the nudge never adds a bit.
        _ => Ok(Some(candidate)),
    }
}

/// Searches `source` for `count` distinct probable primes.
///
/// Bit-length searches need at least 2 bits; asking for two distinct primes
/// needs 3 bits, or 5 for the `3 mod 4` class. Narrow ranges are checked to
/// hold `count` qualifying primes before sampling begins.
pub fn generate_distinct_primes<R: Rng + ?Sized>(
    rng: &mut R,
    source: &PrimeSource,
    congruent_3_mod_4: bool,
    count: usize,
) -> Result<Vec<BigUint>> {
    match source {
        PrimeSource::Range { min, max } => {
            ensure_range_has_primes(rng, min, max, congruent_3_mod_4, count)?
        }
        PrimeSource::Bits(bits) => {
            let minimum = match (count > 1, congruent_3_mod_4) {
                (false, _) => 2,
                (true, false) => 3,
                (true, true) => 5,
            };
            if *bits < minimum {
                return Err(Error::InvalidParameter(format!(
                    "{} bits cannot hold {} distinct primes of the requested class",
                    bits, count
                )));
            }
        }
    }

    let mut primes: Vec<BigUint> = Vec::with_capacity(count);
    let mut draws = 0u64;

    while primes.len() < count {
        draws += 1;
        let Some(candidate) = draw_candidate(rng, source, congruent_3_mod_4)? else {
            continue;
        };
        if primes.contains(&candidate) {
            continue;
        }
        if miller_rabin_test(&candidate, MILLER_RABIN_ROUNDS, rng) {
            debug!("accepted prime {} after {} draws", candidate, draws);
            primes.push(candidate);
        }
    }

    Ok(primes)
}

impl Bootstrap {
    fn generate_one(&mut self, source: PrimeSource, congruent_3_mod_4: bool) -> Result<BigUint> {
        let mut primes = generate_distinct_primes(self, &source, congruent_3_mod_4, 1)?;
        primes.pop().ok_or_else(|| match source {
            PrimeSource::Range { min, max } => Error::NoPrimeInRange { min, max },
            PrimeSource::Bits(bits) => {
                Error::InvalidParameter(format!("no prime generated for {} bits", bits))
            }
        })
    }

    /// Random probable prime of exactly `bit_length` bits.
    pub fn generate_prime(&mut self, bit_length: u64) -> Result<BigUint> {
        self.generate_one(PrimeSource::Bits(bit_length), false)
    }

    /// Random probable prime of exactly `bit_length` bits with `p = 3 (mod 4)`.
    pub fn generate_prime_congruent_3_mod_4(&mut self, bit_length: u64) -> Result<BigUint> {
        self.generate_one(PrimeSource::Bits(bit_length), true)
    }

    /// Random probable prime in `[min, max]`.
    pub fn generate_prime_in_range(&mut self, min: &BigUint, max: &BigUint) -> Result<BigUint> {
        self.generate_one(
            PrimeSource::Range {
                min: min.clone(),
                max: max.clone(),
            },
            false,
        )
    }

    /// Random probable prime in `[min, max]` with `p = 3 (mod 4)`.
    pub fn generate_prime_in_range_congruent_3_mod_4(
        &mut self,
        min: &BigUint,
        max: &BigUint,
    ) -> Result<BigUint> {
        self.generate_one(
            PrimeSource::Range {
                min: min.clone(),
                max: max.clone(),
            },
            true,
        )
    }

    /// Two distinct probable primes from the same source.
    pub fn generate_prime_pair(
        &mut self,
        source: &PrimeSource,
        congruent_3_mod_4: bool,
    ) -> Result<(BigUint, BigUint)> {
        let mut primes = generate_distinct_primes(self, source, congruent_3_mod_4, 2)?.into_iter();
        match (primes.next(), primes.next()) {
            (Some(p), Some(q)) => Ok((p, q)),
            _ => Err(Error::InvalidParameter(
                "prime pair generation returned too few primes".to_string(),
            )),
        }
    }
}
