//! DISCLAIMER: This module is a toy example of ElGamal Encryption in pure Rust.
//! It is *EXCLUSIVELY* for demonstration and educational purposes.
//! Absolutely DO NOT use it for real cryptographic or security-sensitive operations.
//!
//! The prime `p` comes from a small range, the generator is the smallest
//! primitive root modulo `p`, and the companion attack recovers the private
//! exponent with baby-step giant-step.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use log::{debug, info, warn};
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, ToPrimitive, Zero};
use rand::Rng;

use super::keystore::{read_integers, write_key_pair, KeyPaths};
use crate::error::{Error, Result};
use crate::math::modular::{mod_inverse, mod_pow};
use crate::math::primality::{generate_distinct_primes, PrimeSource};
use crate::math::random::{random_in_range, Bootstrap};

/// Default ceiling on the baby-step table, in entries.
pub const DEFAULT_MAX_TABLE_SIZE: u64 = 1 << 24;

/// A structure holding the ElGamal public key:
/// - `p`, the prime modulus,
/// - `g`, a generator of the multiplicative group modulo `p`,
/// - `y = g^x mod p`, where `x` is the secret exponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElGamalPublicKey {
    pub p: BigUint,
    pub g: BigUint,
    pub y: BigUint,
}

/// The secret exponent `x` in `[2, p-2]`.
#[derive(Clone, PartialEq, Eq)]
pub struct ElGamalPrivateKey {
    pub x: BigUint,
}

impl fmt::Debug for ElGamalPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElGamalPrivateKey").field("x", &"***").finish()
    }
}

/// Combined keypair, storing both public and private halves together.
#[derive(Debug, Clone)]
pub struct ElGamalKeyPair {
    pub public: ElGamalPublicKey,
    pub private: ElGamalPrivateKey,
}

/// A ciphertext in ElGamal encryption consists of two values, (c1, c2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElGamalCiphertext {
    pub c1: BigUint,
    pub c2: BigUint,
}

impl fmt::Display for ElGamalCiphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.c1, self.c2)
    }
}

/// Configuration for the ElGamal engine (toy parameters).
#[derive(Debug, Clone)]
pub struct ElGamalConfig {
    pub key_paths: KeyPaths,
    /// Range for the prime modulus `p` when fresh keys are generated.
    pub min_prime: BigUint,
    pub max_prime: BigUint,
    /// Upper bound on baby-step giant-step memory, in table entries.
    pub max_table_size: u64,
    /// Optional RNG seed that makes key generation reproducible. Ephemeral
    /// encryption keys never come from it.
    pub seed: Option<u64>,
}

impl Default for ElGamalConfig {
    fn default() -> Self {
        ElGamalConfig {
            key_paths: KeyPaths::new("elgamal_key.pub", "elgamal_key"),
            min_prime: BigUint::from(1000u32),
            max_prime: BigUint::from(10_000u32),
            max_table_size: DEFAULT_MAX_TABLE_SIZE,
            seed: None,
        }
    }
}

impl ElGamalConfig {
    /// Keys at `base.pub` and `base`.
    pub fn with_key_basename(mut self, base: impl AsRef<Path>) -> Self {
        self.key_paths = KeyPaths::from_basename(base);
        self
    }
}

/// The distinct prime factors of `n`, by trial division.
pub fn distinct_prime_factors(n: &BigUint) -> BTreeSet<BigUint> {
    let mut factors = BTreeSet::new();
    let mut rest = n.clone();
    if rest.is_zero() {
        return factors;
    }

    let two = BigUint::from(2u32);
    if rest.is_even() {
        factors.insert(two.clone());
        while rest.is_even() {
            rest >>= 1;
        }
    }

    let mut divisor = BigUint::from(3u32);
    while &divisor * &divisor <= rest {
        if (&rest % &divisor).is_zero() {
            factors.insert(divisor.clone());
            while (&rest % &divisor).is_zero() {
                rest /= &divisor;
            }
        }
        divisor += &two;
    }

    if rest > BigUint::one() {
        factors.insert(rest);
    }
    factors
}

/// `b` generates the multiplicative group modulo the prime `p` iff
/// `b^((p-1)/q) != 1` for every prime `q` dividing `p - 1`.
pub fn is_primitive_root(b: &BigUint, p: &BigUint, factors: &BTreeSet<BigUint>) -> bool {
    if b.is_zero() || b >= p {
        return false;
    }
    let order = p - 1u32;
    factors
        .iter()
        .all(|q| !mod_pow(b, &(&order / q), p).is_one())
}

/// The smallest generator of the multiplicative group modulo the prime `p`.
pub fn find_generator(p: &BigUint) -> Result<BigUint> {
    if p < &BigUint::from(3u32) {
        return Err(Error::NoGenerator { p: p.clone() });
    }

    let factors = distinct_prime_factors(&(p - 1u32));
    debug!("p - 1 = {} has prime factors {:?}", p - 1u32, factors);

    let mut candidate = BigUint::from(2u32);
    while &candidate < p {
        if is_primitive_root(&candidate, p, &factors) {
            return Ok(candidate);
        }
        candidate += 1u32;
    }
    Err(Error::NoGenerator { p: p.clone() })
}

/// Solves `a^x = target (mod p)` for `x` in `[0, p-1)`.
///
/// Baby steps store `a^(m*j) -> j` for `j < m`, `m = ceil(sqrt(p))`; giant
/// steps walk `gamma = target * a^(-i)`. A hit means `target = a^(m*j + i)`.
/// The table is refused, not truncated, once `m` passes `max_table_size`.
pub fn baby_step_giant_step(
    a: &BigUint,
    target: &BigUint,
    p: &BigUint,
    max_table_size: u64,
) -> Result<BigUint> {
    if p < &BigUint::from(2u32) {
        return Err(Error::InvalidParameter(format!(
            "discrete log modulus must be at least 2, got {}",
            p
        )));
    }

    let mut m = p.sqrt();
    if &m * &m < *p {
        m += 1u32;
    }
    let steps = match m.to_u64() {
        Some(steps) if steps <= max_table_size => steps,
        _ => {
            return Err(Error::DiscreteLogInfeasible {
                table_size: m,
                limit: max_table_size,
            })
        }
    };

    let a = a % p;
    let target = target % p;
    let not_found = || Error::DiscreteLogNotFound {
        base: a.clone(),
        target: target.clone(),
        modulus: p.clone(),
    };

    let a_inv = mod_inverse(&a, p).map_err(|_| not_found())?;
    let a_m = mod_pow(&a, &m, p);

    let mut table: HashMap<BigUint, u64> = HashMap::with_capacity(steps as usize);
    let mut value = BigUint::one() % p;
    for j in 0..steps {
        table.entry(value.clone()).or_insert(j);
        value = (&value * &a_m) % p;
    }
    debug!("baby-step table holds {} entries for m = {}", table.len(), m);

    let order = p - 1u32;
    let verify = |x: BigUint| -> Option<BigUint> {
        if !order.is_zero() {
            let reduced = &x % &order;
            if mod_pow(&a, &reduced, p) == target {
                return Some(reduced);
            }
        }
        (mod_pow(&a, &x, p) == target).then_some(x)
    };

    let mut gamma = target.clone();
    for i in 0..steps {
        if let Some(&j) = table.get(&gamma) {
            let mj = &m * j;
            let i = BigUint::from(i);
            if let Some(x) = verify(&mj + &i) {
                return Ok(x);
            }
            if mj >= i {
                if let Some(x) = verify(&mj - &i) {
                    return Ok(x);
                }
            }
        }
        gamma = (&gamma * &a_inv) % p;
    }

    Err(not_found())
}

impl ElGamalKeyPair {
    /// Picks a prime `p` in `[min, max]`, its smallest generator `g`, and a
    /// private exponent `x` in `[2, p-2]`. Only primes `p >= 5` leave room
    /// for `x`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, min: &BigUint, max: &BigUint) -> Result<Self> {
        let source = PrimeSource::Range {
            min: min.clone(),
            max: max.clone(),
        };
        let p = generate_distinct_primes(rng, &source, false, 1)?
            .pop()
            .ok_or_else(|| Error::NoPrimeInRange {
                min: min.clone(),
                max: max.clone(),
            })?;
        if p < BigUint::from(5u32) {
            return Err(Error::NoPrimeInRange {
                min: min.clone(),
                max: max.clone(),
            });
        }
        let g = find_generator(&p)?;
        let x = random_in_range(rng, &BigUint::from(2u32), &(&p - 2u32))?;
        let y = mod_pow(&g, &x, &p);
        debug!("generated ElGamal group p = {}, g = {}", p, g);

        Ok(ElGamalKeyPair {
            public: ElGamalPublicKey { p, g, y },
            private: ElGamalPrivateKey { x },
        })
    }

    /// `y == g^x (mod p)` with a sane group.
    pub fn is_consistent(&self) -> bool {
        let ElGamalPublicKey { p, g, y } = &self.public;
        p > &BigUint::from(3u32)
            && g > &BigUint::one()
            && g < p
            && mod_pow(g, &self.private.x, p) == *y
    }
}

/// Encrypt a message `m` for the holder of `recipient_y` in the group `(p, g)`
/// of `params`, with ephemeral `k` drawn from `[2, p-2]`.
///
/// c1 = g^k mod p
/// c2 = m * recipient_y^k mod p
pub fn elgamal_encrypt<R: Rng + ?Sized>(
    params: &ElGamalPublicKey,
    recipient_y: &BigUint,
    message: &BigUint,
    rng: &mut R,
) -> Result<ElGamalCiphertext> {
    let p = &params.p;
    if message.is_zero() || message >= p {
        return Err(Error::MessageOutOfRange {
            value: message.clone(),
            modulus: p.clone(),
        });
    }
    if (recipient_y % p).is_zero() {
        return Err(Error::InvalidParameter(format!(
            "recipient public key {} is 0 modulo {}",
            recipient_y, p
        )));
    }

    let k = random_in_range(rng, &BigUint::from(2u32), &(p - 2u32))?;
    let c1 = mod_pow(&params.g, &k, p);
    let c2 = (message * mod_pow(recipient_y, &k, p)) % p;
    Ok(ElGamalCiphertext { c1, c2 })
}

/// Decrypt an ElGamal ciphertext (c1, c2) using the private exponent x:
/// message = c2 * (c1^x)^(-1) mod p.
pub fn elgamal_decrypt(
    p: &BigUint,
    private_key: &ElGamalPrivateKey,
    ciphertext: &ElGamalCiphertext,
) -> Result<BigUint> {
    for value in [&ciphertext.c1, &ciphertext.c2] {
        if value >= p {
            return Err(Error::MessageOutOfRange {
                value: value.clone(),
                modulus: p.clone(),
            });
        }
    }
    let shared = mod_pow(&ciphertext.c1, &private_key.x, p);
    let shared_inv = mod_inverse(&shared, p)?;
    Ok((&ciphertext.c2 * shared_inv) % p)
}

/// The ElGamal engine: one key pair plus the randomness for ephemeral keys.
#[derive(Debug)]
pub struct ElGamal {
    keys: ElGamalKeyPair,
    rng: Bootstrap,
    max_table_size: u64,
}

impl ElGamal {
    /// Loads the key pair named by `config`, generating and persisting a
    /// new one if either file is missing, malformed or inconsistent.
    pub fn open(config: &ElGamalConfig) -> Result<Self> {
        let paths = &config.key_paths;
        let keys = match Self::load_keys(paths) {
            Ok(keys) => {
                info!(
                    "Loaded existing ElGamal keys from {} and {}",
                    paths.public_key_file.display(),
                    paths.private_key_file.display()
                );
                keys
            }
            Err(reason) => {
                info!("No usable ElGamal keys ({}); generating new keys", reason);
                info!("Prime range: [{}, {}]", config.min_prime, config.max_prime);
                // The seed only fixes key generation; ephemeral keys always use entropy.
                let mut keygen_rng = Bootstrap::from_optional_seed(config.seed);
                let keys =
                    ElGamalKeyPair::generate(&mut keygen_rng, &config.min_prime, &config.max_prime)?;
                Self::save_keys(&keys, paths)?;
                info!(
                    "Keys generated and saved to {} and {}",
                    paths.public_key_file.display(),
                    paths.private_key_file.display()
                );
                keys
            }
        };

        Ok(ElGamal {
            keys,
            rng: Bootstrap::from_entropy(),
            max_table_size: config.max_table_size,
        })
    }

    /// An engine around existing keys, without touching the filesystem.
    pub fn from_key_pair(keys: ElGamalKeyPair, rng: Bootstrap) -> Self {
        ElGamal {
            keys,
            rng,
            max_table_size: DEFAULT_MAX_TABLE_SIZE,
        }
    }

    /// Reads `{p, g, y}` and `{x}` and checks that they belong together.
    pub fn load_keys(paths: &KeyPaths) -> Result<ElGamalKeyPair> {
        let public = read_integers(&paths.public_key_file, 3)?;
        let private = read_integers(&paths.private_key_file, 1)?;

        let keys = ElGamalKeyPair {
            public: ElGamalPublicKey {
                p: public[0].clone(),
                g: public[1].clone(),
                y: public[2].clone(),
            },
            private: ElGamalPrivateKey {
                x: private[0].clone(),
            },
        };
        if !keys.is_consistent() {
            warn!(
                "{} and {} do not form a key pair",
                paths.public_key_file.display(),
                paths.private_key_file.display()
            );
            return Err(Error::malformed(
                &paths.private_key_file,
                "private exponent does not match the public key",
            ));
        }
        Ok(keys)
    }

    pub fn save_keys(keys: &ElGamalKeyPair, paths: &KeyPaths) -> Result<()> {
        let ElGamalPublicKey { p, g, y } = &keys.public;
        write_key_pair(
            &paths.public_key_file,
            &[p.clone(), g.clone(), y.clone()],
            &paths.private_key_file,
            &[keys.private.x.clone()],
        )
    }

    pub fn public_key(&self) -> &ElGamalPublicKey {
        &self.keys.public
    }

    /// Encrypts under this engine's `(p, g)` for the owner of `recipient_y`.
    pub fn encrypt(&mut self, message: &BigUint, recipient_y: &BigUint) -> Result<ElGamalCiphertext> {
        elgamal_encrypt(&self.keys.public, recipient_y, message, &mut self.rng)
    }

    pub fn decrypt(&self, ciphertext: &ElGamalCiphertext) -> Result<BigUint> {
        elgamal_decrypt(&self.keys.public.p, &self.keys.private, ciphertext)
    }

    /// Reads `(c1, c2)` from `ciphertext_file` and breaks it without using
    /// the stored private key.
    pub fn attack(&self, ciphertext_file: &Path) -> Result<BigUint> {
        let values = read_integers(ciphertext_file, 2)?;
        let ciphertext = ElGamalCiphertext {
            c1: values[0].clone(),
            c2: values[1].clone(),
        };
        self.attack_values(&ciphertext)
    }

    /// Recovers `x` from the public key by discrete log, then decrypts.
    pub fn attack_values(&self, ciphertext: &ElGamalCiphertext) -> Result<BigUint> {
        let ElGamalPublicKey { p, g, y } = &self.keys.public;
        info!("Solving {}^x = {} (mod {}) with baby-step giant-step", g, y, p);

        let x = baby_step_giant_step(g, y, p, self.max_table_size)?;
        info!("Recovered private exponent x = {}", x);

        let recovered = ElGamalPrivateKey { x };
        let plaintext = elgamal_decrypt(p, &recovered, ciphertext)?;
        info!("Decrypted message: {}", plaintext);
        Ok(plaintext)
    }
}
