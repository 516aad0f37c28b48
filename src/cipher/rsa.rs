//! DISCLAIMER: This module is a toy example of textbook RSA in pure Rust.
//! It is *EXCLUSIVELY* for demonstration and educational purposes.
//! There is no padding; a message is a single integer in `[1, n)`.
//! Absolutely DO NOT use it for real cryptographic or security-sensitive operations.
//!
//! Besides key generation and encryption, the module carries the matching
//! attack: Pollard's rho factors a weak modulus, after which the private
//! exponent follows from `phi(n)` exactly as in key generation.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::Rng;

use super::keystore::{read_integers, write_key_pair, KeyPaths};
use crate::error::{Error, Result};
use crate::math::bbs::{BlumBlumShub, MIN_BBS_BITS};
use crate::math::modular::{abs_diff, are_relatively_prime, gcd, mod_inverse, mod_pow};
use crate::math::primality::{generate_distinct_primes, miller_rabin_test, PrimeSource};
use crate::math::random::Bootstrap;
use crate::math::MILLER_RABIN_ROUNDS;

/// First public exponent tried during key generation.
pub const DEFAULT_PUBLIC_EXPONENT: u64 = 65537;

/// Largest prime bit length used to reseed a degenerate rho walk.
const RESEED_PRIME_BITS: u64 = 256;

/// Structure for an RSA public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RSAPublicKey {
    pub n: BigUint,
    pub e: BigUint,
}

/// Structure for an RSA private key.
/// Only the modulus and private exponent are kept; `p`, `q` and `phi(n)`
/// never leave key generation.
#[derive(Clone, PartialEq, Eq)]
pub struct RSAPrivateKey {
    pub n: BigUint,
    pub d: BigUint,
}

impl fmt::Debug for RSAPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RSAPrivateKey")
            .field("n", &self.n)
            .field("d", &"***")
            .finish()
    }
}

/// RSA KeyPair holds both public and private keys.
#[derive(Debug, Clone)]
pub struct RSAKeyPair {
    pub public_key: RSAPublicKey,
    pub private_key: RSAPrivateKey,
}

/// Configuration for the RSA engine (toy parameters).
#[derive(Debug, Clone)]
pub struct RSAConfig {
    /// Where the engine's own key pair lives.
    pub key_paths: KeyPaths,
    /// Public key of the victim for [`RSA::attack`].
    pub target_public_key_file: PathBuf,
    /// Prime search range used when fresh keys are generated.
    pub min_prime: BigUint,
    pub max_prime: BigUint,
    /// Optional RNG seed for reproducibility in toy examples.
    pub seed: Option<u64>,
}

impl Default for RSAConfig {
    fn default() -> Self {
        RSAConfig {
            key_paths: KeyPaths::new("rsa_key.pub", "rsa_key"),
            target_public_key_file: PathBuf::from("keys/target_rsa_key.pub"),
            min_prime: BigUint::from(1000u32),
            max_prime: BigUint::from(10_000u32),
            seed: None,
        }
    }
}

impl RSAConfig {
    /// Keys at `base.pub` and `base`.
    pub fn with_key_basename(mut self, base: impl AsRef<Path>) -> Self {
        self.key_paths = KeyPaths::from_basename(base);
        self
    }
}

impl RSAKeyPair {
    /// Generate an RSA key pair from two distinct primes in `[min, max]`.
    ///
    /// `e` starts at 65537 and walks up by 2 until it is coprime to `phi(n)`.
    ///
    /// # Panics
    /// If the derived exponents violate `e*d = 1 (mod phi(n))`; that can only
    /// be a bug in the inverse computation.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, min: &BigUint, max: &BigUint) -> Result<Self> {
        let source = PrimeSource::Range {
            min: min.clone(),
            max: max.clone(),
        };
        let primes = generate_distinct_primes(rng, &source, false, 2)?;
        let (p, q) = match primes.as_slice() {
            [p, q] => (p, q),
            _ => {
                return Err(Error::NoPrimeInRange {
                    min: min.clone(),
                    max: max.clone(),
                })
            }
        };

        let n = p * q;
        let phi = (p - 1u32) * (q - 1u32);

        let mut e = BigUint::from(DEFAULT_PUBLIC_EXPONENT);
        while !are_relatively_prime(&e, &phi) {
            e += 2u32;
        }

        let d = mod_inverse(&e, &phi)?;
        assert!(
            ((&e * &d) % &phi).is_one(),
            "RSA key generation produced e*d != 1 (mod phi(n))"
        );
        debug!("generated RSA modulus n = {} with e = {}", n, e);

        Ok(RSAKeyPair::from_parts(n, e, d))
    }

    pub fn from_parts(n: BigUint, e: BigUint, d: BigUint) -> Self {
        RSAKeyPair {
            public_key: RSAPublicKey { n: n.clone(), e },
            private_key: RSAPrivateKey { n, d },
        }
    }

    /// Checks that the two halves share a modulus and invert each other on
    /// a probe value.
    pub fn is_consistent(&self) -> bool {
        let n = &self.public_key.n;
        if n != &self.private_key.n || n <= &BigUint::from(2u32) {
            return false;
        }
        let probe = BigUint::from(2u32);
        let sealed = mod_pow(&probe, &self.public_key.e, n);
        mod_pow(&sealed, &self.private_key.d, n) == probe
    }
}

fn check_below_modulus(value: &BigUint, modulus: &BigUint) -> Result<()> {
    if value.is_zero() || value >= modulus {
        return Err(Error::MessageOutOfRange {
            value: value.clone(),
            modulus: modulus.clone(),
        });
    }
    Ok(())
}

/// RSA Encrypt using the public key:
/// ciphertext = (plaintext^e) mod n
///
/// The plaintext must lie in `[1, n)`.
pub fn rsa_encrypt(public_key: &RSAPublicKey, plaintext: &BigUint) -> Result<BigUint> {
    check_below_modulus(plaintext, &public_key.n)?;
    Ok(mod_pow(plaintext, &public_key.e, &public_key.n))
}

/// RSA Decrypt using the private key:
/// plaintext = (ciphertext^d) mod n
pub fn rsa_decrypt(private_key: &RSAPrivateKey, ciphertext: &BigUint) -> Result<BigUint> {
    check_below_modulus(ciphertext, &private_key.n)?;
    Ok(mod_pow(ciphertext, &private_key.d, &private_key.n))
}

/// Finds a nontrivial factor of `n` with Pollard's rho (Floyd cycle
/// detection, `f(x) = x^2 + 1 mod n`).
///
/// When a walk collapses (`gcd == n`) it restarts from two residues drawn
/// from a freshly built Blum-Blum-Shub generator. The result is never `1`
/// or `n`; primes and values below 4 are rejected up front because no walk
/// could ever succeed on them.
pub fn pollards_rho(n: &BigUint) -> Result<BigUint> {
    if n < &BigUint::from(4u32) {
        return Err(Error::NotComposite(n.clone()));
    }
    if n.is_even() {
        return Ok(BigUint::from(2u32));
    }
    if miller_rabin_test(n, MILLER_RABIN_ROUNDS, &mut Bootstrap::from_entropy()) {
        return Err(Error::NotComposite(n.clone()));
    }

    let step = |v: &BigUint| (v * v + 1u32) % n;

    let mut x = BigUint::from(2u32);
    let mut y = BigUint::from(2u32);
    let mut reseed: Option<BlumBlumShub> = None;
    let mut restarts = 0u32;

    loop {
        x = step(&x);
        y = step(&step(&y));
        let d = gcd(&abs_diff(&x, &y), n);

        if d == *n {
            restarts += 1;
            debug!("rho walk collapsed on {}, restart #{}", n, restarts);
            if reseed.is_none() {
                let bits = n.bits().clamp(MIN_BBS_BITS, RESEED_PRIME_BITS);
                reseed = Some(BlumBlumShub::new(bits)?);
            }
            if let Some(generator) = reseed.as_mut() {
                x = generator.next_bits(n.bits()) % n;
                y = generator.next_bits(n.bits()) % n;
            }
            continue;
        }

        if !d.is_one() {
            debug!("rho found factor {} of {}", d, n);
            return Ok(d);
        }
    }
}

/// Factors `n` and derives the private exponent that matches `e`.
pub fn recover_private_exponent(n: &BigUint, e: &BigUint) -> Result<BigUint> {
    let p = pollards_rho(n)?;
    let q = n / &p;
    let phi = (&p - 1u32) * (&q - 1u32);
    mod_inverse(e, &phi)
}

/// The RSA engine: one key pair, loaded from disk or freshly generated.
#[derive(Debug)]
pub struct RSA {
    keys: RSAKeyPair,
    target_public_key_file: PathBuf,
}

impl RSA {
    /// Loads the key pair named by `config`, generating and persisting a
    /// new one if either file is missing, malformed or inconsistent.
    pub fn open(config: &RSAConfig) -> Result<Self> {
        let paths = &config.key_paths;
        let keys = match Self::load_keys(paths) {
            Ok(keys) => {
                info!(
                    "Loaded existing RSA keys from {} and {}",
                    paths.public_key_file.display(),
                    paths.private_key_file.display()
                );
                keys
            }
            Err(reason) => {
                info!("No usable RSA keys ({}); generating new keys", reason);
                info!("Prime range: [{}, {}]", config.min_prime, config.max_prime);
                let mut rng = Bootstrap::from_optional_seed(config.seed);
                let keys = RSAKeyPair::generate(&mut rng, &config.min_prime, &config.max_prime)?;
                Self::save_keys(&keys, paths)?;
                info!(
                    "Keys generated and saved to {} and {}",
                    paths.public_key_file.display(),
                    paths.private_key_file.display()
                );
                keys
            }
        };

        Ok(RSA {
            keys,
            target_public_key_file: config.target_public_key_file.clone(),
        })
    }

    /// An engine around existing keys, without touching the filesystem.
    pub fn from_key_pair(keys: RSAKeyPair) -> Self {
        RSA {
            keys,
            target_public_key_file: RSAConfig::default().target_public_key_file,
        }
    }

    /// Reads `{n, e}` and `{n, d}` and checks that they belong together.
    pub fn load_keys(paths: &KeyPaths) -> Result<RSAKeyPair> {
        let public = read_integers(&paths.public_key_file, 2)?;
        let private = read_integers(&paths.private_key_file, 2)?;
        let (n, e) = (public[0].clone(), public[1].clone());
        let (private_n, d) = (private[0].clone(), private[1].clone());

        let keys = RSAKeyPair {
            public_key: RSAPublicKey { n, e },
            private_key: RSAPrivateKey { n: private_n, d },
        };
        if !keys.is_consistent() {
            warn!(
                "{} and {} do not form a key pair",
                paths.public_key_file.display(),
                paths.private_key_file.display()
            );
            return Err(Error::malformed(
                &paths.private_key_file,
                "private key does not match the public key",
            ));
        }
        Ok(keys)
    }

    pub fn save_keys(keys: &RSAKeyPair, paths: &KeyPaths) -> Result<()> {
        write_key_pair(
            &paths.public_key_file,
            &[keys.public_key.n.clone(), keys.public_key.e.clone()],
            &paths.private_key_file,
            &[keys.private_key.n.clone(), keys.private_key.d.clone()],
        )
    }

    pub fn public_key(&self) -> &RSAPublicKey {
        &self.keys.public_key
    }

    pub fn target_public_key_file(&self) -> &Path {
        &self.target_public_key_file
    }

    pub fn encrypt(&self, plaintext: &BigUint) -> Result<BigUint> {
        rsa_encrypt(&self.keys.public_key, plaintext)
    }

    pub fn decrypt(&self, ciphertext: &BigUint) -> Result<BigUint> {
        rsa_decrypt(&self.keys.private_key, ciphertext)
    }

    /// Decrypts the ciphertext in `ciphertext_file`, which was produced for
    /// the victim whose `{n, e}` is in `target_public_key_file`.
    pub fn attack(&self, ciphertext_file: &Path, target_public_key_file: &Path) -> Result<BigUint> {
        info!("Step 1: reading target public key {}", target_public_key_file.display());
        let key = read_integers(target_public_key_file, 2)?;

        info!("Step 2: reading ciphertext {}", ciphertext_file.display());
        let ciphertext = read_integers(ciphertext_file, 1)?;

        Self::attack_components(&ciphertext[0], &key[0], &key[1])
    }

    /// Attack on in-memory values: factor `n`, rebuild `d`, decrypt.
    pub fn attack_components(ciphertext: &BigUint, n: &BigUint, e: &BigUint) -> Result<BigUint> {
        info!("Factoring n = {} with Pollard's rho", n);
        let d = recover_private_exponent(n, e)?;
        info!("Recovered private exponent d = {}", d);

        let plaintext = rsa_decrypt(&RSAPrivateKey { n: n.clone(), d }, ciphertext)?;
        info!("Decrypted message: {}", plaintext);
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    fn small_keys(seed: u64) -> RSAKeyPair {
        let mut rng = Bootstrap::seed_from_u64(seed);
        RSAKeyPair::generate(&mut rng, &big(1000), &big(10_000)).unwrap()
    }

    #[test]
    fn test_toy_rsa() {
        let keypair = small_keys(42);
        let msg = big(42);
        assert!(msg < keypair.public_key.n, "Message must be smaller than modulus");

        let enc = rsa_encrypt(&keypair.public_key, &msg).unwrap();
        let dec = rsa_decrypt(&keypair.private_key, &enc).unwrap();
        assert_eq!(dec, msg, "RSA encryption/decryption mismatch");
    }

    #[test]
    fn test_round_trip_across_message_space() {
        let keypair = small_keys(7);
        let n = keypair.public_key.n.clone();
        let mut rng = Bootstrap::seed_from_u64(8);
        for _ in 0..200 {
            let m = rng.random_in_range(&big(1), &(&n - 1u32)).unwrap();
            let c = rsa_encrypt(&keypair.public_key, &m).unwrap();
            assert_eq!(rsa_decrypt(&keypair.private_key, &c).unwrap(), m);
        }
        let last = &n - 1u32;
        let c = rsa_encrypt(&keypair.public_key, &last).unwrap();
        assert_eq!(rsa_decrypt(&keypair.private_key, &c).unwrap(), last);
    }

    #[test]
    fn test_generated_keys_satisfy_invariants() {
        let keypair = small_keys(9);
        assert!(keypair.is_consistent());
        assert_eq!(keypair.public_key.n, keypair.private_key.n);
        assert!(keypair.public_key.e >= big(DEFAULT_PUBLIC_EXPONENT));
        assert!(keypair.public_key.e.is_odd());
    }

    #[test]
    fn test_message_range_is_enforced() {
        let keypair = small_keys(10);
        let n = keypair.public_key.n.clone();
        assert!(matches!(
            rsa_encrypt(&keypair.public_key, &BigUint::zero()),
            Err(Error::MessageOutOfRange { .. })
        ));
        assert!(matches!(
            rsa_encrypt(&keypair.public_key, &n),
            Err(Error::MessageOutOfRange { .. })
        ));
        assert!(matches!(
            rsa_decrypt(&keypair.private_key, &(&n + 5u32)),
            Err(Error::MessageOutOfRange { .. })
        ));
    }

    #[test]
    fn test_pollards_rho_classic_example() {
        let factor = pollards_rho(&big(8051)).unwrap();
        assert!(factor == big(83) || factor == big(97), "got {}", factor);
    }

    #[test]
    fn test_pollards_rho_never_returns_trivial_factor() {
        for n in [15u64, 21, 35, 91, 143, 10403, 455459, 999_985_999_949] {
            let n = big(n);
            let d = pollards_rho(&n).unwrap();
            assert!(!d.is_one() && d != n, "trivial factor {} of {}", d, n);
            assert!((&n % &d).is_zero());
        }
        assert_eq!(pollards_rho(&big(1024)).unwrap(), big(2));
    }

    #[test]
    fn test_pollards_rho_rejects_primes_and_units() {
        for n in [0u64, 1, 2, 3, 7919] {
            assert!(matches!(pollards_rho(&big(n)), Err(Error::NotComposite(_))));
        }
    }

    #[test]
    fn test_recover_private_exponent_matches_generated_key() {
        let keypair = small_keys(11);
        let d = recover_private_exponent(&keypair.public_key.n, &keypair.public_key.e).unwrap();
        let m = big(1234);
        let c = rsa_encrypt(&keypair.public_key, &m).unwrap();
        assert_eq!(mod_pow(&c, &d, &keypair.public_key.n), m);
    }

    #[test]
    fn test_attack_components_decrypts() {
        let keypair = small_keys(12);
        let m = big(67_420);
        let c = rsa_encrypt(&keypair.public_key, &m).unwrap();
        let recovered =
            RSA::attack_components(&c, &keypair.public_key.n, &keypair.public_key.e).unwrap();
        assert_eq!(recovered, m);
    }

    #[test]
    fn test_inconsistent_pair_detected() {
        let a = small_keys(13);
        let b = small_keys(14);
        let torn = RSAKeyPair {
            public_key: a.public_key.clone(),
            private_key: b.private_key.clone(),
        };
        assert!(!torn.is_consistent());
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let keypair = small_keys(15);
        let shown = format!("{:?}", keypair.private_key);
        assert!(!shown.contains(&keypair.private_key.d.to_string()));
    }
}
