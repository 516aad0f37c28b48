//! Toy public-key engines and the dispatch shared by the command line.

pub mod elgamal;
pub mod keystore;
pub mod rsa;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;
use num_bigint::BigUint;

use crate::error::{Error, Result};
use elgamal::{ElGamal, ElGamalCiphertext, ElGamalConfig};
use keystore::read_integers;
use rsa::{RSAConfig, RSA};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Rsa,
    ElGamal,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(Algorithm::Rsa),
            "elgamal" => Ok(Algorithm::ElGamal),
            other => Err(format!("unknown algorithm {:?} (expected rsa or elgamal)", other)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Rsa => write!(f, "rsa"),
            Algorithm::ElGamal => write!(f, "elgamal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
    Attack,
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "encrypt" => Ok(Operation::Encrypt),
            "decrypt" => Ok(Operation::Decrypt),
            "attack" => Ok(Operation::Attack),
            other => Err(format!(
                "unknown operation {:?} (expected encrypt, decrypt or attack)",
                other
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Encrypt => write!(f, "encrypt"),
            Operation::Decrypt => write!(f, "decrypt"),
            Operation::Attack => write!(f, "attack"),
        }
    }
}

/// Result of one operation, printed in the same one-integer-per-line format
/// as the input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherOutput {
    Integer(BigUint),
    Pair(ElGamalCiphertext),
}

impl fmt::Display for CipherOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherOutput::Integer(value) => write!(f, "{}", value),
            CipherOutput::Pair(ciphertext) => write!(f, "{}", ciphertext),
        }
    }
}

/// An engine that can run any [`Operation`] on a record file.
pub trait Cipher {
    fn algorithm(&self) -> Algorithm;

    /// `recipient` is the public value to encrypt for, where the algorithm
    /// uses one.
    fn run(
        &mut self,
        operation: Operation,
        input_file: &Path,
        recipient: Option<&BigUint>,
    ) -> Result<CipherOutput>;
}

impl Cipher for RSA {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Rsa
    }

    fn run(
        &mut self,
        operation: Operation,
        input_file: &Path,
        recipient: Option<&BigUint>,
    ) -> Result<CipherOutput> {
        let value = match operation {
            Operation::Encrypt => {
                if let Some(recipient) = recipient {
                    debug!("RSA encrypts under its own (n, e); ignoring recipient {}", recipient);
                }
                self.encrypt(&read_integers(input_file, 1)?[0])?
            }
            Operation::Decrypt => self.decrypt(&read_integers(input_file, 1)?[0])?,
            Operation::Attack => {
                let target = self.target_public_key_file().to_path_buf();
                self.attack(input_file, &target)?
            }
        };
        Ok(CipherOutput::Integer(value))
    }
}

impl Cipher for ElGamal {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ElGamal
    }

    fn run(
        &mut self,
        operation: Operation,
        input_file: &Path,
        recipient: Option<&BigUint>,
    ) -> Result<CipherOutput> {
        match operation {
            Operation::Encrypt => {
                let recipient = recipient.ok_or_else(|| {
                    Error::InvalidParameter(
                        "ElGamal encryption needs the recipient's public key".to_string(),
                    )
                })?;
                let message = &read_integers(input_file, 1)?[0];
                Ok(CipherOutput::Pair(self.encrypt(message, recipient)?))
            }
            Operation::Decrypt => {
                let values = read_integers(input_file, 2)?;
                let ciphertext = ElGamalCiphertext {
                    c1: values[0].clone(),
                    c2: values[1].clone(),
                };
                Ok(CipherOutput::Integer(self.decrypt(&ciphertext)?))
            }
            Operation::Attack => Ok(CipherOutput::Integer(self.attack(input_file)?)),
        }
    }
}

/// Overrides applied on top of the default engine configuration.
#[derive(Debug, Clone, Default)]
pub struct CipherSettings {
    /// Key files become `base.pub` and `base`.
    pub key_basename: Option<PathBuf>,
    /// Victim key for the RSA attack.
    pub target_public_key_file: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// Opens (loading or generating keys) the engine for `algorithm`.
pub fn open_cipher(algorithm: Algorithm, settings: &CipherSettings) -> Result<Box<dyn Cipher>> {
    match algorithm {
        Algorithm::Rsa => {
            let mut config = RSAConfig {
                seed: settings.seed,
                ..RSAConfig::default()
            };
            if let Some(base) = &settings.key_basename {
                config = config.with_key_basename(base);
            }
            if let Some(target) = &settings.target_public_key_file {
                config.target_public_key_file = target.clone();
            }
            Ok(Box::new(RSA::open(&config)?))
        }
        Algorithm::ElGamal => {
            let mut config = ElGamalConfig {
                seed: settings.seed,
                ..ElGamalConfig::default()
            };
            if let Some(base) = &settings.key_basename {
                config = config.with_key_basename(base);
            }
            Ok(Box::new(ElGamal::open(&config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_algorithm_and_operation() {
        assert_eq!("RSA".parse::<Algorithm>().unwrap(), Algorithm::Rsa);
        assert_eq!("elgamal".parse::<Algorithm>().unwrap(), Algorithm::ElGamal);
        assert!("dsa".parse::<Algorithm>().is_err());

        assert_eq!("attack".parse::<Operation>().unwrap(), Operation::Attack);
        assert!("sign".parse::<Operation>().is_err());
        assert_eq!(Operation::Decrypt.to_string(), "decrypt");
    }

    #[test]
    fn test_open_cipher_reports_its_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        for algorithm in [Algorithm::Rsa, Algorithm::ElGamal] {
            let settings = CipherSettings {
                key_basename: Some(dir.path().join(algorithm.to_string())),
                target_public_key_file: None,
                seed: Some(1),
            };
            let cipher = open_cipher(algorithm, &settings).unwrap();
            assert_eq!(cipher.algorithm(), algorithm);
        }
    }

    #[test]
    fn test_output_formats() {
        let single = CipherOutput::Integer(BigUint::from(42u32));
        assert_eq!(single.to_string(), "42");

        let pair = CipherOutput::Pair(ElGamalCiphertext {
            c1: BigUint::from(5u32),
            c2: BigUint::from(17u32),
        });
        assert_eq!(pair.to_string(), "5\n17");
    }
}
