//! Error types shared by the number-theory kernel and both cipher engines.

use std::path::PathBuf;

use num_bigint::BigUint;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("message {value} is outside the valid range [1, {modulus})")]
    MessageOutOfRange { value: BigUint, modulus: BigUint },

    #[error("invalid range: min {min} is greater than max {max}")]
    InvalidRange { min: BigUint, max: BigUint },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{value} has no inverse modulo {modulus}")]
    NoInverse { value: BigUint, modulus: BigUint },

    #[error("no generator found for the multiplicative group modulo {p}")]
    NoGenerator { p: BigUint },

    #[error("no x with {base}^x = {target} (mod {modulus}) was found")]
    DiscreteLogNotFound {
        base: BigUint,
        target: BigUint,
        modulus: BigUint,
    },

    #[error("baby-step table of {table_size} entries exceeds the limit of {limit}")]
    DiscreteLogInfeasible { table_size: BigUint, limit: u64 },

    #[error("the range [{min}, {max}] does not contain enough suitable primes")]
    NoPrimeInRange { min: BigUint, max: BigUint },

    #[error("{0} has no nontrivial factors")]
    NotComposite(BigUint),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
