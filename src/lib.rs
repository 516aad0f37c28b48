//! Toy number theory and textbook public-key cryptography.
//!
//! [`math`] holds the modular kernel, primality testing, prime generation
//! and the Blum-Blum-Shub generator. [`cipher`] builds RSA and ElGamal on
//! top of it, each paired with the attack that breaks its small keys.
//!
//! Nothing here is safe for real use.

pub mod cipher;
pub mod error;
pub mod math;

pub use cipher::{open_cipher, Algorithm, Cipher, CipherOutput, CipherSettings, Operation};
pub use error::{Error, Result};
