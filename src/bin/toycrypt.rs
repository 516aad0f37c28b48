//! Command line front end: encrypt, decrypt or attack a record file with
//! toy RSA or ElGamal keys.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use num_bigint::BigUint;
use num_traits::Zero;

use toycrypt::cipher::keystore::parse_integer;
use toycrypt::{open_cipher, Algorithm, CipherSettings, Operation};

#[derive(Parser, Debug)]
#[command(name = "toycrypt", version, about = "Toy RSA and ElGamal with matching attacks")]
struct Args {
    /// Valid options: rsa, elgamal
    #[arg(short, long)]
    algorithm: Algorithm,

    /// Valid options: encrypt, decrypt, attack
    #[arg(short, long)]
    operation: Operation,

    /// File holding a clear-text message or a ciphertext, one integer per line
    #[arg(short = 'i', long = "inputfile")]
    input_file: PathBuf,

    /// Use this name for the key files (`NAME.pub` and `NAME`) instead of the defaults
    #[arg(short = 'k', long = "keyfile")]
    key_file: Option<PathBuf>,

    /// Public key of the recipient; required to encrypt
    #[arg(short = 'p', long = "pubkey", value_parser = parse_recipient)]
    pub_key: Option<BigUint>,

    /// Public key file of the RSA attack target
    #[arg(long)]
    target_key: Option<PathBuf>,

    /// Seed for reproducible key generation
    #[arg(long)]
    seed: Option<u64>,
}

fn parse_recipient(text: &str) -> Result<BigUint, String> {
    match parse_integer(text) {
        Some(value) if !value.is_zero() => Ok(value),
        _ => Err("Invalid recipient public key. Must be a positive integer.".to_string()),
    }
}

fn run(args: Args) -> toycrypt::Result<String> {
    if args.operation == Operation::Encrypt && args.pub_key.is_none() {
        return Err(toycrypt::Error::InvalidParameter(
            "encrypt needs the recipient public key (-p)".to_string(),
        ));
    }

    let settings = CipherSettings {
        key_basename: args.key_file,
        target_public_key_file: args.target_key,
        seed: args.seed,
    };
    let mut cipher = open_cipher(args.algorithm, &settings)?;
    info!("Running {} with the {} engine", args.operation, cipher.algorithm());
    let output = cipher.run(args.operation, &args.input_file, args.pub_key.as_ref())?;
    Ok(output.to_string())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
