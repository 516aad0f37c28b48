use std::fs;
use std::path::Path;

use num_bigint::BigUint;
use tempfile::tempdir;

use toycrypt::cipher::elgamal::{ElGamal, ElGamalConfig};
use toycrypt::cipher::keystore::{read_integers, write_integers, KeyPaths};
use toycrypt::cipher::rsa::{RSAConfig, RSAKeyPair, RSA};
use toycrypt::math::Bootstrap;
use toycrypt::{open_cipher, Algorithm, CipherOutput, CipherSettings, Error, Operation};

fn settings(dir: &Path, name: &str, seed: u64) -> CipherSettings {
    CipherSettings {
        key_basename: Some(dir.join(name)),
        target_public_key_file: None,
        seed: Some(seed),
    }
}

fn write_record(path: &Path, values: &[u64]) {
    let values: Vec<BigUint> = values.iter().map(|v| BigUint::from(*v)).collect();
    write_integers(path, &values).unwrap();
}

fn integer(output: CipherOutput) -> BigUint {
    match output {
        CipherOutput::Integer(value) => value,
        other => panic!("expected a single integer, got {:?}", other),
    }
}

#[test]
fn test_rsa_keys_are_generated_once_and_reloaded() {
    let dir = tempdir().unwrap();
    let config = RSAConfig {
        seed: Some(1),
        ..RSAConfig::default()
    }
    .with_key_basename(dir.path().join("alice"));

    let first = RSA::open(&config).unwrap();
    assert!(config.key_paths.public_key_file.exists());
    assert!(config.key_paths.private_key_file.exists());

    let public = read_integers(&config.key_paths.public_key_file, 2).unwrap();
    assert_eq!(public[0], first.public_key().n);
    assert_eq!(public[1], first.public_key().e);

    // A different seed would give different keys, so equality means a reload.
    let reopened = RSA::open(&RSAConfig {
        seed: Some(2),
        ..config.clone()
    })
    .unwrap();
    assert_eq!(reopened.public_key(), first.public_key());
}

#[test]
fn test_torn_rsa_pair_is_regenerated() {
    let dir = tempdir().unwrap();
    let paths = KeyPaths::from_basename(dir.path().join("torn"));

    let mut rng = Bootstrap::seed_from_u64(3);
    let a = RSAKeyPair::generate(&mut rng, &BigUint::from(1000u32), &BigUint::from(10_000u32))
        .unwrap();
    let b = RSAKeyPair::generate(&mut rng, &BigUint::from(1000u32), &BigUint::from(10_000u32))
        .unwrap();
    RSA::save_keys(
        &RSAKeyPair {
            public_key: a.public_key.clone(),
            private_key: b.private_key.clone(),
        },
        &paths,
    )
    .unwrap();
    assert!(matches!(
        RSA::load_keys(&paths),
        Err(Error::MalformedRecord { .. })
    ));

    let config = RSAConfig {
        key_paths: paths.clone(),
        seed: Some(4),
        ..RSAConfig::default()
    };
    let engine = RSA::open(&config).unwrap();
    let reloaded = RSA::load_keys(&paths).unwrap();
    assert!(reloaded.is_consistent());
    assert_eq!(&reloaded.public_key, engine.public_key());
}

#[test]
fn test_garbage_key_files_are_replaced() {
    let dir = tempdir().unwrap();
    let paths = KeyPaths::from_basename(dir.path().join("bob"));
    fs::write(&paths.public_key_file, "not\na key\n").unwrap();
    fs::write(&paths.private_key_file, "7\n").unwrap();

    let config = ElGamalConfig {
        key_paths: paths.clone(),
        seed: Some(5),
        ..ElGamalConfig::default()
    };
    let engine = ElGamal::open(&config).unwrap();
    let reloaded = ElGamal::load_keys(&paths).unwrap();
    assert_eq!(&reloaded.public, engine.public_key());
}

#[test]
fn test_rsa_file_flow_encrypt_decrypt_attack() {
    let dir = tempdir().unwrap();
    let mut settings = settings(dir.path(), "rsa", 6);
    settings.target_public_key_file = Some(dir.path().join("rsa.pub"));
    let mut cipher = open_cipher(Algorithm::Rsa, &settings).unwrap();

    let message_file = dir.path().join("message.txt");
    write_record(&message_file, &[42]);

    let recipient = BigUint::from(1u32);
    let ciphertext = integer(
        cipher
            .run(Operation::Encrypt, &message_file, Some(&recipient))
            .unwrap(),
    );
    let ciphertext_file = dir.path().join("cipher.txt");
    write_integers(&ciphertext_file, &[ciphertext]).unwrap();

    let decrypted = integer(cipher.run(Operation::Decrypt, &ciphertext_file, None).unwrap());
    assert_eq!(decrypted, BigUint::from(42u32));

    let attacked = integer(cipher.run(Operation::Attack, &ciphertext_file, None).unwrap());
    assert_eq!(attacked, BigUint::from(42u32));
}

#[test]
fn test_rsa_attack_on_handwritten_target() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target.pub");
    // n = 61 * 53, e = 17; 65^17 mod 3233 = 2790.
    write_record(&target, &[3233, 17]);
    let ciphertext_file = dir.path().join("cipher.txt");
    write_record(&ciphertext_file, &[2790]);

    let mut rng = Bootstrap::seed_from_u64(7);
    let keys =
        RSAKeyPair::generate(&mut rng, &BigUint::from(100u32), &BigUint::from(200u32)).unwrap();
    let engine = RSA::from_key_pair(keys);
    let recovered = engine.attack(&ciphertext_file, &target).unwrap();
    assert_eq!(recovered, BigUint::from(65u32));
}

#[test]
fn test_elgamal_file_flow_encrypt_decrypt_attack() {
    let dir = tempdir().unwrap();
    let settings = settings(dir.path(), "elgamal", 8);
    let mut cipher = open_cipher(Algorithm::ElGamal, &settings).unwrap();

    let public = read_integers(&dir.path().join("elgamal.pub"), 3).unwrap();
    let own_y = public[2].clone();

    let message_file = dir.path().join("message.txt");
    write_record(&message_file, &[42]);

    let pair = match cipher
        .run(Operation::Encrypt, &message_file, Some(&own_y))
        .unwrap()
    {
        CipherOutput::Pair(pair) => pair,
        other => panic!("expected a ciphertext pair, got {:?}", other),
    };
    let ciphertext_file = dir.path().join("cipher.txt");
    fs::write(&ciphertext_file, format!("{}\n", pair)).unwrap();

    let decrypted = integer(cipher.run(Operation::Decrypt, &ciphertext_file, None).unwrap());
    assert_eq!(decrypted, BigUint::from(42u32));

    let attacked = integer(cipher.run(Operation::Attack, &ciphertext_file, None).unwrap());
    assert_eq!(attacked, BigUint::from(42u32));
}

#[test]
fn test_seeded_elgamal_engines_draw_fresh_ephemeral_keys() {
    let dir = tempdir().unwrap();
    let config = ElGamalConfig {
        seed: Some(5),
        ..ElGamalConfig::default()
    }
    .with_key_basename(dir.path().join("seeded"));

    // First open generates the keys, the next two load them.
    let generated = ElGamal::open(&config).unwrap();
    let y = generated.public_key().y.clone();

    let mut first = ElGamal::open(&config).unwrap();
    let mut second = ElGamal::open(&config).unwrap();
    assert_eq!(first.public_key(), generated.public_key());
    assert_eq!(second.public_key(), generated.public_key());

    let message = BigUint::from(77u32);
    let first_c1: Vec<BigUint> = (0..4)
        .map(|_| first.encrypt(&message, &y).unwrap().c1)
        .collect();
    let second_c1: Vec<BigUint> = (0..4)
        .map(|_| second.encrypt(&message, &y).unwrap().c1)
        .collect();
    assert_ne!(first_c1, second_c1, "ephemeral keys repeated across engines");
}

#[test]
fn test_elgamal_encrypt_requires_recipient() {
    let dir = tempdir().unwrap();
    let mut cipher = open_cipher(Algorithm::ElGamal, &settings(dir.path(), "k", 9)).unwrap();
    let message_file = dir.path().join("message.txt");
    write_record(&message_file, &[42]);

    assert!(matches!(
        cipher.run(Operation::Encrypt, &message_file, None),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn test_bad_input_records_are_reported() {
    let dir = tempdir().unwrap();
    let mut cipher = open_cipher(Algorithm::Rsa, &settings(dir.path(), "k", 10)).unwrap();

    let missing = dir.path().join("missing.txt");
    assert!(matches!(
        cipher.run(Operation::Decrypt, &missing, None),
        Err(Error::Io { .. })
    ));

    let garbage = dir.path().join("garbage.txt");
    fs::write(&garbage, "-12\n").unwrap();
    assert!(matches!(
        cipher.run(Operation::Decrypt, &garbage, None),
        Err(Error::MalformedRecord { .. })
    ));
}
