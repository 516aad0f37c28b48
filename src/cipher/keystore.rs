//! Plain-text records: one decimal integer per line, newline terminated.
//!
//! Used for key files and for message/ciphertext files. Writes go through a
//! temp file in the destination directory followed by a rename, so a reader
//! never observes a half-written record.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use num_bigint::BigUint;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Parses a single base-10 integer, ignoring surrounding whitespace.
pub fn parse_integer(text: &str) -> Option<BigUint> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
}

/// Reads the first `count` integers of a record file.
pub fn read_integers(path: &Path, count: usize) -> Result<Vec<BigUint>> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut lines = text.lines();
    let mut values = Vec::with_capacity(count);

    for index in 0..count {
        let line = lines.next().ok_or_else(|| {
            Error::malformed(
                path,
                format!("expected {} lines, found {}", count, index),
            )
        })?;
        let value = parse_integer(line).ok_or_else(|| {
            Error::malformed(
                path,
                format!("line {} is not a decimal integer: {:?}", index + 1, line),
            )
        })?;
        values.push(value);
    }

    Ok(values)
}

/// A record written to a temp file, not yet visible at its destination.
struct StagedRecord {
    file: NamedTempFile,
    destination: PathBuf,
}

fn stage(path: &Path, values: &[BigUint]) -> Result<StagedRecord> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(|e| Error::io(&directory, e))?;

    let mut file = NamedTempFile::new_in(&directory).map_err(|e| Error::io(&directory, e))?;
    for value in values {
        writeln!(file, "{}", value).map_err(|e| Error::io(path, e))?;
    }
    file.as_file().sync_all().map_err(|e| Error::io(path, e))?;

    Ok(StagedRecord {
        file,
        destination: path.to_path_buf(),
    })
}

fn commit(record: StagedRecord) -> Result<()> {
    let StagedRecord { file, destination } = record;
    file.persist(&destination)
        .map_err(|e| Error::io(&destination, e.error))?;
    debug!("wrote {}", destination.display());
    Ok(())
}

/// Atomically replaces `path` with the given integers, one per line.
pub fn write_integers(path: &Path, values: &[BigUint]) -> Result<()> {
    commit(stage(path, values)?)
}

/// Writes a public/private record pair.
///
/// Both records are fully staged before either is renamed into place, so a
/// failure while writing leaves the previous pair untouched. Loaders still
/// validate that the two halves belong together.
pub fn write_key_pair(
    public_path: &Path,
    public_values: &[BigUint],
    private_path: &Path,
    private_values: &[BigUint],
) -> Result<()> {
    let public = stage(public_path, public_values)?;
    let private = stage(private_path, private_values)?;
    commit(private)?;
    commit(public)
}

/// Public and private key file locations for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    pub public_key_file: PathBuf,
    pub private_key_file: PathBuf,
}

impl KeyPaths {
    pub fn new(public_key_file: impl Into<PathBuf>, private_key_file: impl Into<PathBuf>) -> Self {
        KeyPaths {
            public_key_file: public_key_file.into(),
            private_key_file: private_key_file.into(),
        }
    }

    /// `base.pub` for the public half, `base` for the private half.
    pub fn from_basename(base: impl AsRef<Path>) -> Self {
        let private = base.as_ref().to_path_buf();
        let mut public = private.clone().into_os_string();
        public.push(".pub");
        KeyPaths {
            public_key_file: PathBuf::from(public),
            private_key_file: private,
        }
    }
}
