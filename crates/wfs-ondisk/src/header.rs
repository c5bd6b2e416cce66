//! Magic header at offset 0.

use wfs_types::{MAGIC, MAGIC_SIZE, ParseError, ensure_slice, read_le_u32};

/// Check the first [`MAGIC_SIZE`] bytes of `bytes` against the four magic words.
///
/// On mismatch the error carries the first differing word.
pub fn validate_magic(bytes: &[u8]) -> Result<(), ParseError> {
    ensure_slice(bytes, 0, MAGIC_SIZE)?;
    for (i, expected) in MAGIC.iter().enumerate() {
        let actual = read_le_u32(bytes, i * 4)?;
        if actual != *expected {
            return Err(ParseError::InvalidMagic {
                expected: u64::from(*expected),
                actual: u64::from(actual),
            });
        }
    }
    Ok(())
}

/// The magic header as it appears on disk.
#[must_use]
pub fn encode_magic() -> [u8; MAGIC_SIZE] {
    let mut out = [0_u8; MAGIC_SIZE];
    for (i, word) in MAGIC.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    out
}
