//! Fixed-size record capability.
//!
//! Every on-disk struct (node slots, the chain-strategy edge records)
//! knows its own encoded byte length and can serialize / deserialize
//! itself. All multi-byte fields are little-endian; pointer fields are
//! `i64` file offsets with `-1` as the "no record" sentinel.

use crate::error::{Error, Result};

/// Sentinel pointer value meaning "no next/previous record".
pub const NO_POINTER: i64 = -1;

/// A type with a fixed on-disk encoding.
pub trait FixedRecord: Sized {
    /// Encoded length in bytes.
    const SIZE: usize;

    /// Serialize into exactly [`Self::SIZE`] bytes.
    fn encode(&self) -> Vec<u8>;

    /// Deserialize from a span of exactly [`Self::SIZE`] bytes.
    ///
    /// Fails with [`Error::RecordSizeMismatch`] on any other length.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Length guard shared by every `decode` implementation.
pub(crate) fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::RecordSizeMismatch { expected, actual });
    }
    Ok(())
}
