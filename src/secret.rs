//! Owned secret byte buffers that are overwritten with zeros before they are released.
//!
//! Every credential source (prompt, environment, command line, hex text, the
//! well-known value) is copied into a [`SecretBuffer`], so scrubbing never
//! touches memory owned by someone else.

use std::fmt;
use thiserror::Error;
use zeroize::Zeroize;

/// `TSS_WELL_KNOWN_SECRET`: 20 bytes of zeros.
pub const WELL_KNOWN_SECRET: [u8; 20] = [0; 20];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SecretError {
    #[error("invalid hex secret")]
    InvalidHex,
    #[error("secret is not valid UTF-8 and cannot be unicode encoded")]
    NotUtf8,
}

pub type Result<T, E = SecretError> = core::result::Result<T, E>;

/// Where the bytes of a [`SecretBuffer`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Prompt,
    Environment,
    Literal,
    HexDecoded,
    WellKnown,
    Unicode,
}

/// Exclusively owned secret bytes, scrubbed exactly once.
pub struct SecretBuffer {
    bytes: Vec<u8>,
    provenance: Provenance,
    scrubbed: bool,
}

impl SecretBuffer {
    pub fn new(bytes: Vec<u8>, provenance: Provenance) -> Self {
        Self {
            bytes,
            provenance,
            scrubbed: false,
        }
    }

    pub fn copy_from(bytes: &[u8], provenance: Provenance) -> Self {
        Self::new(bytes.to_vec(), provenance)
    }

    pub fn well_known() -> Self {
        Self::copy_from(&WELL_KNOWN_SECRET, Provenance::WellKnown)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Overwrites the buffer with zeros and empties it.
    ///
    /// Only the first call does anything; dropping the buffer calls this too.
    pub fn scrub(&mut self) {
        if self.scrubbed {
            return;
        }
        self.bytes.as_mut_slice().zeroize();
        #[cfg(test)]
        ledger::record(
            self.provenance,
            self.bytes.len(),
            self.bytes.iter().all(|b| *b == 0),
        );
        // zeroes spare capacity as well, then truncates
        self.bytes.zeroize();
        self.scrubbed = true;
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("provenance", &self.provenance)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

/// Decodes hex text into a new buffer sized by the decoded length.
///
/// Odd length and non-hex digits are both [`SecretError::InvalidHex`]; the
/// partially written output is scrubbed before the error is returned.
pub fn decode_hex(text: &[u8]) -> Result<SecretBuffer> {
    if text.len() % 2 != 0 {
        return Err(SecretError::InvalidHex);
    }
    let mut decoded = SecretBuffer::new(vec![0; text.len() / 2], Provenance::HexDecoded);
    hex::decode_to_slice(text, &mut decoded.bytes).map_err(|_| SecretError::InvalidHex)?;
    Ok(decoded)
}

/// Re-encodes UTF-8 text as UTF-16LE without a terminator, as TSS "unicode" secrets are.
pub fn to_utf16le(text: &[u8]) -> Result<SecretBuffer> {
    let text = std::str::from_utf8(text).map_err(|_| SecretError::NotUtf8)?;
    // never more than two output bytes per input byte, so no reallocation leaves copies behind
    let mut encoded = SecretBuffer::new(Vec::with_capacity(text.len() * 2), Provenance::Unicode);
    for unit in text.encode_utf16() {
        encoded.bytes.extend_from_slice(&unit.to_le_bytes());
    }
    Ok(encoded)
}
