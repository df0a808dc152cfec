//! Diff fingerprints
//!
//! Provides [`DiffFingerprint`], a 32-byte Blake3 digest of a variant diff.
//! Evaluation caches are keyed by fingerprint rather than by the full diff
//! text; two variants with equal diffs share one entry.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Digest of a variant diff
///
/// The empty diff (unmodified program) is pinned to the all-zero value so
/// it can be recognised without rehashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DiffFingerprint([u8; 32]);

impl DiffFingerprint {
    /// Fingerprint of the empty diff
    pub const EMPTY: Self = Self([0; 32]);

    /// Compute the fingerprint of a diff text
    #[inline]
    #[must_use]
    pub fn of(diff: &str) -> Self {
        if diff.is_empty() {
            return Self::EMPTY;
        }
        Self(*blake3::hash(diff.as_bytes()).as_bytes())
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// True for the fingerprint of the unmodified program
    #[inline]
    #[must_use]
    pub const fn is_empty_diff(&self) -> bool {
        let mut i = 0;
        while i < 32 {
            if self.0[i] != 0 {
                return false;
            }
            i += 1;
        }
        true
    }
}

impl Display for DiffFingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for DiffFingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| FingerprintError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

/// Fingerprint parsing errors
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("invalid fingerprint length: expected 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex encoding: {0}")]
    Hex(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_is_pinned() {
        assert_eq!(DiffFingerprint::of(""), DiffFingerprint::EMPTY);
        assert!(DiffFingerprint::of("").is_empty_diff());
        assert!(!DiffFingerprint::of("--- a\n").is_empty_diff());
    }

    #[test]
    fn equal_diffs_equal_fingerprints() {
        let a = DiffFingerprint::of("-x\n+y\n");
        let b = DiffFingerprint::of("-x\n+y\n");
        let c = DiffFingerprint::of("-x\n+z\n");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hex_roundtrip() {
        let fp = DiffFingerprint::of("hello");
        let parsed: DiffFingerprint = fp.to_string().parse().unwrap();
        assert_eq!(parsed, fp);
        assert_eq!(fp.short().len(), 16);
        assert!("abcd".parse::<DiffFingerprint>().is_err());
    }
}
