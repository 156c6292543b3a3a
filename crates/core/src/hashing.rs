//! SHA-256 digests for uploaded source files.
//!
//! The full hex digest is stored on the job for integrity checks; a short
//! prefix is embedded in the stored filename.

use sha2::{Digest, Sha256};

/// Number of hex characters of the digest used in stored filenames.
pub const FILENAME_HASH_PREFIX_LEN: usize = 12;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// First [`FILENAME_HASH_PREFIX_LEN`] characters of a hex digest.
pub fn hash_prefix(hex: &str) -> &str {
    let end = hex.len().min(FILENAME_HASH_PREFIX_LEN);
    &hex[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn prefix_is_truncated() {
        let digest = sha256_hex(b"Name,Email\n");
        assert_eq!(hash_prefix(&digest).len(), FILENAME_HASH_PREFIX_LEN);
        assert!(digest.starts_with(hash_prefix(&digest)));
    }

    #[test]
    fn prefix_of_short_input_is_whole_input() {
        assert_eq!(hash_prefix("abc"), "abc");
    }
}
