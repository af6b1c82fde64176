//! Plaintext digests
//!
//! The container stores the SHA-256 of the plaintext and decryption checks
//! the recovered bytes against it. This is the only authenticity signal in
//! the format. There is no MAC over the ciphertext or the metadata, so
//! someone able to rewrite both the ciphertext and the recorded `hash`
//! together is not detected.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of a hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 of `data`.
pub fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compares two hex digests in constant time. Digests of different length
/// never match.
pub fn verify(expected_hex: &str, actual_hex: &str) -> bool {
    expected_hex.as_bytes().ct_eq(actual_hex.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digest(b"Hello World"),
            "a591a6d40bf420404a011733cfb7b190d62c65bf0bcda32b57b277d9ad9f146e"
        );
        assert_eq!(digest(b"anything").len(), DIGEST_HEX_LEN);
    }

    #[test]
    fn test_verify() {
        let d = digest(b"Hello World");
        assert!(verify(&d, &digest(b"Hello World")));
        assert!(!verify(&d, &digest(b"Hello World!")));
        assert!(!verify(&d, &d[..DIGEST_HEX_LEN - 1]));
        assert!(!verify("", &d));
    }

    #[test]
    fn test_verify_is_exact() {
        // Stored digests are lowercase; an uppercase rendering is a different string.
        let d = digest(b"x");
        assert!(!verify(&d.to_uppercase(), &d));
    }
}
