//! Password-based key derivation
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 producing a 256-bit AES key.
//!
//! The iteration count is [`DEFAULT_ITERATIONS`] (1000). That is low by
//! contemporary standards, and it is what every existing version 1.0
//! container was produced with. The count is not recorded in the container,
//! so raising it breaks decryption of existing files. Callers that need a
//! different cost must pass it explicitly on both the encrypt and decrypt side.

use std::num::NonZeroU32;

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// PBKDF2 iteration count used by format version 1.0.
pub const DEFAULT_ITERATIONS: NonZeroU32 = match NonZeroU32::new(1000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};

/// A derived AES-256 key, wiped from memory on drop.
pub type Key = Zeroizing<[u8; KEY_LEN]>;

/// Derive a 32-byte key from a password and salt.
///
/// Deterministic for identical inputs. Empty passwords are accepted; strength
/// policy is the caller's concern.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN], iterations: NonZeroU32) -> Key {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, iterations.get(), &mut key[..]);
    key
}
