//! Encryption pipeline
//!
//! `encrypt_file` turns plaintext bytes into a container:
//! random salt and IV, key derivation, plaintext digest, AES-256-CBC, then
//! the container codec. `decrypt_file` reverses it and reports the digest
//! check as a separate verdict.
//!
//! A successful decrypt and a matching digest are independent signals.
//! A wrong password usually fails at the padding check, but can decrypt
//! "successfully" to garbage with `integrity_valid == false`. Callers must
//! check both before trusting the output.

use std::num::NonZeroU32;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, warn};

use crate::cipher::{self, IV_LEN};
use crate::container::{self, Metadata};
use crate::error::Result;
use crate::integrity;
use crate::kdf::{self, DEFAULT_ITERATIONS, SALT_LEN};
use crate::progress::{ProgressSink, ProgressTracker};

/// Tunables shared by both directions. Decryption must use the same values
/// the container was produced with, since they are not recorded in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub iterations: NonZeroU32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Result of a successful decrypt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedFile {
    pub plaintext: Vec<u8>,
    pub file_name: String,
    pub file_type: String,
    /// Size recorded at encryption time.
    pub file_size: u64,
    /// Whether the plaintext matches the digest recorded at encryption time.
    pub integrity_valid: bool,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// Encrypt `plaintext` into a new container using fresh random salt and IV.
pub fn encrypt_file(
    plaintext: &[u8],
    file_name: &str,
    file_type: &str,
    password: &[u8],
) -> Result<Vec<u8>> {
    encrypt_file_with(
        plaintext,
        file_name,
        file_type,
        password,
        &Options::default(),
        &mut |_: u8| {},
    )
}

/// [`encrypt_file`] with explicit options and a progress sink.
pub fn encrypt_file_with(
    plaintext: &[u8],
    file_name: &str,
    file_type: &str,
    password: &[u8],
    options: &Options,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    encrypt_with_parameters(
        plaintext, file_name, file_type, password, &salt, &iv, options, progress,
    )
}

/// Encrypt with caller-provided salt and IV.
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt_file()` which generates
/// random salt/IV.
pub fn encrypt_file_deterministic(
    plaintext: &[u8],
    file_name: &str,
    file_type: &str,
    password: &[u8],
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>> {
    encrypt_with_parameters(
        plaintext,
        file_name,
        file_type,
        password,
        salt,
        iv,
        &Options::default(),
        &mut |_: u8| {},
    )
}

#[allow(clippy::too_many_arguments)]
fn encrypt_with_parameters(
    plaintext: &[u8],
    file_name: &str,
    file_type: &str,
    password: &[u8],
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
    options: &Options,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<u8>> {
    let mut progress = ProgressTracker::new(progress);
    progress.report(0);
    debug!(
        bytes = plaintext.len(),
        iterations = options.iterations.get(),
        "encrypting"
    );

    let key = kdf::derive_key(password, salt, options.iterations);
    progress.report(5);

    let hash = integrity::digest(plaintext);
    let ciphertext = cipher::encrypt_with_progress(plaintext, &key, iv, &mut progress.stage(5, 95));

    let metadata = Metadata::new(
        file_name,
        plaintext.len() as u64,
        file_type,
        hash,
        salt,
        iv,
    );
    let container = container::encode(&metadata, &ciphertext)?;

    debug!(bytes = container.len(), "container assembled");
    progress.finish();
    Ok(container)
}

/// Decrypt a container produced by [`encrypt_file`].
pub fn decrypt_file(container: &[u8], password: &[u8]) -> Result<DecryptedFile> {
    decrypt_file_with(container, password, &Options::default(), &mut |_: u8| {})
}

/// [`decrypt_file`] with explicit options and a progress sink.
///
/// Errors are [`ErrorKind::CorruptContainer`](crate::ErrorKind::CorruptContainer)
/// or [`ErrorKind::UnsupportedVersion`](crate::ErrorKind::UnsupportedVersion) for
/// unreadable containers and [`ErrorKind::Decryption`](crate::ErrorKind::Decryption)
/// when the cipher step fails. A digest mismatch is not an error; it is
/// reported through [`DecryptedFile::integrity_valid`].
pub fn decrypt_file_with(
    container: &[u8],
    password: &[u8],
    options: &Options,
    progress: &mut dyn ProgressSink,
) -> Result<DecryptedFile> {
    let mut progress = ProgressTracker::new(progress);
    progress.report(0);

    let (metadata, ciphertext) = container::decode(container)?;
    let salt = metadata.salt_bytes()?;
    let iv = metadata.iv_bytes()?;
    debug!(
        bytes = ciphertext.len(),
        iterations = options.iterations.get(),
        "decrypting"
    );

    let key = kdf::derive_key(password, &salt, options.iterations);
    progress.report(5);

    let plaintext =
        cipher::decrypt_with_progress(ciphertext, &key, &iv, &mut progress.stage(5, 95))?;

    let actual_hash = integrity::digest(&plaintext);
    let integrity_valid = integrity::verify(&metadata.hash, &actual_hash);
    if !integrity_valid {
        warn!(
            file_name = %metadata.file_name,
            "decrypted content does not match the recorded digest"
        );
    }
    if plaintext.len() as u64 != metadata.file_size {
        debug!(
            recorded = metadata.file_size,
            actual = plaintext.len(),
            "recorded size differs from decrypted size"
        );
    }

    progress.finish();
    Ok(DecryptedFile {
        plaintext,
        file_name: metadata.file_name,
        file_type: metadata.file_type,
        file_size: metadata.file_size,
        integrity_valid,
        expected_hash: metadata.hash,
        actual_hash,
    })
}
