//! AES-256-CBC with PKCS#7 padding
//!
//! Encryption always appends padding, so the ciphertext is the plaintext
//! length rounded up to the next whole block (a full block of padding is
//! added when the plaintext is already aligned).
//!
//! Padding validity is not evidence of a correct key. A wrong key yields
//! well-formed padding roughly once in 256 attempts; the plaintext digest
//! is what decides whether the output can be trusted.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, SecureFileError};
use crate::kdf::KEY_LEN;
use crate::progress::{ProgressSink, percent_of};

/// AES block size in bytes
pub const BLOCK_LEN: usize = 16;

/// Length of IV in bytes
pub const IV_LEN: usize = 16;

/// Bytes processed between progress reports. Must be a multiple of `BLOCK_LEN`.
pub const CHUNK_LEN: usize = 1024 * 1024;

/// Ciphertext length for a plaintext of `plaintext_len` bytes.
pub fn padded_len(plaintext_len: usize) -> usize {
    (plaintext_len / BLOCK_LEN + 1) * BLOCK_LEN
}

pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Vec<u8> {
    encrypt_with_progress(plaintext, key, iv, &mut |_: u8| {})
}

pub fn decrypt(ciphertext: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Result<Vec<u8>> {
    decrypt_with_progress(ciphertext, key, iv, &mut |_: u8| {})
}

/// Encrypt, reporting progress after every [`CHUNK_LEN`] bytes and at the end.
pub fn encrypt_with_progress(
    plaintext: &[u8],
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    progress: &mut dyn ProgressSink,
) -> Vec<u8> {
    let cipher = Aes256::new(key.into());
    let mut output = Vec::with_capacity(padded_len(plaintext.len()));
    let mut prev = Block::clone_from_slice(iv);

    let (body, tail) = plaintext.split_at(plaintext.len() - plaintext.len() % BLOCK_LEN);
    let mut done = 0;
    for chunk in body.chunks(CHUNK_LEN) {
        for block in chunk.chunks_exact(BLOCK_LEN) {
            encrypt_block(&cipher, &mut prev, block, &mut output);
        }
        done += chunk.len();
        progress.report(percent_of(done, plaintext.len()));
    }

    let pad = (BLOCK_LEN - tail.len()) as u8;
    let mut last = Zeroizing::new([pad; BLOCK_LEN]);
    last[..tail.len()].copy_from_slice(tail);
    encrypt_block(&cipher, &mut prev, &last[..], &mut output);
    progress.report(100);

    output
}

/// Decrypt, reporting progress after every [`CHUNK_LEN`] bytes.
///
/// Fails with [`ErrorKind::Decryption`] if the ciphertext is empty, not block
/// aligned, or ends in malformed padding. No plaintext is returned on failure.
pub fn decrypt_with_progress(
    ciphertext: &[u8],
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    progress: &mut dyn ProgressSink,
) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(decryption_error(format!(
            "ciphertext length {} is not a positive multiple of the block size",
            ciphertext.len()
        )));
    }

    let cipher = Aes256::new(key.into());
    let mut output = Zeroizing::new(Vec::with_capacity(ciphertext.len()));
    let mut prev = Block::clone_from_slice(iv);

    let mut done = 0;
    for chunk in ciphertext.chunks(CHUNK_LEN) {
        for input in chunk.chunks_exact(BLOCK_LEN) {
            let mut block = Block::clone_from_slice(input);
            cipher.decrypt_block(&mut block);
            xor_in_place(&mut block, &prev);
            output.extend_from_slice(&block);
            prev.copy_from_slice(input);
        }
        done += chunk.len();
        progress.report(percent_of(done, ciphertext.len()));
    }

    let plaintext_len = unpadded_len(&output)?;
    output.truncate(plaintext_len);
    Ok(std::mem::take(&mut *output))
}

fn encrypt_block(cipher: &Aes256, prev: &mut Block, input: &[u8], output: &mut Vec<u8>) {
    let mut block = Block::clone_from_slice(input);
    xor_in_place(&mut block, prev);
    cipher.encrypt_block(&mut block);
    output.extend_from_slice(&block);
    *prev = block;
}

fn xor_in_place(block: &mut Block, other: &Block) {
    for (b, o) in block.iter_mut().zip(other.iter()) {
        *b ^= o;
    }
}

/// Validates PKCS#7 padding on a block-aligned buffer and returns the data length.
fn unpadded_len(decrypted: &[u8]) -> Result<usize> {
    let last_block = &decrypted[decrypted.len() - BLOCK_LEN..];
    let pad = last_block[BLOCK_LEN - 1];

    // The pad value is recoverable from the length anyway, so only the
    // byte comparison below needs to be constant time.
    if pad == 0 || usize::from(pad) > BLOCK_LEN {
        return Err(decryption_error("invalid padding"));
    }

    let start = BLOCK_LEN - usize::from(pad);
    let expected = [pad; BLOCK_LEN];
    if !bool::from(last_block[start..].ct_eq(&expected[start..])) {
        return Err(decryption_error("invalid padding"));
    }

    Ok(decrypted.len() - usize::from(pad))
}

fn decryption_error(detail: impl Into<String>) -> SecureFileError {
    SecureFileError::with_kind(
        ErrorCategory::User,
        ErrorKind::Decryption,
        format!(
            "wrong password or corrupted ciphertext ({})",
            detail.into()
        ),
    )
}
