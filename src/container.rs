//! Container codec
//!
//! The binary format is:
//! - metadata length L: 4 bytes (little-endian u32)
//! - metadata: L bytes of JSON text
//! - ciphertext: the remaining bytes
//!
//! There is no padding or alignment between fields. Metadata is written as
//! UTF-8; on decode, text that is not valid UTF-8 is read as Latin-1, which
//! is how older writers stored non-ASCII file names.

use std::borrow::Cow;

use hex::FromHex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cipher::IV_LEN;
use crate::error::{ErrorCategory, ErrorKind, Result, SecureFileError};
use crate::kdf::SALT_LEN;

/// The only container format version this crate reads and writes.
pub const FORMAT_VERSION: &str = "1.0";

/// Size of the metadata length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Per-container record describing the original file and the crypto parameters.
///
/// Serializes to a JSON object with keys in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub file_name: String,
    /// Plaintext length in bytes.
    pub file_size: u64,
    /// Content type of the original file, possibly empty.
    pub file_type: String,
    /// Hex SHA-256 of the plaintext.
    pub hash: String,
    /// Hex key-derivation salt.
    pub salt: String,
    /// Hex CBC initialization vector.
    pub iv: String,
    pub version: String,
}

impl Metadata {
    pub fn new(
        file_name: impl Into<String>,
        file_size: u64,
        file_type: impl Into<String>,
        hash: impl Into<String>,
        salt: &[u8; SALT_LEN],
        iv: &[u8; IV_LEN],
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            file_type: file_type.into(),
            hash: hash.into(),
            salt: hex::encode(salt),
            iv: hex::encode(iv),
            version: FORMAT_VERSION.to_string(),
        }
    }

    /// The decoded salt; fails with [`ErrorKind::CorruptContainer`] unless it is
    /// exactly 16 bytes of hex.
    pub fn salt_bytes(&self) -> Result<[u8; SALT_LEN]> {
        <[u8; SALT_LEN]>::from_hex(&self.salt).map_err(|e| {
            SecureFileError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::CorruptContainer,
                "metadata salt is not 16 bytes of hex",
                e,
            )
        })
    }

    /// The decoded IV; fails with [`ErrorKind::CorruptContainer`] unless it is
    /// exactly 16 bytes of hex.
    pub fn iv_bytes(&self) -> Result<[u8; IV_LEN]> {
        <[u8; IV_LEN]>::from_hex(&self.iv).map_err(|e| {
            SecureFileError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::CorruptContainer,
                "metadata iv is not 16 bytes of hex",
                e,
            )
        })
    }
}

/// Append `value` as 4 little-endian bytes.
pub fn write_u32_le(value: u32, out: &mut Vec<u8>) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Read 4 little-endian bytes as a `u32`.
pub fn read_u32_le(bytes: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*bytes)
}

/// Serialize `metadata` and `ciphertext` into a container.
pub fn encode(metadata: &Metadata, ciphertext: &[u8]) -> Result<Vec<u8>> {
    let text = serde_json::to_vec(metadata).map_err(|e| {
        SecureFileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "failed to serialize metadata",
            e,
        )
    })?;
    let text_len = u32::try_from(text.len()).map_err(|_| {
        SecureFileError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::InternalInvariant,
            "metadata does not fit in a 4-byte length prefix",
        )
    })?;

    let mut output = Vec::with_capacity(LENGTH_PREFIX_LEN + text.len() + ciphertext.len());
    write_u32_le(text_len, &mut output);
    output.extend_from_slice(&text);
    output.extend_from_slice(ciphertext);
    Ok(output)
}

/// Split a container into its metadata record and ciphertext.
///
/// The returned ciphertext borrows from `container`.
pub fn decode(container: &[u8]) -> Result<(Metadata, &[u8])> {
    let (prefix, rest) = container
        .split_first_chunk::<LENGTH_PREFIX_LEN>()
        .ok_or_else(|| {
            SecureFileError::corrupt("input likely truncated while reading metadata length")
        })?;

    let metadata_len = read_u32_le(prefix);
    let metadata_len = usize::try_from(metadata_len)
        .ok()
        .filter(|&len| len <= rest.len())
        .ok_or_else(|| {
            SecureFileError::corrupt(format!(
                "truncated or corrupt input; metadata length {} greater than available input {}",
                metadata_len,
                rest.len()
            ))
        })?;

    let (metadata_bytes, ciphertext) = rest.split_at(metadata_len);
    let metadata: Metadata = serde_json::from_str(&metadata_text(metadata_bytes)).map_err(|e| {
        SecureFileError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::CorruptContainer,
            "metadata is not a valid record",
            e,
        )
    })?;

    if metadata.version != FORMAT_VERSION {
        return Err(SecureFileError::with_kind(
            ErrorCategory::User,
            ErrorKind::UnsupportedVersion,
            format!(
                "container format version {:?} is not supported (expected {:?})",
                metadata.version, FORMAT_VERSION
            ),
        ));
    }

    Ok((metadata, ciphertext))
}

fn metadata_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            debug!("metadata is not UTF-8, reading it as Latin-1");
            Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())
        }
    }
}
