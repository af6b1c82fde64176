//! securefile - Password-based file encryption into self-describing containers
//!
//! A container is a 4-byte little-endian metadata length, a JSON metadata
//! record (original name, size, type, SHA-256 of the plaintext, salt, IV and
//! format version) and the AES-256-CBC ciphertext. Keys come from
//! PBKDF2-HMAC-SHA256.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod container;
pub mod error;
pub mod file_ops;
pub mod integrity;
pub mod kdf;
pub mod passphrase;
pub mod pipeline;
pub mod progress;

pub use container::Metadata;
pub use error::{ErrorCategory, ErrorKind, Result, SecureFileError};
pub use pipeline::{DecryptedFile, Options, decrypt_file, encrypt_file};
pub use progress::ProgressSink;
