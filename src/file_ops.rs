//! File encryption/decryption operations
//!
//! This module connects the byte-level pipeline to the filesystem: reading
//! sources, choosing output names, applying the password policy and writing
//! results atomically.

use crate::container::{self, Metadata};
use crate::error::{ErrorCategory, ErrorKind, Result, SecureFileError};
use crate::passphrase::{self, PassphraseReader};
use crate::pipeline::{self, Options};
use crate::progress::ProgressSink;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Extension appended to encrypted outputs.
pub const ENCRYPTED_EXTENSION: &str = "encrypted";

/// Largest input accepted by default (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Largest container accepted by default: a maximum-size plaintext plus room
/// for the length prefix, metadata and padding.
pub const DEFAULT_MAX_CONTAINER_SIZE: u64 = DEFAULT_MAX_FILE_SIZE + 64 * 1024;

/// Shortest password accepted for new containers unless overridden,
/// counted as [`passphrase::password_length`] does.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct EncryptSettings {
    pub options: Options,
    /// Content type recorded in the container.
    pub content_type: String,
    /// Skip the password length and strength checks.
    pub allow_weak_password: bool,
    pub max_file_size: u64,
}

impl Default for EncryptSettings {
    fn default() -> Self {
        Self {
            options: Options::default(),
            content_type: String::new(),
            allow_weak_password: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecryptSettings {
    pub options: Options,
    /// Write the plaintext even when it does not match the recorded digest.
    pub keep_unverified: bool,
    pub max_file_size: u64,
}

impl Default for DecryptSettings {
    fn default() -> Self {
        Self {
            options: Options::default(),
            keep_unverified: false,
            max_file_size: DEFAULT_MAX_CONTAINER_SIZE,
        }
    }
}

/// Outcome of [`decrypt_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptReport {
    pub output: PathBuf,
    pub file_name: String,
    pub file_type: String,
    pub integrity_valid: bool,
}

/// `<name>.encrypted`
pub fn encrypted_file_name(name: &OsStr) -> OsString {
    let mut encrypted = name.to_os_string();
    encrypted.push(".");
    encrypted.push(ENCRYPTED_EXTENSION);
    encrypted
}

/// Encrypt a file with a password
///
/// Reads plaintext from `input_path`, encrypts it using a password from
/// `passphrase_reader`, and writes the container to `output_path`, or to
/// `<input>.encrypted` when no output is given. Returns the path written.
///
/// The output file is created with mode 0o600 (read/write for owner only) on Unix systems.
pub fn encrypt_path(
    input_path: &Path,
    output_path: Option<&Path>,
    passphrase_reader: &mut dyn PassphraseReader,
    settings: &EncryptSettings,
    progress: &mut dyn ProgressSink,
) -> Result<PathBuf> {
    let plaintext = read_source(input_path, settings.max_file_size)?;
    let source_name = input_path.file_name().ok_or_else(|| {
        SecureFileError::with_kind(
            ErrorCategory::User,
            ErrorKind::SourceRead,
            format!("{} does not name a file", input_path.display()),
        )
    })?;
    let file_name = source_name.to_string_lossy();

    let password = passphrase_reader.read_passphrase()?;
    check_password_policy(&password, settings.allow_weak_password)?;

    let container = pipeline::encrypt_file_with(
        &plaintext,
        &file_name,
        &settings.content_type,
        &password,
        &settings.options,
        progress,
    )
    .map_err(|e| e.with_context("encryption failed"))?;

    let output_path = match output_path {
        Some(path) => path.to_path_buf(),
        None => input_path.with_file_name(encrypted_file_name(source_name)),
    };
    write_file_atomic(&output_path, &container)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = container.len(),
        "encrypted"
    );
    Ok(output_path)
}

/// Decrypt a container file with a password
///
/// Reads the container from `input_path`, decrypts it using a password from
/// `passphrase_reader`, and writes the plaintext to `output_path`, or to the
/// recorded original file name next to the input when no output is given.
///
/// Plaintext that fails the integrity check is not written unless
/// `settings.keep_unverified` is set; the error is tagged
/// [`ErrorKind::IntegrityMismatch`].
pub fn decrypt_path(
    input_path: &Path,
    output_path: Option<&Path>,
    passphrase_reader: &mut dyn PassphraseReader,
    settings: &DecryptSettings,
    progress: &mut dyn ProgressSink,
) -> Result<DecryptReport> {
    if input_path.extension().is_none_or(|ext| ext != ENCRYPTED_EXTENSION) {
        warn!(
            input = %input_path.display(),
            "input does not have the .{} extension", ENCRYPTED_EXTENSION
        );
    }
    let container = read_source(input_path, settings.max_file_size)?;

    let password = passphrase_reader.read_passphrase()?;
    if password.is_empty() {
        return Err(SecureFileError::with_kind(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "password must not be empty",
        ));
    }

    let decrypted = pipeline::decrypt_file_with(&container, &password, &settings.options, progress)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    if !decrypted.integrity_valid && !settings.keep_unverified {
        return Err(SecureFileError::with_kind(
            ErrorCategory::User,
            ErrorKind::IntegrityMismatch,
            "file integrity check failed; the file may have been tampered with or the password is wrong",
        ));
    }

    let output_path = match output_path {
        Some(path) => path.to_path_buf(),
        None => default_decrypted_path(input_path, &decrypted.file_name),
    };
    write_file_atomic(&output_path, &decrypted.plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        integrity_valid = decrypted.integrity_valid,
        "decrypted"
    );
    Ok(DecryptReport {
        output: output_path,
        file_name: decrypted.file_name,
        file_type: decrypted.file_type,
        integrity_valid: decrypted.integrity_valid,
    })
}

/// Read the metadata of a container file without decrypting it.
pub fn inspect_path(input_path: &Path) -> Result<Metadata> {
    let container = read_source(input_path, DEFAULT_MAX_CONTAINER_SIZE)?;
    let (metadata, _) = container::decode(&container)
        .map_err(|e| e.with_context(format!("failed to read {}", input_path.display())))?;
    Ok(metadata)
}

fn check_password_policy(password: &[u8], allow_weak: bool) -> Result<()> {
    if password.is_empty() {
        return Err(SecureFileError::with_kind(
            ErrorCategory::User,
            ErrorKind::WeakPassphrase,
            "password must not be empty",
        ));
    }
    let length = passphrase::password_length(password);
    if length < MIN_PASSWORD_LEN {
        if !allow_weak {
            return Err(SecureFileError::with_kind(
                ErrorCategory::User,
                ErrorKind::WeakPassphrase,
                format!(
                    "password is {} characters, need at least {}; pass --allow-weak-password to use it anyway",
                    length, MIN_PASSWORD_LEN
                ),
            ));
        }
        warn!(length, "password is shorter than {} characters", MIN_PASSWORD_LEN);
    }

    let strength = passphrase::assess_strength(password);
    if !strength.is_acceptable() {
        if !allow_weak {
            return Err(SecureFileError::with_kind(
                ErrorCategory::User,
                ErrorKind::WeakPassphrase,
                format!(
                    "{} (score {} of 4, need {}); pass --allow-weak-password to use it anyway",
                    strength.feedback,
                    strength.score,
                    passphrase::MIN_STRENGTH_SCORE
                ),
            ));
        }
        warn!(score = strength.score, "{}", strength.feedback);
    }
    Ok(())
}

/// Only the final component of the recorded name is used, so a crafted
/// container cannot direct output outside the input's directory. A recorded
/// name equal to the input's own name falls back to a derived one so the
/// container is never replaced by its plaintext.
fn default_decrypted_path(input_path: &Path, recorded_name: &str) -> PathBuf {
    let dir = input_path.parent().unwrap_or_else(|| Path::new(""));
    let name = Path::new(recorded_name)
        .file_name()
        .filter(|&name| Some(name) != input_path.file_name())
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| fallback_decrypted_name(input_path));
    dir.join(name)
}

fn fallback_decrypted_name(input_path: &Path) -> OsString {
    match input_path.extension() {
        Some(ext) if ext == ENCRYPTED_EXTENSION => input_path
            .file_stem()
            .map(|stem| stem.to_os_string())
            .unwrap_or_else(|| OsString::from("decrypted")),
        _ => {
            let mut name = input_path
                .file_name()
                .map(|name| name.to_os_string())
                .unwrap_or_else(|| OsString::from("decrypted"));
            name.push(".decrypted");
            name
        }
    }
}

fn read_source(path: &Path, max_size: u64) -> Result<Vec<u8>> {
    let metadata = fs::metadata(path).map_err(|e| read_error(path, e))?;
    if metadata.len() > max_size {
        return Err(SecureFileError::with_kind(
            ErrorCategory::User,
            ErrorKind::FileTooLarge,
            format!(
                "{} is {} bytes, larger than the limit of {} bytes",
                path.display(),
                metadata.len(),
                max_size
            ),
        ));
    }
    fs::read(path).map_err(|e| read_error(path, e))
}

/// Write a file atomically (tempfile + fsync + rename) with mode 0o600 on Unix.
///
/// Either the previous file or the complete new file exists afterwards,
/// never a partial one.
fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        SecureFileError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create tempfile in {}", dir.display()),
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        SecureFileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        SecureFileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        SecureFileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| {
                SecureFileError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to set tempfile permissions",
                    e,
                )
            })?;
    }
    temp_file.persist(path).map_err(|e| {
        SecureFileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> SecureFileError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    SecureFileError::with_kind_and_source(
        category,
        ErrorKind::SourceRead,
        format!("failed to read from {}", path.display()),
        err,
    )
}
