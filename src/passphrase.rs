//! Password input and strength policy

use crate::error::{ErrorCategory, ErrorKind, Result, SecureFileError};
use std::collections::HashSet;
use std::io::{self, IsTerminal, Read};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Lowest [`Strength::score`] accepted for new containers unless overridden.
pub const MIN_STRENGTH_SCORE: u8 = 2;

/// Trait for reading passphrases from various sources
pub trait PassphraseReader {
    /// Read a passphrase as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the passphrase wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed passphrase (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}

/// Reads passphrase from any io::Read source
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            SecureFileError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "error reading password",
                e,
            )
        })?;
        Ok(data)
    }
}

/// Reads passphrase from terminal with no echo
pub struct TerminalPassphraseReader {
    confirm: bool,
}

impl TerminalPassphraseReader {
    pub fn new() -> Self {
        Self { confirm: false }
    }

    /// Prompt a second time and fail unless both entries match. Used when
    /// creating a container, where a typo would make it unrecoverable.
    pub fn with_confirmation() -> Self {
        Self { confirm: true }
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read passphrase from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    /// For non-UTF-8 passphrases, use --passphrase-stdin instead.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(SecureFileError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        let passphrase = prompt("Password (securefile): ")?;
        if self.confirm {
            let again = prompt("Confirm password: ")?;
            if !bool::from(passphrase.as_slice().ct_eq(again.as_slice())) {
                return Err(SecureFileError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::PassphraseMismatch,
                    "passwords do not match",
                ));
            }
        }
        Ok(passphrase)
    }
}

fn prompt(text: &str) -> Result<Zeroizing<Vec<u8>>> {
    // rpassword returns String (UTF-8 only), not zeroized
    let passphrase = rpassword::prompt_password(text).map_err(|e| {
        SecureFileError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::PassphraseUnavailable,
            "failure reading password",
            e,
        )
    })?;
    Ok(Zeroizing::new(passphrase.into_bytes()))
}

/// Result of [`assess_strength`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strength {
    /// 0 (none) to 4 (strong).
    pub score: u8,
    pub feedback: &'static str,
}

impl Strength {
    pub fn is_acceptable(&self) -> bool {
        self.score >= MIN_STRENGTH_SCORE
    }
}

/// Password length in UTF-16 code units, the unit browser front ends count
/// in. Characters outside the Basic Multilingual Plane count as two.
/// Non-UTF-8 input is measured on its lossy decoding.
pub fn password_length(password: &[u8]) -> usize {
    String::from_utf8_lossy(password).encode_utf16().count()
}

/// Scores a password from 0 to 4.
///
/// Length ([`password_length`]) earns up to two points (12+ characters one, 16+ two). Each class of
/// uppercase, lowercase, digit and other characters earns half a point, and
/// more than 5 / 10 distinct characters earn half / one point. The total is
/// rounded down and capped at 4. Non-UTF-8 input is scored on its lossy
/// decoding.
pub fn assess_strength(password: &[u8]) -> Strength {
    let text = String::from_utf8_lossy(password);
    if text.is_empty() {
        return Strength {
            score: 0,
            feedback: "",
        };
    }

    // Counted in half points.
    let mut halves = 0u32;
    let len = text.encode_utf16().count();
    let too_short = len < 8;
    if len >= 16 {
        halves += 4;
    } else if len >= 12 {
        halves += 2;
    }

    if text.chars().any(|c| c.is_ascii_uppercase()) {
        halves += 1;
    }
    if text.chars().any(|c| c.is_ascii_lowercase()) {
        halves += 1;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        halves += 1;
    }
    if text.chars().any(|c| !c.is_ascii_alphanumeric()) {
        halves += 1;
    }

    let unique = text.chars().collect::<HashSet<_>>().len();
    if unique > 10 {
        halves += 2;
    } else if unique > 5 {
        halves += 1;
    }

    let score = (halves / 2).min(4) as u8;
    let feedback = match score {
        0 | 1 if too_short => "Password is too short",
        0 | 1 => "Password is weak",
        2 => "Password is fair",
        3 => "Password is good",
        _ => "Password is strong",
    };
    Strength { score, feedback }
}
