//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const PASSWORD: &str = "correct horse battery staple";

/// Run securefile with password from stdin
fn run_securefile_with_password(args: &[&str], password: &str) -> Result<Output, std::io::Error> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_securefile"))
        .arg("--passphrase-stdin")
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., file not found)
        let _ = stdin.write_all(password.as_bytes());
    }

    child.wait_with_output()
}

/// Get path to testdata directory
fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push(filename);
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn assert_success(result: &Output, what: &str) {
    assert!(
        result.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&result.stderr)
    );
}

fn encrypt(input: &Path, output: &Path, password: &str) {
    let result = run_securefile_with_password(
        &["encrypt", "-i", path_str(input), "-o", path_str(output)],
        password,
    )
    .unwrap();
    assert_success(&result, "encrypt");
}

fn decrypt(input: &Path, output: &Path, password: &str) -> Output {
    run_securefile_with_password(
        &["decrypt", "-i", path_str(input), "-o", path_str(output)],
        password,
    )
    .unwrap()
}

/// Decrypt a container produced independently of this crate.
#[test]
fn test_decrypt_known_container() {
    let temp_dir = TempDir::new().unwrap();
    let container = temp_dir.path().join("hello.txt.encrypted");
    fs::copy(testdata_path("hello.txt.encrypted"), &container).unwrap();

    // No -o: the recorded name is used beside the input.
    let result =
        run_securefile_with_password(&["decrypt", "-i", path_str(&container)], "test").unwrap();
    assert_success(&result, "decrypt");

    let output = temp_dir.path().join("hello.txt");
    assert_eq!(
        String::from_utf8_lossy(&result.stdout).trim(),
        path_str(&output)
    );
    let decrypted = fs::read_to_string(&output).unwrap();
    let expected = fs::read_to_string(testdata_path("hello.txt")).unwrap();
    assert_eq!(decrypted, expected);
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext_path = testdata_path("hello.txt");
    let encrypted_path = temp_dir.path().join("hello.txt.encrypted");
    let decrypted_path = temp_dir.path().join("hello-decrypted.txt");

    encrypt(&plaintext_path, &encrypted_path, PASSWORD);
    let result = decrypt(&encrypted_path, &decrypted_path, PASSWORD);
    assert_success(&result, "decrypt");

    let original = fs::read_to_string(&plaintext_path).unwrap();
    let decrypted = fs::read_to_string(&decrypted_path).unwrap();
    assert_eq!(original, decrypted);
}

#[test]
fn test_encrypt_default_output_name() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("notes.txt");
    fs::write(&plaintext, "some notes").unwrap();

    let result =
        run_securefile_with_password(&["e", "-i", path_str(&plaintext)], PASSWORD).unwrap();
    assert_success(&result, "encrypt");
    assert!(temp_dir.path().join("notes.txt.encrypted").exists());
}

#[test]
fn test_weak_password_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("plain.txt");
    let encrypted = temp_dir.path().join("plain.txt.encrypted");
    fs::write(&plaintext, "data").unwrap();

    let result = run_securefile_with_password(
        &["encrypt", "-i", path_str(&plaintext), "-o", path_str(&encrypted)],
        "test",
    )
    .unwrap();
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("--allow-weak-password"), "got: {}", stderr);
    assert!(!encrypted.exists());

    let result = run_securefile_with_password(
        &[
            "encrypt",
            "-i",
            path_str(&plaintext),
            "-o",
            path_str(&encrypted),
            "--allow-weak-password",
        ],
        "test",
    )
    .unwrap();
    assert_success(&result, "encrypt");
    assert!(encrypted.exists());
}

#[test]
fn test_decrypt_with_wrong_password_fails() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("plain.txt");
    let encrypted = temp_dir.path().join("plain.txt.encrypted");
    let decrypted = temp_dir.path().join("decrypted.txt");

    fs::write(&plaintext, "Original").unwrap();
    encrypt(&plaintext, &encrypted, PASSWORD);

    let result = decrypt(&encrypted, &decrypted, "wrong password entirely");
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("Error:") && (stderr.contains("password") || stderr.contains("integrity")),
        "Expected error message about password/integrity, got: {}",
        stderr
    );
    assert!(!decrypted.exists());
}

#[test]
fn test_decrypt_nonexistent_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let nonexistent = temp_dir.path().join("nonexistent.encrypted");
    let output = temp_dir.path().join("output.txt");

    let result = decrypt(&nonexistent, &output, PASSWORD);
    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn test_decrypt_garbage_fails() {
    let temp_dir = TempDir::new().unwrap();
    let garbage = temp_dir.path().join("garbage.encrypted");
    let output = temp_dir.path().join("output.txt");
    fs::write(&garbage, b"this is not a container").unwrap();

    let result = decrypt(&garbage, &output, PASSWORD);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).starts_with("Error:"));
    assert!(!output.exists());
}

#[test]
fn test_inspect() {
    let result = run_securefile_with_password(
        &["inspect", "-i", path_str(&testdata_path("hello.txt.encrypted"))],
        "",
    )
    .unwrap();
    assert_success(&result, "inspect");

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("file name: hello.txt"), "got: {}", stdout);
    assert!(stdout.contains("file size: 18"), "got: {}", stdout);
    assert!(stdout.contains("file type: text/plain"), "got: {}", stdout);
    assert!(stdout.contains("version:   1.0"), "got: {}", stdout);
}

#[test]
fn test_custom_iterations_must_match() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("plain.txt");
    let encrypted = temp_dir.path().join("plain.txt.encrypted");
    let decrypted = temp_dir.path().join("decrypted.txt");
    fs::write(&plaintext, "iterated").unwrap();

    let result = run_securefile_with_password(
        &[
            "encrypt",
            "-i",
            path_str(&plaintext),
            "-o",
            path_str(&encrypted),
            "--iterations",
            "2000",
        ],
        PASSWORD,
    )
    .unwrap();
    assert_success(&result, "encrypt");

    let result = decrypt(&encrypted, &decrypted, PASSWORD);
    assert!(!result.status.success());

    let result = run_securefile_with_password(
        &[
            "decrypt",
            "-i",
            path_str(&encrypted),
            "-o",
            path_str(&decrypted),
            "--iterations",
            "2000",
        ],
        PASSWORD,
    )
    .unwrap();
    assert_success(&result, "decrypt");
    assert_eq!(fs::read_to_string(&decrypted).unwrap(), "iterated");
}

#[test]
fn test_max_size_enforced() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("big.bin");
    fs::write(&plaintext, vec![0u8; 2048]).unwrap();

    let result = run_securefile_with_password(
        &["encrypt", "-i", path_str(&plaintext), "--max-size", "1024"],
        PASSWORD,
    )
    .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("larger than the limit"));
}

#[test]
fn test_decrypt_max_size_enforced() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("data.bin");
    let encrypted = temp_dir.path().join("data.bin.encrypted");
    let decrypted = temp_dir.path().join("decrypted.bin");
    fs::write(&plaintext, vec![7u8; 2048]).unwrap();
    encrypt(&plaintext, &encrypted, PASSWORD);

    let result = run_securefile_with_password(
        &[
            "decrypt",
            "-i",
            path_str(&encrypted),
            "-o",
            path_str(&decrypted),
            "--max-size",
            "1024",
        ],
        PASSWORD,
    )
    .unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("larger than the limit"));
    assert!(!decrypted.exists());
}

#[test]
fn test_short_password_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("plain.txt");
    fs::write(&plaintext, "data").unwrap();

    let result =
        run_securefile_with_password(&["encrypt", "-i", path_str(&plaintext)], "Ab1!xyz").unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("at least 8"));
    assert!(!temp_dir.path().join("plain.txt.encrypted").exists());
}

#[test]
fn test_empty_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("empty.txt");
    let encrypted = temp_dir.path().join("empty.txt.encrypted");
    let decrypted = temp_dir.path().join("empty-decrypted.txt");

    fs::write(&plaintext, b"").unwrap();
    encrypt(&plaintext, &encrypted, PASSWORD);
    let result = decrypt(&encrypted, &decrypted, PASSWORD);
    assert_success(&result, "decrypt");

    let content = fs::read(&decrypted).unwrap();
    assert_eq!(content, b"");
}

#[test]
fn test_large_file_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let plaintext = temp_dir.path().join("large.txt");
    let encrypted = temp_dir.path().join("large.txt.encrypted");
    let decrypted = temp_dir.path().join("large-decrypted.txt");

    let large_content = vec![0x42u8; 3 * 1024 * 1024 + 7];
    fs::write(&plaintext, &large_content).unwrap();

    encrypt(&plaintext, &encrypted, PASSWORD);
    let result = decrypt(&encrypted, &decrypted, PASSWORD);
    assert_success(&result, "decrypt");

    let decrypted_content = fs::read(&decrypted).unwrap();
    assert_eq!(decrypted_content, large_content);
}
