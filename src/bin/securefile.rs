//! securefile CLI - Password-based file encryption
//!
//! Command-line interface for encrypting files into AES-256-CBC containers
//! and restoring them.

use clap::{ArgAction, Parser, Subcommand};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use securefile::file_ops::{self, DecryptSettings, EncryptSettings};
use securefile::kdf;
use securefile::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use securefile::pipeline::Options;

#[derive(Parser)]
#[command(name = "securefile")]
#[command(version)]
#[command(about = "Password-based file encryption.", long_about = None)]
struct Cli {
    /// Read password from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the container to [default: <input>.encrypted]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Content type recorded in the container
        #[arg(long, value_name = "TYPE", default_value = "")]
        content_type: String,

        /// Accept a password that fails the strength check
        #[arg(long)]
        allow_weak_password: bool,

        /// PBKDF2 iteration count
        #[arg(long, value_name = "N", default_value_t = kdf::DEFAULT_ITERATIONS)]
        iterations: NonZeroU32,

        /// Largest input accepted, in bytes
        #[arg(long, value_name = "BYTES", default_value_t = file_ops::DEFAULT_MAX_FILE_SIZE)]
        max_size: u64,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the container to decrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the plaintext to [default: recorded name beside the input]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write the plaintext even if it fails the integrity check
        #[arg(long)]
        keep_unverified: bool,

        /// PBKDF2 iteration count used when the container was created
        #[arg(long, value_name = "N", default_value_t = kdf::DEFAULT_ITERATIONS)]
        iterations: NonZeroU32,

        /// Largest container accepted, in bytes
        #[arg(long, value_name = "BYTES", default_value_t = file_ops::DEFAULT_MAX_CONTAINER_SIZE)]
        max_size: u64,
    },

    /// Print the metadata of a container without decrypting it
    Inspect {
        /// Path to the container
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut progress = |percent: u8| debug!(percent, "progress");

    let result = match cli.command {
        Commands::Encrypt {
            input,
            output,
            content_type,
            allow_weak_password,
            iterations,
            max_size,
        } => {
            let settings = EncryptSettings {
                options: Options { iterations },
                content_type,
                allow_weak_password,
                max_file_size: max_size,
            };
            let mut reader = get_passphrase_reader(cli.passphrase_stdin, true);
            file_ops::encrypt_path(
                &input,
                output.as_deref(),
                &mut *reader,
                &settings,
                &mut progress,
            )
            .map(|path| println!("{}", path.display()))
        }
        Commands::Decrypt {
            input,
            output,
            keep_unverified,
            iterations,
            max_size,
        } => {
            let settings = DecryptSettings {
                options: Options { iterations },
                keep_unverified,
                max_file_size: max_size,
            };
            let mut reader = get_passphrase_reader(cli.passphrase_stdin, false);
            file_ops::decrypt_path(
                &input,
                output.as_deref(),
                &mut *reader,
                &settings,
                &mut progress,
            )
            .map(|report| {
                if !report.integrity_valid {
                    eprintln!("Warning: integrity check failed; output is unverified");
                }
                println!("{}", report.output.display());
            })
        }
        Commands::Inspect { input } => file_ops::inspect_path(&input).map(|metadata| {
            println!("file name: {}", metadata.file_name);
            println!("file size: {}", metadata.file_size);
            println!("file type: {}", metadata.file_type);
            println!("sha-256:   {}", metadata.hash);
            println!("version:   {}", metadata.version);
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e.chain_message());
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn get_passphrase_reader(use_stdin: bool, confirm: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else if confirm {
        Box::new(TerminalPassphraseReader::with_confirmation())
    } else {
        Box::new(TerminalPassphraseReader::new())
    }
}
