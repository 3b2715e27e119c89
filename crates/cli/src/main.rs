use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use patchguard::commands::{
    aborted_output, init_policy_command, locate_command, resolve_policy, symbols_command,
    validate_command,
};
use patchguard::{init_logging, parse_offset};
use patchguard_core::PatchPolicy;
use tracing::error;

/// Validator for small, function-local patches to an executable.
///
/// This CLI is a thin wrapper around `patchguard-core` (exposed in code as
/// `patchguard_core`). All substantive logic lives in the library.
#[derive(Parser, Debug)]
#[command(
    name = "patchguard",
    version,
    about = "Check that a patched binary only touches permitted functions",
    long_about = None
)]
struct Cli {
    /// Log at debug level to stderr (overrides PATCHGUARD_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Policy knobs shared by every command that judges functions.
#[derive(Args, Debug)]
struct PolicyArgs {
    /// YAML or JSON policy file; explicit flags below override its fields.
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Maximum number of differing bytes tolerated (default 200).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_changes: Option<u64>,

    /// Substring every patched function name must contain (default `babi`).
    #[arg(long)]
    required_marker: Option<String>,

    /// Substring that rejects a patched function outright. Repeatable; given
    /// at least once, it replaces the file's (or default `main`,
    /// `signal_handler`) markers.
    #[arg(long = "deny")]
    deny: Vec<String>,

    /// Clear every denied marker, including those from the policy file.
    #[arg(long, default_value_t = false, conflicts_with = "deny")]
    no_deny: bool,
}

impl PolicyArgs {
    fn resolve(self) -> Result<PatchPolicy> {
        resolve_policy(
            self.policy.as_deref(),
            self.max_changes.map(|m| m as usize),
            self.required_marker,
            self.deny,
            self.no_deny,
        )
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a patched image against its original.
    ///
    /// Prints one line per patched byte followed by `all good` and exits 0,
    /// or prints a single `PUBLIC: <reason>` line and exits 1.
    Validate {
        /// Patched image.
        #[arg(default_value = "/babi")]
        modified: String,

        /// Unpatched original image.
        #[arg(default_value = "/babi.orig")]
        original: String,

        #[command(flatten)]
        policy: PolicyArgs,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the function symbols of an ELF image.
    Symbols {
        /// Image to inspect.
        image: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show which function a file offset belongs to and whether it may be patched.
    Locate {
        /// Image to inspect (normally the original).
        image: String,

        /// File offset, decimal or 0x-prefixed hex.
        #[arg(long, value_parser = parse_offset_arg)]
        offset: u64,

        #[command(flatten)]
        policy: PolicyArgs,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write the default policy to a YAML or JSON file.
    InitPolicy {
        /// Destination; the extension picks the format.
        #[arg(long, default_value = "patchguard.yaml")]
        path: String,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn parse_offset_arg(raw: &str) -> Result<u64, String> {
    parse_offset(raw).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Validate { modified, original, policy, json } => {
            let outcome =
                policy.resolve().and_then(|policy| validate_command(&modified, &original, policy, json));
            match outcome {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => ExitCode::FAILURE,
                Err(err) => {
                    // Configuration problems still surface as a single public line.
                    error!("validation aborted: {err:#}");
                    println!("{}", aborted_output(&err, json));
                    ExitCode::FAILURE
                }
            }
        }
        Command::Symbols { image, json } => report(symbols_command(&image, json)),
        Command::Locate { image, offset, policy, json } => {
            report(policy.resolve().and_then(|policy| locate_command(&image, offset, &policy, json)))
        }
        Command::InitPolicy { path, force } => report(init_policy_command(&path, force)),
    }
}

fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
