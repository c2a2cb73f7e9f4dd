// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fsprep_sys::{FormatConfig, Formatter, PartitionDescriptor};
use serde::Serialize;

/// Identify and format partitions declared in a partition table
#[derive(Parser)]
#[command(name = "fsprep")]
#[command(about = "Identify and format block devices for declared partitions", long_about = None)]
struct Cli {
    /// Builder configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the device holds the declared filesystem
    Identify {
        #[command(flatten)]
        partition: PartitionArgs,
    },
    /// Check for an encryption footer marker
    Encrypted {
        #[command(flatten)]
        partition: PartitionArgs,
        /// Treat the partition as unable to carry encryption
        #[arg(long)]
        not_encryptable: bool,
    },
    /// Print the device size and the range usable by a filesystem
    Geometry {
        /// Block device or image
        #[arg(long)]
        device: PathBuf,
        /// Reserve the trailing footer region
        #[arg(long)]
        footer: bool,
    },
    /// Create a fresh filesystem of the declared type (destroys existing data)
    Format {
        #[command(flatten)]
        partition: PartitionArgs,
    },
}

/// One partition table entry given on the command line
#[derive(Args)]
struct PartitionArgs {
    /// Block device or image
    #[arg(long)]
    device: PathBuf,
    /// Declared filesystem type (ext4, f2fs)
    #[arg(long, default_value = "ext4")]
    fs_type: String,
    /// Mount point recorded for the partition
    #[arg(long, default_value = "/")]
    mount_point: PathBuf,
    /// Key location: "footer" or an absolute path
    #[arg(long, default_value = "")]
    key_loc: String,
}

impl PartitionArgs {
    fn descriptor(&self, encryptable: bool) -> PartitionDescriptor {
        PartitionDescriptor::new(&self.device, self.fs_type.as_str(), &self.mount_point)
            .with_key_location(self.key_loc.as_str())
            .with_encryptable(encryptable)
    }
}

#[derive(Serialize)]
struct EncryptedOutput {
    encrypted: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<FormatConfig> {
    match path {
        Some(path) => FormatConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(FormatConfig::default()),
    }
}

fn main() -> Result<ExitCode> {
    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("fsprep_sys=info,fsprep_cli=info,warn")
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Identify { partition } => {
            let descriptor = partition.descriptor(true);
            let record = fsprep_sys::scan_signature(&descriptor)?;
            print_json(&record)?;
            if !record.matched() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Encrypted {
            partition,
            not_encryptable,
        } => {
            let descriptor = partition.descriptor(!not_encryptable);
            let encrypted = fsprep_sys::scan_encryption_marker(&descriptor);
            print_json(&EncryptedOutput { encrypted })?;
        }
        Commands::Geometry { device, footer } => {
            let geometry = fsprep_sys::resolve(&device, footer)?;
            print_json(&geometry)?;
        }
        Commands::Format { partition } => {
            let config = load_config(cli.config.as_ref())?;
            let descriptor = partition.descriptor(false);
            let outcome = Formatter::new(config).format_outcome(&descriptor);
            print_json(&outcome)?;
            if !outcome.is_success() {
                tracing::error!("Format failed with status {}", outcome.status_code());
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
