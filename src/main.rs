use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fixturegen_lib::{fixtures, strip};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fixturegen", version, about = "Generate and check ID3-tagged FLAC test fixtures")]
struct Cli {
    /// Enable verbose output (useful for debugging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the fixture set: a sine tone encoded to FLAC, copied four
    /// times and tagged with ID3v1/ID3v2 in every combination
    Generate {
        /// Directory to write the fixtures into
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Overwrite fixtures from a previous run
        #[arg(long)]
        force: bool,
    },

    /// Check a previously generated fixture set
    Verify {
        /// Directory holding the fixtures
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Strip ID3v1/ID3v2 metadata from a file
    Strip {
        /// The file to strip the metadata from
        input: PathBuf,

        /// Where to write the stripped data
        output: Option<PathBuf>,

        /// Overwrite the output file if it already exists
        #[arg(short = 'f', long)]
        overwrite: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Command::Generate { dir, force } => {
            fixtures::generate(&dir, &fixtures::FixtureSpec::default(), force)?;
        }
        Command::Verify { dir } => {
            fixtures::verify(&dir, &fixtures::FixtureSpec::default())?;
        }
        Command::Strip {
            input,
            output,
            overwrite,
        } => {
            strip::strip_file(&input, output.as_deref(), overwrite)?;
        }
    }

    Ok(())
}
