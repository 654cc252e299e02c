//! Command-line front end: decode captured agent streams and normalize stored
//! histories.

mod commands;
mod env;

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chatflow_messages::{Normalizer, NormalizerConfig};
use chatflow_stream::DecoderConfig;
use chatflow_stream::observability::init_observability;
use clap::{Parser, Subcommand};

use crate::commands::DecodeOptions;

#[derive(Parser, Debug)]
#[command(name = "chatflow")]
#[command(about = "Decode agent event streams and normalize chat histories")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a captured stream into one JSON event per line.
    Decode {
        /// Stream capture; stdin when omitted.
        file: Option<PathBuf>,
        /// Feed the input in slices of this many bytes.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Also print the normalized message assembled from the stream.
        #[arg(long, default_value_t = false)]
        record: bool,
    },
    /// Normalize a stored history payload into display-ready messages.
    Normalize {
        /// History payload (JSON).
        file: PathBuf,
    },
}

fn open_input(file: Option<&PathBuf>) -> Result<Box<dyn Read>> {
    match file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn main() -> Result<()> {
    env::init();
    init_observability();
    let args = Args::parse();

    let normalizer = Normalizer::new(
        NormalizerConfig::from_env().context("invalid normalizer configuration")?,
    );
    let stdout = io::stdout().lock();
    match args.command {
        Command::Decode {
            file,
            chunk_size,
            record,
        } => {
            let config = DecoderConfig::from_env().context("invalid decoder configuration")?;
            commands::decode(
                open_input(file.as_ref())?,
                stdout,
                config,
                &normalizer,
                &DecodeOptions { chunk_size, record },
            )
        }
        Command::Normalize { file } => {
            commands::normalize(open_input(Some(&file))?, stdout, &normalizer)
        }
    }
}
