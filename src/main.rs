use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qsched::cmd;

/// Replay a scheduler command stream and answer historical queue queries.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a command stream; stdin when absent
    input: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    // Diagnostics go to stderr; stdout carries only emitted job lines.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let output = BufWriter::new(io::stdout().lock());
    match args.input {
        Some(path) => cmd::replay(BufReader::new(File::open(path)?), output),
        None => cmd::replay(io::stdin().lock(), output),
    }
}
