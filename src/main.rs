//! spanjoin: joins four `key,payload` files and prints the result rows.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::Level;

use spanjoin::{JoinConfig, Scanner, run};

const USAGE: &str = "usage: spanjoin [-v...] [--scalar] f1.csv f2.csv f3.csv f4.csv";

/// Joins four comma-separated `key,payload` files and writes the rows to stdout.
#[derive(Parser, Debug)]
#[command(name = "spanjoin", version, about, long_about = None)]
struct Cli {
    /// Increase diagnostic verbosity on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use the portable scalar delimiter scanner instead of SIMD
    #[arg(long)]
    scalar: bool,

    /// The four input tables T0 T1 T2 T3
    #[arg(required = true, num_args = 4, value_name = "FILE")]
    inputs: Vec<PathBuf>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    // stdout carries the join result, so diagnostics go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn try_main(cli: Cli) -> Result<()> {
    let scanner = if cli.scalar {
        Scanner::scalar()
    } else {
        Scanner::detect()
    };
    let config = JoinConfig::new().with_scanner(scanner);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(&cli.inputs, &config, &mut out).context("join failed")?;
    out.flush().context("failed flushing stdout")?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(_) => {
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.verbose);

    match try_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
