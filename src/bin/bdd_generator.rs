//! `bdd-generator` (spec §6.1): loads a serialised BDD (`--in`) or one or
//! more call-path files (positional args), checks its invariants, and
//! optionally serialises it back out (`--out`).

use clap::Parser;
use nf_synth::error::BddError;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "bdd-generator")]
#[command(about = "Load or build a call-path BDD, check its invariants, and serialise it")]
struct Args {
    /// Load an already-serialised BDD (spec §6.2 text format).
    #[arg(long = "in", value_name = "FILE")]
    input: Option<PathBuf>,

    /// Build from one or more call-path files instead of `--in`.
    #[arg(value_name = "CALLPATH")]
    call_paths: Vec<PathBuf>,

    /// Serialise the resulting BDD here.
    #[arg(long = "out", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Repeat for more verbose logging (`-v` info, `-vv` debug).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn install_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    let _ = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).try_init();
}

fn run(args: Args) -> Result<(), BddError> {
    let bdd = if let Some(path) = &args.input {
        info!(path = %path.display(), "loading serialised BDD");
        let text = fs::read_to_string(path)?;
        nf_synth::bdd::io::read_bdd(&text)?
    } else if !args.call_paths.is_empty() {
        if args.call_paths.len() > 1 {
            // Merging independently-explored call paths into one shared-prefix
            // BDD is the KLEE-trace-diffing front end's job (spec §4.2
            // "canonicalization-during-loading is out of scope... loader is an
            // external collaborator"); this CLI only accepts a single
            // already-built path per invocation.
            return Err(BddError::NoInput);
        }
        let path = &args.call_paths[0];
        info!(path = %path.display(), "loading single call-path file");
        let text = fs::read_to_string(path)?;
        nf_synth::bdd::io::read_bdd(&text)?
    } else {
        return Err(BddError::NoInput);
    };

    debug!(nodes = bdd.node_count_total(), "checking BDD invariants");
    bdd.assert_invariants()?;
    info!(nodes = bdd.node_count_total(), "BDD invariants hold");

    if let Some(out) = &args.output {
        let text = nf_synth::bdd::io::write_bdd(&bdd);
        fs::write(out, text)?;
        info!(path = %out.display(), "wrote serialised BDD");
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    install_tracing(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bdd-generator: {e}");
            ExitCode::from(1)
        }
    }
}
