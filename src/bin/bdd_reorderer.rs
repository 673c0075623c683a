//! `bdd-reorderer` (spec §6.1): given an anchor, lists the legal reorder
//! candidates below it, or applies a caller-supplied list of
//! `(anchor_id, direction, candidate_id)` ops in order.

use clap::Parser;
use nf_synth::error::{BddError, ReorderOpError};
use nf_synth::expr::Oracle;
use nf_synth::reorder::{self, Anchor};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

/// One `anchor_id,direction,candidate_id` triple from `--apply`.
#[derive(Debug, Clone, Copy)]
struct ApplyOp {
    anchor: u64,
    dir: bool,
    candidate: u64,
}

impl std::str::FromStr for ApplyOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        let [anchor, dir, candidate] = parts[..] else {
            return Err(format!("expected `anchor_id,direction,candidate_id`, got `{s}`"));
        };
        Ok(ApplyOp {
            anchor: anchor.parse().map_err(|_| format!("bad anchor id `{anchor}`"))?,
            dir: dir.parse().map_err(|_| format!("bad direction `{dir}` (want true/false)"))?,
            candidate: candidate.parse().map_err(|_| format!("bad candidate id `{candidate}`"))?,
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "bdd-reorderer")]
#[command(about = "List or apply legality-checked BDD reorder operations")]
struct Args {
    /// Serialised BDD to load (spec §6.2 text format).
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Anchor node id to list candidates below, when not applying ops.
    #[arg(long = "anchor")]
    anchor: Option<u64>,

    /// Direction below the anchor (ignored if the anchor isn't a Branch).
    #[arg(long = "dir", default_value_t = true)]
    dir: bool,

    /// Allow rewrites that change the BDD's shape, not just reorder it.
    #[arg(long = "allow-shape-altering")]
    allow_shape_altering: bool,

    /// Apply this `anchor_id,direction,candidate_id` op; repeatable, applied
    /// in order. When present, overrides the listing behaviour.
    #[arg(long = "apply", value_name = "OP")]
    apply: Vec<ApplyOp>,

    /// Serialise the result here after applying ops.
    #[arg(long = "out", value_name = "FILE")]
    output: Option<PathBuf>,

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

fn run(args: Args) -> Result<(), ReorderOpError> {
    let text = fs::read_to_string(&args.input).map_err(BddError::from)?;
    let mut bdd = nf_synth::bdd::io::read_bdd(&text).map_err(BddError::from)?;
    bdd.assert_invariants().map_err(BddError::from)?;
    let oracle = Oracle::default();

    if !args.apply.is_empty() {
        for op in &args.apply {
            if bdd.get_node_by_id(op.candidate).is_none() {
                return Err(ReorderOpError::UnknownNodeId(op.candidate));
            }
            let anchor = Anchor::new(op.anchor, op.dir);
            let info = reorder::check_candidate(&bdd, &oracle, anchor, op.candidate);
            if info.status != reorder::ReorderStatus::Valid {
                return Err(ReorderOpError::NotValid(info.status));
            }
            debug!(anchor = op.anchor, candidate = op.candidate, "applying reorder");
            bdd = reorder::apply_reorder(&bdd, anchor, &info);
        }
        info!(ops = args.apply.len(), "applied all reorder ops");
    } else if let Some(anchor_id) = args.anchor {
        let anchor = Anchor::new(anchor_id, args.dir);
        let candidates = reorder::get_reorder_ops(&bdd, &oracle, anchor, args.allow_shape_altering);
        println!("{} candidate(s) below anchor {anchor_id} (dir={}):", candidates.len(), args.dir);
        for c in &candidates {
            println!("  candidate {} -> {:?} (guard={:?})", c.id, c.status, c.guard.is_some());
        }
    } else {
        println!("no --anchor given; pass --anchor <id> to list candidates, or --apply to rewrite");
    }

    if let Some(out) = &args.output {
        let text = nf_synth::bdd::io::write_bdd(&bdd);
        fs::write(out, text).map_err(BddError::from)?;
        info!(path = %out.display(), "wrote reordered BDD");
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    install_tracing(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("bdd-reorderer: {e}");
            ExitCode::from(1)
        }
    }
}
