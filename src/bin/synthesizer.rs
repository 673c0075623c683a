//! `synthesizer` (spec §6.1): runs the execution-plan search over a loaded
//! BDD against a selected target set and writes a debug pretty-print of the
//! winning plan (no working code-emitter backend; spec non-goals).

use clap::{Parser, ValueEnum};
use nf_synth::error::{BddError, SearchError};
use nf_synth::expr::Oracle;
use nf_synth::placement::{PlacementContext, Target};
use nf_synth::search::{self, pretty_print};
use nf_synth::targets::{fresh_target_ctx, TargetDef};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TargetArg {
    HostCpu,
    SwitchAsic,
    ControlCpu,
}

impl From<TargetArg> for Target {
    fn from(t: TargetArg) -> Self {
        match t {
            TargetArg::HostCpu => Target::HostCpu,
            TargetArg::SwitchAsic => Target::SwitchAsic,
            TargetArg::ControlCpu => Target::ControlCpu,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "synthesizer")]
#[command(about = "Search for a placed, per-target execution plan over a BDD")]
struct Args {
    /// Serialised BDD to load (spec §6.2 text format).
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Targets the search may place nodes on; repeatable, defaults to all
    /// three supplemented targets.
    #[arg(long = "target", value_enum)]
    targets: Vec<TargetArg>,

    /// The target a fresh EP starts on.
    #[arg(long = "initial-target", value_enum, default_value = "host-cpu")]
    initial_target: TargetArg,

    /// Cap on driver-loop expansions before returning the best plan found
    /// so far (spec §7 "search exhaustion").
    #[arg(long = "max-expansions", default_value_t = 10_000)]
    max_expansions: usize,

    /// Write the winning plan's debug pretty-print here (stdout if absent).
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

fn run(args: Args) -> Result<(), SearchError> {
    let text = fs::read_to_string(&args.input).map_err(BddError::from)?;
    let bdd = nf_synth::bdd::io::read_bdd(&text).map_err(BddError::from)?;
    bdd.assert_invariants().map_err(BddError::from)?;
    let bdd = Arc::new(bdd);

    let selected: Vec<Target> = if args.targets.is_empty() {
        vec![Target::HostCpu, Target::SwitchAsic, Target::ControlCpu]
    } else {
        args.targets.iter().copied().map(Target::from).collect()
    };
    if selected.is_empty() {
        return Err(SearchError::NoTargetsConfigured);
    }

    let defs: Vec<TargetDef> = selected
        .iter()
        .map(|t| match t {
            Target::HostCpu => TargetDef::host_cpu(),
            Target::SwitchAsic => TargetDef::switch_asic(),
            Target::ControlCpu => TargetDef::control_cpu(),
        })
        .collect();

    let mut target_ctxs = BTreeMap::new();
    for t in &selected {
        target_ctxs.insert(*t, fresh_target_ctx(*t));
    }
    let mut context = PlacementContext::new(target_ctxs);
    context.load_configs_from_prelude(&bdd.init_prelude, &Oracle::default());

    let oracle = Oracle::default();
    let initial_target: Target = args.initial_target.into();
    info!(targets = selected.len(), initial = %initial_target, "starting search");

    let outcome = search::search(Arc::clone(&bdd), context, initial_target, &defs, &oracle, args.max_expansions);
    let Some(outcome) = outcome else {
        return Err(SearchError::NoPlanFound);
    };

    if outcome.partial {
        eprintln!("synthesizer: returned plan is partial (expansion cap reached)");
    }
    let rendered = pretty_print(&outcome.best);

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered).map_err(BddError::from)?;
            info!(path = %path.display(), "wrote execution plan");
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    install_tracing(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ (SearchError::NoTargetsConfigured | SearchError::NoPlanFound)) => {
            eprintln!("synthesizer: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("synthesizer: {e}");
            ExitCode::from(1)
        }
    }
}
