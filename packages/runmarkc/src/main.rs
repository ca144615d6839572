use std::error::Error;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use runmark_diagnostics::span::FileIdMap;
use runmark_diagnostics::Diagnostics;
use runmark_ir::block::Module;
use runmark_ir::print::print_module;
use runmark_ir::reg::Reg;
use runmark_ir::visitor::Visitor;
use runmark_passes::config::{PassConfig, TerminatorPolicy};
use runmark_passes::insert_markers::PassStats;
use runmark_passes::stats::CollectStats;
use runmark_passes::{parse_file, run_passes};
use tracing_subscriber::EnvFilter;
use yansi::Paint;

pub mod repl;

#[cfg(test)]
mod tests;

/// Marks runs of independent instructions in RISC-V assembly.
#[derive(Debug, Parser)]
pub struct Args {
    /// The assembly file to annotate. Starts an interactive prompt if omitted.
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,
    /// Where to write the annotated assembly. Defaults to stdout.
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// The placeholder register carried by every marker.
    #[arg(long, default_value = "t3", value_parser = parse_reg)]
    carrier: Reg,
    /// How barriers, branches and inline assembly end a run.
    #[arg(long, value_enum, default_value_t = Policy::FlushAndSkip)]
    policy: Policy,
    /// Print pass and instruction statistics to stderr.
    #[arg(long)]
    stats: bool,
    #[arg(long, value_enum, default_value_t = Color::Auto)]
    color: Color,
    /// Log the pass. `-v` for every block, `-vv` for every instruction.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    FlushAndSkip,
    Ordinary,
}

impl From<Policy> for TerminatorPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::FlushAndSkip => TerminatorPolicy::FlushAndSkip,
            Policy::Ordinary => TerminatorPolicy::Ordinary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Color {
    Auto,
    Always,
    Never,
}

fn parse_reg(name: &str) -> Result<Reg, String> {
    Reg::from_name(name).ok_or_else(|| format!("`{name}` is not a register"))
}

/// How a run ended when nothing went wrong outside the input itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    /// The input had errors. They were already printed as diagnostics.
    Reported,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Reported => ExitCode::FAILURE,
        }
    }
}

fn main() -> ExitCode {
    match entry() {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn entry() -> Result<Outcome, Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.verbose);
    init_color(args.color);
    let config = PassConfig {
        carrier: args.carrier,
        policy: args.policy.into(),
    };

    match args.input {
        Some(input) => annotate_file(&input, args.output.as_deref(), &config, args.stats),
        None => {
            repl::start_repl(&config, args.stats)?;
            Ok(Outcome::Success)
        }
    }
}

/// Annotate one file and write it to `output`, or to stdout.
fn annotate_file(
    input: &Path,
    output: Option<&Path>,
    config: &PassConfig,
    show_stats: bool,
) -> Result<Outcome, Box<dyn Error>> {
    let diagnostics = Diagnostics::default();
    let mut map = FileIdMap::new();
    let parsed = parse_file(input, &mut map, diagnostics.clone());
    if !diagnostics.eprint(&map) {
        return Ok(Outcome::Reported);
    }
    let mut parsed = parsed?;

    let stats = run_passes(&mut parsed.module, config);
    tracing::info!(file = %parsed.name, markers = stats.markers, "annotated");

    match output {
        Some(path) => std::fs::write(path, parsed.module.to_string())?,
        None => print_module(&parsed.module, &mut io::stdout().lock())?,
    }
    if show_stats {
        eprint_stats(&parsed.module, &stats);
    }
    Ok(Outcome::Success)
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::from_default_env(),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Colors of the printed assembly follow stdout, colors of diagnostics follow stderr.
fn init_color(color: Color) {
    match color {
        Color::Auto => {
            if !io::stdout().is_terminal() {
                Paint::disable();
            }
        }
        Color::Always => concolor::set(concolor::ColorChoice::Always),
        Color::Never => {
            Paint::disable();
            concolor::set(concolor::ColorChoice::Never);
        }
    }
}

fn eprint_stats(module: &Module, stats: &PassStats) {
    let mut collect = CollectStats::new();
    collect.visit_module(module);
    eprintln!("{stats}");
    eprintln!("{collect}");
}
