//! CLI for the banded conjugate gradient solver

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use colored::*;
use tracing::debug;
use tracing_subscriber::prelude::*;

use bandcg_solver::driver::{run_with, RunOptions};
use bandcg_solver::report::{format_g, write_json_report, write_text_report, RunReport};
use bandcg_solver::types::{SolverConfig, Termination, DEFAULT_SEED, UNSET_TOLERANCE};

#[derive(Parser)]
#[command(name = "bandcg")]
#[command(about = "Solve a random symmetric banded system with conjugate gradient", long_about = None)]
#[command(version)]
struct Cli {
    /// Dimension of the linear system
    n: usize,

    /// Number of bands of A (odd, at most n / 2)
    bandwidth: usize,

    /// Report file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Iteration budget (default: n)
    #[arg(short = 'i', long = "max-iter")]
    max_iter: Option<usize>,

    /// Stop once the approximate error drops to this value (<= 0 disables)
    #[arg(short, long, default_value_t = UNSET_TOLERANCE, allow_negative_numbers = true)]
    tolerance: f64,

    /// Seed for the random matrix
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Use the row-parallel matrix-vector product (needs the parallel feature)
    #[arg(long)]
    parallel: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn write_report<W: Write>(out: &mut W, report: &RunReport, format: Format) -> anyhow::Result<()> {
    match format {
        Format::Text => write_text_report(out, report)?,
        Format::Json => write_json_report(out, report)?,
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so the report can own stdout.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut config = SolverConfig::new(cli.n, cli.bandwidth)
        .with_tolerance(cli.tolerance)
        .with_seed(cli.seed);
    if let Some(max_iter) = cli.max_iter {
        config = config.with_max_iterations(max_iter);
    }
    debug!(?config, format = ?cli.format, parallel = cli.parallel, "parsed arguments");

    eprintln!(
        "{} Solving n = {}, bandwidth = {}, max_iter = {}...",
        "→".green().bold(),
        config.n.to_string().cyan(),
        config.bandwidth.to_string().cyan(),
        config.max_iterations
    );

    let report = run_with(
        &config,
        RunOptions {
            row_parallel: cli.parallel,
        },
    )
    .context("solver run failed")?;

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create output file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_report(&mut writer, &report, cli.format)?;
            eprintln!(
                "{} Report written to {}",
                "✓".green().bold(),
                path.display().to_string().cyan()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_report(&mut lock, &report, cli.format)?;
        }
    }

    let outcome = &report.outcome;
    let status = match outcome.termination {
        Termination::Converged => "converged".green().bold(),
        Termination::Exhausted => "exhausted".yellow().bold(),
    };
    eprintln!(
        "{} {} after {} iterations",
        "✓".green().bold(),
        status,
        outcome.iterations
    );
    eprintln!("  Residual norm: {}", format_g(outcome.final_residual_norm, 6));
    eprintln!("  Approx. error: {}", format_g(outcome.final_error, 6));
    eprintln!("  Assembly:      {} ms", format_g(report.assembly_time_ms, 6));
    if let Some(cg) = report.cg_time_stats() {
        eprintln!(
            "  CG step (ms):  min {} avg {} max {}",
            format_g(cg.min, 6),
            format_g(cg.avg, 6),
            format_g(cg.max, 6)
        );
    }
    eprintln!("  SIMD kernels:  {}", if report.simd { "avx2+fma" } else { "portable" });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_unset_run() {
        let cli = Cli::try_parse_from(["bandcg", "100", "7"]).unwrap();
        assert_eq!(cli.n, 100);
        assert_eq!(cli.bandwidth, 7);
        assert_eq!(cli.tolerance, UNSET_TOLERANCE);
        assert_eq!(cli.seed, DEFAULT_SEED);
        assert_eq!(cli.format, Format::Text);
        assert!(cli.max_iter.is_none());
        assert!(cli.output.is_none());
    }

    #[test]
    fn negative_tolerance_is_accepted() {
        let cli = Cli::try_parse_from(["bandcg", "50", "3", "-t", "-1", "-i", "20", "--format", "json"])
            .unwrap();
        assert_eq!(cli.tolerance, -1.0);
        assert_eq!(cli.max_iter, Some(20));
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn missing_bandwidth_is_rejected() {
        assert!(Cli::try_parse_from(["bandcg", "50"]).is_err());
    }
}
