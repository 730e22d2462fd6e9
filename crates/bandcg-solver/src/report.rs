//! Run reports: timing statistics plus text and JSON writers.
//!
//! The text layout is the classic `cgSolver` output file:
//!
//! ```text
//! ###########
//! # CG compute time (min, avg, max): <g> <g> <g>
//! # Residual compute time (min, avg, max): <g> <g> <g>
//! #
//! # Euclidian norm of residual e approximate error
//! # i = 0: <norm> <error>
//! ...
//! ###########
//! <n>
//! <x0> <x1> ...
//! ```
//!
//! Numbers use C `%g` formatting (six significant digits) and the solution
//! uses `%.14g`. Statistics cover only the iterations that actually ran.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::audit::SolveAuditEntry;
use crate::error::SolverError;
use crate::types::{IterationLog, SolveOutcome, SolverConfig, Termination};

// ---------------------------------------------------------------------------
// Timing statistics
// ---------------------------------------------------------------------------

/// Minimum, mean and maximum of a series of timings in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    /// Smallest sample.
    pub min: f64,
    /// Arithmetic mean.
    pub avg: f64,
    /// Largest sample.
    pub max: f64,
}

impl TimingStats {
    /// Statistics over `samples`, or `None` when there are none.
    pub fn from_samples<I>(samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for s in samples {
            count += 1;
            sum += s;
            min = min.min(s);
            max = max.max(s);
        }

        (count > 0).then(|| Self {
            min,
            avg: sum / count as f64,
            max,
        })
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Everything one driver run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Configuration the run used.
    pub config: SolverConfig,
    /// Solve result and iteration log.
    pub outcome: SolveOutcome,
    /// Matrix assembly time in milliseconds.
    pub assembly_time_ms: f64,
    /// Whether the AVX2 + FMA kernels were used.
    pub simd: bool,
    /// Reproducibility fingerprint of the solve.
    pub audit: SolveAuditEntry,
}

impl RunReport {
    /// Per-iteration CG time statistics.
    pub fn cg_time_stats(&self) -> Option<TimingStats> {
        TimingStats::from_samples(self.outcome.log.cg_times_ms())
    }

    /// Per-iteration residual time statistics.
    pub fn residual_time_stats(&self) -> Option<TimingStats> {
        TimingStats::from_samples(self.outcome.log.residual_times_ms())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    config: &'a SolverConfig,
    iterations: usize,
    termination: Termination,
    final_error: f64,
    final_residual_norm: f64,
    exact_residual_refreshes: usize,
    assembly_time_ms: f64,
    simd: bool,
    cg_time_ms: Option<TimingStats>,
    residual_time_ms: Option<TimingStats>,
    log: &'a IterationLog,
    solution: &'a [f64],
    audit: &'a SolveAuditEntry,
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write the text report.
///
/// # Errors
///
/// Returns [`SolverError::Io`] if the sink fails.
pub fn write_text_report<W: Write>(out: &mut W, report: &RunReport) -> Result<(), SolverError> {
    let cg = report.cg_time_stats().unwrap_or_default();
    let res = report.residual_time_stats().unwrap_or_default();

    writeln!(out, "###########")?;
    writeln!(
        out,
        "# CG compute time (min, avg, max): {} {} {}",
        format_g(cg.min, 6),
        format_g(cg.avg, 6),
        format_g(cg.max, 6)
    )?;
    writeln!(
        out,
        "# Residual compute time (min, avg, max): {} {} {}",
        format_g(res.min, 6),
        format_g(res.avg, 6),
        format_g(res.max, 6)
    )?;
    writeln!(out, "#")?;
    writeln!(out, "# Euclidian norm of residual e approximate error")?;
    for (i, entry) in report.outcome.log.iter().enumerate() {
        writeln!(
            out,
            "# i = {}: {} {}",
            i,
            format_g(entry.norm_residual, 6),
            format_g(entry.error, 6)
        )?;
    }
    writeln!(out, "###########")?;

    writeln!(out, "{}", report.config.n)?;
    for &x in report.outcome.solution.iter() {
        write!(out, "{} ", format_g(x, 14))?;
    }
    writeln!(out)?;

    out.flush()?;
    Ok(())
}

/// Write the JSON report (pretty-printed, trailing newline).
///
/// # Errors
///
/// Returns [`SolverError::Serialization`] or [`SolverError::Io`].
pub fn write_json_report<W: Write>(out: &mut W, report: &RunReport) -> Result<(), SolverError> {
    let view = JsonReport {
        config: &report.config,
        iterations: report.outcome.iterations,
        termination: report.outcome.termination,
        final_error: report.outcome.final_error,
        final_residual_norm: report.outcome.final_residual_norm,
        exact_residual_refreshes: report.outcome.exact_residual_refreshes,
        assembly_time_ms: report.assembly_time_ms,
        simd: report.simd,
        cg_time_ms: report.cg_time_stats(),
        residual_time_ms: report.residual_time_stats(),
        log: &report.outcome.log,
        solution: &report.outcome.solution,
        audit: &report.audit,
    };

    serde_json::to_writer_pretty(&mut *out, &view)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// %g formatting
// ---------------------------------------------------------------------------

/// Format `value` like C's `%.<precision>g`.
///
/// Uses `precision` significant digits, switches to exponent notation when
/// the decimal exponent is below `-4` or at least `precision`, and strips
/// trailing zeros.
///
/// ```
/// use bandcg_solver::report::format_g;
///
/// assert_eq!(format_g(0.25, 6), "0.25");
/// assert_eq!(format_g(1234567.0, 6), "1.23457e+06");
/// assert_eq!(format_g(1e-5, 6), "1e-05");
/// assert_eq!(format_g(100.0, 6), "100");
/// ```
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".into();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".into() } else { "-inf".into() };
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".into() } else { "0".into() };
    }

    let p = precision.max(1);
    let sci = format!("{:.*e}", p - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= p as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exp.unsigned_abs())
    } else {
        let decimals = (p as i32 - 1 - exp) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditBuilder;
    use crate::banded::BandedMatrix;
    use crate::cg::solve;

    fn sample_report() -> RunReport {
        let a = BandedMatrix::from_diagonals(4, 1, &[vec![4.0; 4]]).unwrap();
        let b = [1.0; 4];
        let audit = AuditBuilder::start("report", &a, &b);
        let outcome = solve(&a, &b, &[0.0; 4], 1e-6, 4).unwrap();
        let audit = audit.finish(&outcome, "cg");
        RunReport {
            config: SolverConfig::new(4, 1).with_tolerance(1e-6),
            outcome,
            assembly_time_ms: 0.0,
            simd: false,
            audit,
        }
    }

    #[test]
    fn format_g_matches_printf() {
        assert_eq!(format_g(2.0, 6), "2");
        assert_eq!(format_g(0.0001, 6), "0.0001");
        assert_eq!(format_g(0.00001234, 6), "1.234e-05");
        assert_eq!(format_g(123456.0, 6), "123456");
        assert_eq!(format_g(999999.7, 6), "1e+06");
        assert_eq!(format_g(-3.5, 6), "-3.5");
        assert_eq!(format_g(1.0 / 3.0, 14), "0.33333333333333");
        assert_eq!(format_g(1e300, 6), "1e+300");
        assert_eq!(format_g(0.0, 6), "0");
    }

    #[test]
    fn timing_stats() {
        assert_eq!(TimingStats::from_samples(Vec::new()), None);
        let s = TimingStats::from_samples(vec![1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s, TimingStats { min: 1.0, avg: 2.0, max: 3.0 });
    }

    #[test]
    fn text_report_layout() {
        let report = sample_report();
        let mut buf = Vec::new();
        write_text_report(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "###########");
        assert!(lines[1].starts_with("# CG compute time (min, avg, max): "));
        assert!(lines[2].starts_with("# Residual compute time (min, avg, max): "));
        assert_eq!(lines[3], "#");
        assert_eq!(lines[4], "# Euclidian norm of residual e approximate error");
        assert_eq!(lines[5], "# i = 0: 0 2");
        assert_eq!(lines[6], "###########");
        assert_eq!(lines[7], "4");
        assert_eq!(lines[8], "0.25 0.25 0.25 0.25 ");
        assert_eq!(lines.len(), 9);
    }

    #[test]
    fn json_report_round_trips_key_fields() {
        let report = sample_report();
        let mut buf = Vec::new();
        write_json_report(&mut buf, &report).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["iterations"], 1);
        assert_eq!(value["termination"], "Converged");
        assert_eq!(value["config"]["n"], 4);
        assert_eq!(value["solution"][2], 0.25);
        assert_eq!(value["log"]["entries"].as_array().map(Vec::len), Some(1));
    }
}
