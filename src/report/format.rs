//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::data::MockComparison;
use crate::domain::RunConfig;
use crate::fit::{AnalysisIssue, ObservationAnalysis};

/// Input counts shown in the run header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunCounts {
    pub models: usize,
    pub observations: usize,
    pub skipped_rows: usize,
    pub elapsed_seconds: f64,
}

/// Run header: configuration and input sizes.
pub fn format_run_summary(config: &RunConfig, counts: &RunCounts) -> String {
    let mut out = String::new();

    out.push_str("=== sedfit - SED grid fit ===\n");
    out.push_str(&format!("Filters: {} ({})\n", config.filters.len(), config.filters.join(", ")));
    let axes: Vec<String> = config
        .parameters
        .iter()
        .map(|a| format!("{}[{}]", a.name, a.values.len()))
        .collect();
    out.push_str(&format!("Parameters: {}\n", axes.join(" x ")));
    out.push_str(&format!(
        "Models: {} | Observations: {} (skipped rows: {})\n",
        counts.models, counts.observations, counts.skipped_rows
    ));
    out.push_str(&format!(
        "PDF: {:?} | probability: {:?}\n",
        config.pdf.kind, config.probability_policy
    ));
    out.push_str(&format!("Elapsed: {:.2}s\n", counts.elapsed_seconds));

    out
}

/// One line per `(observation, quantity)`: best-fit value and weighted estimate.
pub fn format_estimates(analyses: &[ObservationAnalysis], quantities: &[String]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>10} {:<16} {:>12} {:>12} {:>12}",
            "id", "chi2_red", "quantity", "best", "mean", "std"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<20} {:-<10} {:-<16} {:-<12} {:-<12} {:-<12}\n",
        "", "", "", "", "", ""
    ));

    for a in analyses {
        for q in quantities {
            let best = a.best.quantities.get(q).copied();
            let (mean, std) = match a.estimate(q) {
                Some(e) => (fmt_num(e.mean), fmt_num(e.std)),
                None => ("-".to_string(), "-".to_string()),
            };
            out.push_str(
                format!(
                    "{:<20} {:>10.3} {:<16} {:>12} {:>12} {:>12}",
                    truncate(&a.id, 20),
                    a.best.reduced_chi2,
                    truncate(q, 16),
                    best.map(fmt_num).unwrap_or_else(|| "-".to_string()),
                    mean,
                    std,
                )
                .trim_end(),
            );
            out.push('\n');
        }
    }

    out
}

/// Reported per-observation issues, or an empty string when there are none.
pub fn format_issues(analyses: &[ObservationAnalysis]) -> String {
    let mut out = String::new();
    for a in analyses {
        for issue in &a.issues {
            let text = match issue {
                AnalysisIssue::ZeroTotalWeight => "no model fits (zero total probability)".to_string(),
                AnalysisIssue::PdfUnavailable { variable } => format!("no PDF for '{variable}'"),
            };
            out.push_str(&format!("  {}: {text}\n", a.id));
        }
    }
    if out.is_empty() {
        return out;
    }
    format!("Issues:\n{out}")
}

pub fn format_mock(comparisons: &[MockComparison]) -> String {
    let mut out = String::from("Mock analysis (estimated vs exact):\n");
    for c in comparisons {
        out.push_str(&format!(
            "  {:<16} n={:<5} slope={:.3} intercept={} r2={:.3}\n",
            truncate(&c.quantity, 16),
            c.n,
            c.slope,
            fmt_num(c.intercept),
            c.r_squared
        ));
    }
    out
}

fn fmt_num(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e5).contains(&a) {
        format!("{v:.4e}")
    } else {
        format!("{v:.4}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
