// ============================================================
// Layer 6 — Metrics Reports
// ============================================================
// Three text renderings of MetricsReport values:
//
//   metrics_table()    — one evaluation, printed to stdout
//                        (baseline and fine-tuned results)
//
//   comparison_text()  — before / after / Δ side by side for
//                        every metric and dimension, written
//                        to metrics_comparison.txt
//
//   model_card()       — README.md placed next to the saved
//                        model and uploaded with it
//
// Δ for a metric cell is `after - before`, except that a
// before-value of exactly 0 yields 0 (no baseline to compare
// against). The sequential score Δ is always the plain
// difference.

use anyhow::{Context, Result};
use std::{fmt::Write as _, fs, path::Path};

use crate::evaluation::evaluator::{metric_key, MetricsReport};
use crate::evaluation::retrieval::METRIC_NAMES;

/// File name of the model card inside the model directory.
pub const MODEL_CARD_FILE: &str = "README.md";

const RULE_WIDTH: usize = 85;
const DIM_WIDTH: usize  = 8;

/// Before/after difference for one metric cell.
pub fn metric_delta(before: f64, after: f64) -> f64 {
    if before != 0.0 { after - before } else { 0.0 }
}

/// Fixed-width table of every metric at every dimension.
pub fn metrics_table(title: &str, report: &MetricsReport, dims: &[usize]) -> Result<String> {
    let rule = "-".repeat(RULE_WIDTH);
    let mut out = String::new();

    writeln!(out, "\n{title}")?;
    writeln!(out, "{rule}")?;
    let header: Vec<String> = dims.iter().map(|d| format!("{d:>10}d")).collect();
    writeln!(out, "{:15} {}", "Metric", header.join(" "))?;
    writeln!(out, "{rule}")?;

    for metric in METRIC_NAMES {
        write!(out, "{metric:15}  ")?;
        for &dim in dims {
            write!(out, "{:10.4} ", report.get(&metric_key(dim, metric))?)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{rule}")?;
    writeln!(out, "sequential_score: {:.4}", report.sequential_score()?)?;
    Ok(out)
}

/// Side-by-side before/after/Δ comparison.
pub fn comparison_text(before: &MetricsReport, after: &MetricsReport, dims: &[usize]) -> Result<String> {
    let name_width = METRIC_NAMES.iter().map(|m| m.len()).max().unwrap_or(6);
    let dims_section: String = dims.iter().map(|d| format!("{d:>DIM_WIDTH$}")).collect();
    let section_width = dims_section.chars().count();
    let bar = "─".repeat(section_width);

    let mut out = String::new();
    let title = "Model Performance Metrics Comparison";
    writeln!(out, "\n{title}")?;
    writeln!(out, "{}\n", "=".repeat(title.len()))?;

    writeln!(
        out,
        "{:<name_width$} │ {:>section_width$} │ {:>section_width$} │ {:>section_width$}",
        "Metric", "Before", "After", "Δ",
    )?;
    writeln!(out, "{} │ {dims_section} │ {dims_section} │ {dims_section}", " ".repeat(name_width))?;
    writeln!(out, "{}─┼─{bar}─┼─{bar}─┼─{bar}", "─".repeat(name_width))?;

    for metric in METRIC_NAMES {
        let mut before_vals = String::new();
        let mut after_vals  = String::new();
        let mut delta_vals  = String::new();

        for &dim in dims {
            let key = metric_key(dim, metric);
            let b = before.get(&key)?;
            let a = after.get(&key)?;
            write!(before_vals, "{b:DIM_WIDTH$.3}")?;
            write!(after_vals,  "{a:DIM_WIDTH$.3}")?;
            write!(delta_vals,  "{:DIM_WIDTH$.3}", metric_delta(b, a))?;
        }

        writeln!(out, "{metric:<name_width$} │ {before_vals} │ {after_vals} │ {delta_vals}")?;
    }

    writeln!(out, "{}─┴─{bar}─┴─{bar}─┴─{bar}\n", "─".repeat(name_width))?;

    let sb = before.sequential_score()?;
    let sa = after.sequential_score()?;
    writeln!(out, "Sequential Scores")?;
    writeln!(out, "----------------")?;
    writeln!(out, "Before: {sb:.3}")?;
    writeln!(out, "After:  {sa:.3}")?;
    writeln!(out, "Δ:      {:+.3}", sa - sb)?;
    Ok(out)
}

/// Write the comparison to `path`.
pub fn write_comparison(
    before: &MetricsReport,
    after:  &MetricsReport,
    dims:   &[usize],
    path:   &Path,
) -> Result<()> {
    let text = comparison_text(before, after, dims)?;
    fs::write(path, text)
        .with_context(|| format!("Cannot write metrics comparison to '{}'", path.display()))?;
    tracing::info!("Metrics comparison written to '{}'", path.display());
    Ok(())
}

/// Metadata shown on the model card.
pub struct ModelCardInfo<'a> {
    pub model_name: &'a str,
    pub base_model: &'a str,
    pub dims:       &'a [usize],
    pub epochs:     usize,
}

/// Markdown model card with front matter and the final metrics.
pub fn model_card(info: &ModelCardInfo<'_>, final_metrics: &MetricsReport) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "---")?;
    writeln!(out, "language: en")?;
    writeln!(out, "license: apache-2.0")?;
    writeln!(out, "tags:")?;
    writeln!(out, "- sentence-embedding")?;
    writeln!(out, "- matryoshka")?;
    writeln!(out, "---\n")?;
    writeln!(out, "# {}\n", info.model_name)?;
    writeln!(out, "Fine-tuned from `{}` for {} epoch(s) with a Matryoshka ranking loss.\n", info.base_model, info.epochs)?;
    let dims: Vec<String> = info.dims.iter().map(ToString::to_string).collect();
    writeln!(out, "Embeddings may be truncated to any of: {}.\n", dims.join(", "))?;
    writeln!(out, "## Retrieval metrics\n")?;
    writeln!(out, "```{}```", metrics_table("Fine-Tuned Results", final_metrics, info.dims)?)?;
    Ok(out)
}
