//! Report formatting.
//!
//! Human-readable output for the terminal and pretty-printed JSON for
//! scripting. Metric rows use the conventional `metric@k` labels.

use lorebench_core::evaluation::{DownstreamReport, RetrievalReport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Formats any report as pretty-printed JSON.
pub fn format_json<T: Serialize>(report: &T) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

fn push_metric(out: &mut String, label: &str, value: f64) {
    let _ = writeln!(out, "  {:<24}{:.4}", label, value);
}

fn push_at_k(out: &mut String, name: &str, values: &BTreeMap<usize, f64>) {
    for (k, value) in values {
        push_metric(out, &format!("{}@{}", name, k), *value);
    }
}

/// Formats a retrieval report for the terminal.
pub fn format_retrieval(report: &RetrievalReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Retrieval evaluation ({} quer{})",
        report.queries,
        if report.queries == 1 { "y" } else { "ies" }
    );
    push_metric(&mut out, "Rprec", report.rprec);
    push_at_k(&mut out, "precision", &report.precision_at);
    push_at_k(&mut out, "recall", &report.recall_at);
    push_at_k(&mut out, "success_rate", &report.success_rate_at);
    push_at_k(&mut out, "answer_in_context", &report.answer_in_context_at);
    out.trim_end().to_string()
}

/// Formats the combined answer-quality report for the terminal.
pub fn format_downstream(report: &DownstreamReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Downstream evaluation ({} quer{})",
        report.queries,
        if report.queries == 1 { "y" } else { "ies" }
    );
    push_metric(&mut out, "em", report.downstream.em);
    push_metric(&mut out, "f1", report.downstream.f1);
    push_metric(&mut out, "rougel", report.downstream.rougel);

    let _ = writeln!(out, "Grounded (full evidence retrieved)");
    push_metric(&mut out, "em", report.grounded.em);
    push_metric(&mut out, "f1", report.grounded.f1);
    push_metric(&mut out, "rougel", report.grounded.rougel);

    let _ = writeln!(out, "Retrieval");
    push_metric(&mut out, "Rprec", report.retrieval.rprec);
    push_at_k(&mut out, "recall", &report.retrieval.recall_at);
    out.trim_end().to_string()
}
