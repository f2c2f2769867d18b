//! Plain-text rendering for terminal output.

use std::fmt::Write;

use agrigate_ai::{InferencePath, LoadReport, Prediction};
use agrigate_core::Domain;

const RULE: &str = "+------------------------------------------------------------+";

pub fn render_prediction(p: &Prediction) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "  {:<14}{}", "domain", p.domain);
    let _ = writeln!(out, "  {:<14}{}", "bucket", p.bucket);
    if let Some(label) = p.label.as_deref().filter(|l| *l != p.bucket) {
        let _ = writeln!(out, "  {:<14}{label}", "class");
    }
    let _ = writeln!(out, "  {:<14}{:.3}", "value", p.value);
    let source = match (p.path, p.fallback_reason) {
        (InferencePath::Model, _) => "model".to_string(),
        (InferencePath::Fallback, Some(reason)) => format!("rule-based estimate ({reason})"),
        (InferencePath::Fallback, None) => "rule-based estimate".to_string(),
    };
    let _ = writeln!(out, "  {:<14}{:.2} via {source}", "confidence", p.confidence);
    if !p.alternatives.is_empty() {
        let _ = writeln!(out, "  alternatives");
        for alt in &p.alternatives {
            let _ = writeln!(out, "    {:<24}{:>6.1}%", alt.label, alt.probability * 100.0);
        }
    }
    if let Some(crops) = &p.recommended_crops {
        let _ = writeln!(out, "  {:<14}{}", "grow", crops.primary.join(", "));
        if !crops.secondary.is_empty() {
            let _ = writeln!(out, "  {:<14}{}", "also", crops.secondary.join(", "));
        }
    }
    let _ = writeln!(out, "  {:<14}{}", "computed", p.computed_at.to_rfc3339());
    let _ = writeln!(out, "{RULE}");
    out
}

pub fn render_catalog(summary: &[(Domain, Vec<String>)], report: &LoadReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    for (domain, roles) in summary {
        let roles = if roles.is_empty() {
            "(fallback only)".to_string()
        } else {
            roles.join(", ")
        };
        let _ = writeln!(out, "  {:<14}{roles}", domain.as_str());
    }
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "  loaded {}, unsupported {}, failed {}",
        report.loaded.len(),
        report.unsupported.len(),
        report.failed.len()
    );
    for skipped in report.unsupported.iter().chain(&report.failed) {
        let _ = writeln!(
            out,
            "    {} {}: {}",
            skipped.component.domain, skipped.component.role, skipped.reason
        );
    }
    out
}
