//! Prometheus text exposition format.
//!
//! Renders recorder snapshots for scraping by a Prometheus server or
//! compatible agent.

use std::fmt::Write;

use crate::recorder::FamilySnapshot;

/// Render metric families into Prometheus text format.
///
/// Families without samples still get their HELP and TYPE lines.
pub fn render_prometheus(families: &[FamilySnapshot]) -> String {
    let mut out = String::new();

    for family in families {
        let _ = writeln!(out, "# HELP {} {}", family.name, family.help);
        let _ = writeln!(out, "# TYPE {} {}", family.name, family.kind.as_str());

        for (values, value) in &family.samples {
            let labels: Vec<String> = family
                .label_names
                .iter()
                .zip(values)
                .map(|(name, v)| format!("{name}=\"{}\"", escape_label(v)))
                .collect();
            let _ = writeln!(out, "{}{{{}}} {}", family.name, labels.join(","), value);
        }
    }

    out
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
