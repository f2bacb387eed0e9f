//! Report rendering.
//!
//! This module renders lookup reports as human-readable text or as JSON.

use crate::models::{Geolocation, Report};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

const RULE_WIDE: usize = 50;
const RULE_NARROW: usize = 40;

/// Generate the complete text report.
pub fn generate_text_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str(&generate_header(report));
    output.push_str(&generate_consensus_section(&report.consensus()));
    output.push_str(&generate_provider_section(report));
    output.push_str(&generate_footer(report));

    output
}

fn generate_header(report: &Report) -> String {
    let mut section = String::new();

    section.push_str(&format!("IP Intelligence Report for {}\n", report.ip));
    section.push_str(&"=".repeat(RULE_WIDE));
    section.push_str("\n\n");

    section
}

/// Generate the consensus block.
fn generate_consensus_section(consensus: &Geolocation) -> String {
    let mut section = String::new();

    section.push_str("CONSENSUS (aggregated from all providers):\n");
    section.push_str(&"-".repeat(RULE_NARROW));
    section.push('\n');

    if consensus.is_empty() {
        section.push_str("  No provider returned data.\n");
    } else {
        section.push_str(&format_fields(consensus, FieldLabels::CONSENSUS));
    }
    section.push('\n');

    section
}

/// Generate the per-provider details.
fn generate_provider_section(report: &Report) -> String {
    let mut section = String::new();

    section.push_str("PROVIDER DETAILS:\n");
    section.push_str(&"-".repeat(RULE_NARROW));
    section.push('\n');

    for result in &report.results {
        section.push_str(&format!("\n[{}] ", result.provider));
        match (result.result(), result.error()) {
            (Some(geo), _) => {
                section.push_str(&format!("({}ms)\n", result.duration.as_millis()));
                section.push_str(&format_fields(geo, FieldLabels::PROVIDER));
            }
            (None, error) => {
                section.push_str("FAILED\n");
                section.push_str(&format!("  Error: {}\n", error.unwrap_or_default()));
            }
        }
    }

    section
}

fn generate_footer(report: &Report) -> String {
    let mut footer = String::new();

    footer.push('\n');
    footer.push_str(&"-".repeat(RULE_NARROW));
    footer.push('\n');
    footer.push_str(&format!(
        "Total: {}/{} providers succeeded in {}ms\n",
        report.success_count(),
        report.results.len(),
        report.total_duration.as_millis()
    ));

    footer
}

/// Labels for one rendering of a geolocation, padded for alignment.
struct FieldLabels {
    country: &'static str,
    region: &'static str,
    city: &'static str,
    coords: &'static str,
    isp: &'static str,
    org: &'static str,
    asn: &'static str,
}

impl FieldLabels {
    const CONSENSUS: FieldLabels = FieldLabels {
        country: "Country:     ",
        region: "Region:      ",
        city: "City:        ",
        coords: "Coordinates: ",
        isp: "ISP:         ",
        org: "Organization:",
        asn: "ASN:         ",
    };

    const PROVIDER: FieldLabels = FieldLabels {
        country: "Country:",
        region: "Region: ",
        city: "City:   ",
        coords: "Coords: ",
        isp: "ISP:    ",
        org: "Org:    ",
        asn: "ASN:    ",
    };
}

/// Render the non-empty fields of a geolocation, one per line.
fn format_fields(geo: &Geolocation, labels: FieldLabels) -> String {
    let mut lines = String::new();

    if !geo.country.is_empty() {
        lines.push_str(&format!("  {} {}", labels.country, geo.country));
        if !geo.country_code.is_empty() {
            lines.push_str(&format!(" ({})", geo.country_code));
        }
        lines.push('\n');
    } else if !geo.country_code.is_empty() {
        lines.push_str(&format!("  {} {}\n", labels.country, geo.country_code));
    }

    if !geo.region.is_empty() {
        lines.push_str(&format!("  {} {}\n", labels.region, geo.region));
    }

    if !geo.city.is_empty() {
        lines.push_str(&format!("  {} {}\n", labels.city, geo.city));
    }

    if geo.has_location() {
        lines.push_str(&format!(
            "  {} {:.4}, {:.4}\n",
            labels.coords, geo.latitude, geo.longitude
        ));
    }

    if !geo.isp.is_empty() {
        lines.push_str(&format!("  {} {}\n", labels.isp, geo.isp));
    }

    if !geo.org.is_empty() {
        lines.push_str(&format!("  {} {}\n", labels.org, geo.org));
    }

    if !geo.asn.is_empty() {
        lines.push_str(&format!("  {} {}\n", labels.asn, geo.asn));
    }

    lines
}

/// The JSON document: the report plus its consensus.
#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    report: &'a Report,
    consensus: Geolocation,
}

/// Generate a pretty-printed JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    let document = JsonReport {
        report,
        consensus: report.consensus(),
    };
    serde_json::to_string_pretty(&document).context("Failed to serialize report")
}

/// Write rendered output to `path`, or to stdout when no path is given.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .and_then(|_| stdout.flush())
                .context("Failed to write report to stdout")
        }
    }
}
