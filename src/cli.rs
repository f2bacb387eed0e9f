//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::provider::ProviderKind;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

/// Shortest accepted lookup deadline.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);
/// Longest accepted lookup deadline.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60);

/// ipintel - IP Intelligence Lookup Tool
///
/// Queries multiple geolocation APIs concurrently and reports the
/// location, ISP and organisation most providers agree on. When providers
/// disagree the majority value is shown; coordinates are averaged.
///
/// Examples:
///   ipintel 8.8.8.8
///   ipintel 2001:4860:4860::8888
///   ipintel -f json 1.1.1.1
///   ipintel --timeout 5s --providers ip-api,ipwhois 8.8.8.8
///   echo 8.8.8.8 | ipintel -
///   ipintel --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// IPv4 or IPv6 address to look up
    ///
    /// Use "-" to read a single address from standard input (forces JSON output).
    #[arg(value_name = "IP_ADDRESS", required_unless_present = "init_config")]
    pub ip: Option<String>,

    /// Output format
    ///
    /// Defaults to the config file setting, or text.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Deadline for the whole lookup, e.g. 500ms, 2s, 1m (bare numbers are seconds)
    ///
    /// Defaults to the config file setting, or 10s.
    #[arg(short, long, value_name = "DURATION", value_parser = parse_timeout, env = "IPINTEL_TIMEOUT")]
    pub timeout: Option<Duration>,

    /// Providers to query (comma-separated)
    ///
    /// Example: --providers ip-api,ipwhois
    #[arg(short, long, value_name = "LIST", value_delimiter = ',')]
    pub providers: Option<Vec<ProviderKind>>,

    /// Write the report to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ipintel.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .ipintel.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Parse a lookup deadline such as `500ms`, `2s`, `1m` or `3`.
pub fn parse_timeout(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let (number, unit) = match raw.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration {:?}: expected e.g. 500ms, 2s, 1m", raw))?;

    let nanos_per_unit = match unit {
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        other => {
            return Err(format!(
                "invalid duration unit {:?}: use ms, s or m",
                other
            ))
        }
    };

    let nanos = (value * nanos_per_unit).round();
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(format!("invalid duration {:?}: out of range", raw));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether the address should be read from standard input.
    pub fn reads_stdin(&self) -> bool {
        self.ip.as_deref() == Some("-")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.ip.as_deref().map_or(true, |ip| ip.trim().is_empty()) {
            return Err("IP address is required".to_string());
        }

        if let Some(timeout) = self.timeout {
            validate_timeout(timeout)?;
        }

        if let Some(ref providers) = self.providers {
            if providers.is_empty() {
                return Err("At least one provider must be selected".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}

/// Read one address line from `reader`, leaving the rest of the input unread.
pub fn read_address_line<R: BufRead>(reader: &mut R) -> std::io::Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Check that a deadline lies within the accepted range.
pub fn validate_timeout(timeout: Duration) -> Result<(), String> {
    if timeout < MIN_TIMEOUT {
        return Err("Timeout must be at least 100 milliseconds".to_string());
    }
    if timeout > MAX_TIMEOUT {
        return Err("Timeout must not exceed 60 seconds".to_string());
    }
    Ok(())
}
