//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.ipintel.toml` files.

use crate::cli::OutputFormat;
use crate::provider::{ipapi, ipinfo, ipwhois, ProviderKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = ".ipintel.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Lookup settings.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Provider selection and endpoints.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Lookup behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Deadline for the whole lookup in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            format: OutputFormat::default(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header sent to every provider.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("ipintel/{}", env!("CARGO_PKG_VERSION"))
}

/// Which providers to query and where to reach them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Providers queried when `--providers` is not given, in order.
    #[serde(default = "ProviderKind::all")]
    pub enabled: Vec<ProviderKind>,

    /// Base URL for ip-api.com; the address is appended.
    #[serde(default = "default_ip_api_url")]
    pub ip_api_url: String,

    /// Base URL for ipinfo.io; the address and `/json` are appended.
    #[serde(default = "default_ipinfo_url")]
    pub ipinfo_url: String,

    /// Base URL for ipwhois.app; the address is appended.
    #[serde(default = "default_ipwhois_url")]
    pub ipwhois_url: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: ProviderKind::all(),
            ip_api_url: default_ip_api_url(),
            ipinfo_url: default_ipinfo_url(),
            ipwhois_url: default_ipwhois_url(),
        }
    }
}

fn default_ip_api_url() -> String {
    ipapi::BASE_URL.to_string()
}

fn default_ipinfo_url() -> String {
    ipinfo::BASE_URL.to_string()
}

fn default_ipwhois_url() -> String {
    ipwhois::BASE_URL.to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given explicitly on the command line override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(format) = args.format {
            self.lookup.format = format;
        }

        if let Some(timeout) = args.timeout {
            self.lookup.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        }

        if let Some(ref providers) = args.providers {
            self.providers.enabled = providers.clone();
        }

        // Stdin mode is meant for scripts
        if args.reads_stdin() {
            self.lookup.format = OutputFormat::Json;
        }
    }

    /// The lookup deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.lookup.timeout_ms)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.lookup.timeout_ms, 10_000);
        assert_eq!(config.lookup.format, OutputFormat::Text);
        assert_eq!(config.providers.enabled, ProviderKind::all());
        assert_eq!(config.providers.ip_api_url, "http://ip-api.com/json/");
        assert!(config.http.user_agent.starts_with("ipintel/"));
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[lookup]
timeout_ms = 2500
format = "json"

[providers]
enabled = ["ipwhois", "ip-api"]
ipinfo_url = "http://localhost:8080/"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.lookup.timeout_ms, 2500);
        assert_eq!(config.lookup.format, OutputFormat::Json);
        assert_eq!(
            config.providers.enabled,
            vec![ProviderKind::IpWhois, ProviderKind::IpApi]
        );
        assert_eq!(config.providers.ipinfo_url, "http://localhost:8080/");
        // Unspecified keys keep their defaults
        assert_eq!(config.providers.ipwhois_url, "https://ipwhois.app/json/");
        assert!(config.http.user_agent.starts_with("ipintel/"));
    }

    #[test]
    fn test_parse_rejects_unknown_provider() {
        let toml_content = r#"
[providers]
enabled = ["maxmind"]
"#;
        assert!(toml::from_str::<Config>(toml_content).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ipintel.toml");
        std::fs::write(&path, "[lookup]\ntimeout_ms = 750\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(750));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        let args = Args::try_parse_from([
            "ipintel",
            "-t",
            "3s",
            "-p",
            "ipinfo",
            "-f",
            "json",
            "8.8.8.8",
        ])
        .unwrap();

        config.merge_with_args(&args);

        assert_eq!(config.lookup.timeout_ms, 3000);
        assert_eq!(config.lookup.format, OutputFormat::Json);
        assert_eq!(config.providers.enabled, vec![ProviderKind::IpInfo]);
    }

    #[test]
    fn test_merge_keeps_config_when_args_absent() {
        let mut config = Config::default();
        config.lookup.timeout_ms = 4000;
        config.lookup.format = OutputFormat::Json;

        let args = Args::try_parse_from(["ipintel", "8.8.8.8"]).unwrap();
        config.merge_with_args(&args);

        assert_eq!(config.lookup.timeout_ms, 4000);
        assert_eq!(config.lookup.format, OutputFormat::Json);
    }

    #[test]
    fn test_merge_stdin_forces_json() {
        let mut config = Config::default();
        let args = Args::try_parse_from(["ipintel", "-f", "text", "-"]).unwrap();

        config.merge_with_args(&args);

        assert_eq!(config.lookup.format, OutputFormat::Json);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[lookup]"));
        assert!(toml_str.contains("[http]"));
        assert!(toml_str.contains("[providers]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.providers.enabled, ProviderKind::all());
    }
}
