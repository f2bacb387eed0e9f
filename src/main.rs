//! ipintel - IP Intelligence Lookup Tool
//!
//! A CLI tool that queries several geolocation providers concurrently
//! and reports the location they agree on.
//!
//! Exit codes:
//!   0 - Success (at least one provider answered, or none were configured)
//!   1 - Runtime error, or every provider failed

use anyhow::{Context, Result};
use ipintel::cli::{read_address_line, Args, OutputFormat};
use ipintel::config::{Config, DEFAULT_CONFIG_FILE};
use ipintel::provider::{build_providers, http::build_http_client};
use ipintel::{report, Aggregator, IpAddress};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("ipintel v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_lookup(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Lookup failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .ipintel.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to change the timeout, providers and endpoints.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so stdout carries only the report.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one lookup and print the report. Returns the exit code.
async fn run_lookup(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input = read_address_input(&args)?;
    let ip = IpAddress::parse(&input).with_context(|| format!("Invalid IP address: {}", input))?;

    if !ip.is_globally_routable() {
        warn!(
            "{} is not a globally routable address; providers will likely return no data",
            ip
        );
    }

    let timeout = config.timeout();
    ipintel::cli::validate_timeout(timeout).map_err(anyhow::Error::msg)?;

    let http_client = build_http_client(timeout, &config.http.user_agent)
        .context("Failed to build HTTP client")?;
    let providers = build_providers(&config.providers.enabled, &http_client, &config.providers);
    let aggregator = Aggregator::new(providers);

    info!(
        "Querying {} providers for {} (timeout {}ms)",
        aggregator.provider_count(),
        ip,
        timeout.as_millis()
    );

    // Ctrl-C cancels every in-flight provider
    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling lookup");
            on_signal.cancel();
        }
    });

    let report = aggregator.lookup_with_timeout(ip, timeout, &shutdown).await;

    let output = match config.lookup.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Text => report::generate_text_report(&report),
    };

    report::write_output(&output, args.output.as_deref())?;

    if let Some(ref path) = args.output {
        info!("Report saved to: {}", path.display());
    }

    if report.all_failed() {
        error!("All {} providers failed for {}", report.results.len(), ip);
        return Ok(1);
    }

    Ok(0)
}

/// The address to look up: the positional argument, or one line of stdin for `-`.
fn read_address_input(args: &Args) -> Result<String> {
    if args.reads_stdin() {
        return read_address_line(&mut std::io::stdin().lock())
            .context("Failed to read IP address from stdin");
    }

    Ok(args.ip.as_deref().unwrap_or_default().trim().to_string())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
