// # ddnsd - DDNS Daemon
//
// This is a THIN integration layer. All resolution and reconciliation logic
// lives in ddns-core; the daemon only:
//
// 1. Parses the command line and loads the YAML configuration
// 2. Initializes logging
// 3. Registers record stores and builds the DNS client
// 4. Runs the DDNS engine until SIGTERM/SIGINT
//
// ## Configuration
//
// The configuration file is read from `--config`, `DDNS_CONFIG`, or
// `/etc/ddnsd/ddns.yaml`, in that order. A few environment variables apply
// on top of it:
//
// - `DDNS_PROVIDER_API_TOKEN`: API token (overrides the file)
// - `DDNS_LOG_LEVEL`: Base log level (default `info`)
// - `DDNS_MODE=dry-run`: Log record changes instead of applying them
//
// ## Example
//
// ```yaml
// servers: [resolver1.opendns.com, resolver2.opendns.com]
// domain: myip.opendns.com
// zones:
//   example.com: home
//   example.org: [vpn, "@"]
// ttl: { minutes: 5 }
// interval: 60
// log_levels:
//   hickory_proto: WARNING
// provider:
//   type: cloudflare
// ```
//
// ```bash
// export DDNS_PROVIDER_API_TOKEN=your_token
// ddnsd --config ./ddns.yaml
// ```

use std::collections::BTreeMap;
use std::env;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ddns_core::engine::EngineEvent;
use ddns_core::{DdnsConfig, DdnsEngine, ProviderConfig, ProviderRegistry, Reconciler, ResolverPool};
use ddns_resolver_hickory::HickoryDnsClient;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Configuration path used when neither `--config` nor `DDNS_CONFIG` is set
const DEFAULT_CONFIG_PATH: &str = "/etc/ddnsd/ddns.yaml";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep DNS A records pointed at this host's public addresses
#[derive(Debug, Parser)]
#[command(name = "ddnsd", version, about, long_about = None)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, env = "DDNS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Load, override and validate the configuration file
fn load_config(path: &Path) -> Result<DdnsConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut config = parse_config(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    apply_env_overrides(&mut config, env::var("DDNS_PROVIDER_API_TOKEN").ok());
    config.validate()?;
    Ok(config)
}

fn parse_config(raw: &str) -> Result<DdnsConfig> {
    Ok(serde_yaml::from_str(raw)?)
}

/// Secrets belong in the environment, not in the file
fn apply_env_overrides(config: &mut DdnsConfig, api_token: Option<String>) {
    if let (ProviderConfig::Cloudflare { api_token: token, .. }, Some(value)) =
        (&mut config.provider, api_token)
    {
        *token = value;
    }
}

/// Map a configured level name to a tracing directive
///
/// Accepts the usual level names in any case, plus `WARNING` and `CRITICAL`.
fn level_directive(level: &str) -> Result<&'static str> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "critical" => Ok("error"),
        "off" => Ok("off"),
        _ => anyhow::bail!(
            "Log level '{}' is not valid. \
            Valid levels: trace, debug, info, warning, error, critical",
            level
        ),
    }
}

/// Build the EnvFilter directive string: base level, then one per target
fn filter_directives(base: &str, log_levels: &BTreeMap<String, String>) -> Result<String> {
    let mut directives = vec![level_directive(base)?.to_string()];
    for (target, level) in log_levels {
        directives.push(format!("{target}={}", level_directive(level)?));
    }
    Ok(directives.join(","))
}

fn init_tracing(config: &DdnsConfig) -> Result<()> {
    let base = env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(filter_directives(&base, &config.log_levels)?)
        .context("Invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_tracing(&config) {
        eprintln!("{:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd {}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", cli.config.display());

    // Cycles are strictly sequential, one thread is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon
async fn run_daemon(config: DdnsConfig) -> DdnsExitCode {
    let (mut engine, events) = match build_engine(&config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    let shutdown = match shutdown_signal() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!("{:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    tokio::spawn(log_events(events));

    match engine.run_until(shutdown).await {
        Ok(()) => {
            info!("Shutting down daemon");
            DdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Daemon error: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Wire the record store, DNS client and engine from configuration
fn build_engine(config: &DdnsConfig) -> Result<(DdnsEngine, mpsc::Receiver<EngineEvent>)> {
    let mut registry = ProviderRegistry::new();
    ddns_core::store::register(&mut registry);

    #[cfg(feature = "cloudflare")]
    {
        debug!("Registering Cloudflare record store");
        ddns_provider_cloudflare::register(&mut registry);
    }

    info!("Provider type: {}", config.provider.type_name());
    let store = registry.create_store(&config.provider)?;

    let client = HickoryDnsClient::from_system(Duration::from_secs(
        config.engine.query_timeout_secs,
    ))?;
    let pool = ResolverPool::new(config.servers.clone(), Box::new(client));

    Ok(DdnsEngine::new(pool, Reconciler::new(store), config)?)
}

/// Drain engine events into the debug log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Engine event: {:?}", event);
    }
}

/// Future resolving on the first SIGTERM or SIGINT
///
/// Handlers are installed before this returns, so a signal arriving during
/// the first cycle is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Future resolving on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: SIGINT"),
            Err(e) => error!("Failed to wait for CTRL-C: {}", e),
        }
    })
}
