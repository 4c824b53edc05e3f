//! Server binary for chordpro-api.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to a `ServiceConfig`, runs the startup checks, and serves.

use anyhow::{Context, Result};
use chordpro_api::{app, pipeline::engine, AppState, AuthMode, ServiceConfig, TimeoutStatus};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve with two accepted keys
  API_KEYS=key-one,key-two chordpro-api

  # Development: no authentication (never in production)
  chordpro-api --open-mode --port 8081

  # Site-local engine and presets
  chordpro-api --engine-bin /opt/chordpro/bin/chordpro \
               --presets ukulele,bandbook,stage-theme

ENVIRONMENT VARIABLES:
  API_KEYS             Comma-separated list of accepted API keys
  API_KEY_<n>          Additional individual keys (API_KEY_1, API_KEY_2, …)
  OPEN_MODE            Serve without authentication when no keys are set
  MAX_CONTENT_BYTES    Maximum accepted content size (default 1048576)
  ENGINE_TIMEOUT_SECS  Per-request engine budget (default 30)
  CHORDPRO_BIN         Engine binary path (default: chordpro on PATH)
  CHORDPRO_PRESETS     Comma-separated accepted preset names
  TIMEOUT_STATUS       504 (default) or 500 for engine timeouts
  RUST_LOG             Standard tracing filter, overrides -v/-q

AUTHENTICATION:
  Conversion requests must carry the configured key in the X-API-Key
  header. With no keys configured the server refuses to start unless
  --open-mode is passed explicitly.
"#;

/// Serve the ChordPro chord-sheet converter over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "chordpro-api",
    version,
    about = "Serve the ChordPro chord-sheet converter over HTTP",
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Bind address.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Bind port.
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Accepted API keys (comma-separated).
    #[arg(long, env = "API_KEYS", value_delimiter = ',', hide_env_values = true)]
    api_keys: Vec<String>,

    /// Serve without authentication when no keys are configured.
    #[arg(long, env = "OPEN_MODE")]
    open_mode: bool,

    /// Maximum accepted content size in bytes.
    #[arg(long, env = "MAX_CONTENT_BYTES", default_value_t = 1024 * 1024)]
    max_content_bytes: usize,

    /// Per-request engine timeout in seconds.
    #[arg(long, env = "ENGINE_TIMEOUT_SECS", default_value_t = 30)]
    engine_timeout_secs: u64,

    /// Conversion engine binary (path or PATH-resolved name).
    #[arg(long, env = "CHORDPRO_BIN", default_value = "chordpro")]
    engine_bin: PathBuf,

    /// Accepted configuration preset names (comma-separated); defaults to
    /// the engine's bundled presets.
    #[arg(long, env = "CHORDPRO_PRESETS", value_delimiter = ',')]
    presets: Vec<String>,

    /// Status code for engine timeouts.
    #[arg(long, env = "TIMEOUT_STATUS", value_enum, default_value = "504")]
    timeout_status: TimeoutStatusArg,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CHORDPRO_API_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CHORDPRO_API_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum TimeoutStatusArg {
    #[value(name = "504")]
    GatewayTimeout,
    #[value(name = "500")]
    InternalError,
}

impl From<TimeoutStatusArg> for TimeoutStatus {
    fn from(v: TimeoutStatusArg) -> Self {
        match v {
            TimeoutStatusArg::GatewayTimeout => TimeoutStatus::GatewayTimeout,
            TimeoutStatusArg::InternalError => TimeoutStatus::InternalError,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // ── Build config (fails fast on an accidentally-open deployment) ─────
    let config = build_config(&cli).context("invalid configuration")?;
    let state = AppState::new(config);

    match state.keys.mode() {
        AuthMode::Enforced => info!(
            keys = state.config.api_keys.len(),
            "authentication enabled"
        ),
        AuthMode::Open => warn!("OPEN MODE — authentication disabled; do not use in production"),
    }

    // ── Engine availability check (non-fatal; /health reports degraded) ──
    match engine::probe(&state.config).await {
        Some(version) => info!(engine = %state.config.engine_bin.display(), %version, "engine available"),
        None => warn!(
            engine = %state.config.engine_bin.display(),
            "engine not available at startup; conversions will fail until it is installed"
        ),
    }

    // ── Serve ────────────────────────────────────────────────────────────
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "chordpro-api listening");

    axum::serve(listener, app(state))
        .await
        .context("server error")?;

    Ok(())
}

/// Map CLI args to `ServiceConfig`, folding in `API_KEY_*` singles.
fn build_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut keys = cli.api_keys.clone();
    let singles = individual_env_keys();
    if !singles.is_empty() {
        info!(count = singles.len(), "loaded individual API_KEY_* keys");
        keys.extend(singles);
    }

    let mut builder = ServiceConfig::builder()
        .api_keys(keys)
        .open_mode(cli.open_mode)
        .max_content_bytes(cli.max_content_bytes)
        .engine_bin(cli.engine_bin.clone())
        .engine_timeout(Duration::from_secs(cli.engine_timeout_secs))
        .timeout_status(cli.timeout_status.clone().into());

    if !cli.presets.is_empty() {
        builder = builder.presets(cli.presets.iter().map(|p| p.trim().to_string()));
    }

    Ok(builder.build()?)
}

/// Collect keys from `API_KEY_*` environment variables (`API_KEY_1`,
/// `API_KEY_2`, …), complementing the comma-separated `API_KEYS` list.
fn individual_env_keys() -> Vec<String> {
    std::env::vars()
        .filter(|(name, value)| name.starts_with("API_KEY_") && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
        .collect()
}
