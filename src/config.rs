//! Service configuration.
//!
//! Every startup knob lives in one immutable [`ServiceConfig`], built via
//! [`ServiceConfigBuilder`] and shared read-only across all request workers.
//! The builder is the single place the "secure by default" rule is enforced:
//! an empty key set without the explicit open-mode flag fails `build()`, so
//! a misconfigured deployment never starts serving unauthenticated traffic.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default maximum accepted `content` size in bytes (1 MiB).
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 1024 * 1024;

/// Default per-request engine timeout.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine binary resolved from `PATH` when no explicit path is configured.
pub const DEFAULT_ENGINE_BIN: &str = "chordpro";

/// Configuration presets bundled with the engine, accepted by default.
/// Operators can replace this set with `--presets` for site-local configs.
pub const DEFAULT_PRESETS: &[&str] = &[
    "guitar",
    "keyboard",
    "mandolin",
    "modern1",
    "modern2",
    "modern3",
    "nashville",
    "roman",
    "ukulele",
    "ukulele-ly",
];

/// Keys shorter than this trigger a startup warning.
const MIN_KEY_LEN: usize = 16;

/// Which status code a conversion timeout maps to.
///
/// 504 is the accurate choice (an upstream dependency timed out), but some
/// fronting proxies treat 504 as a retry signal, so 500 is selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutStatus {
    /// HTTP 504 Gateway Timeout (default).
    #[default]
    GatewayTimeout,
    /// HTTP 500 Internal Server Error.
    InternalError,
}

/// Immutable service configuration, constructed once at startup.
///
/// # Example
/// ```rust
/// use chordpro_api::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .api_keys(["a-long-operator-issued-key"])
///     .engine_timeout(std::time::Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(config.api_keys.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Accepted API keys. Empty only when `open_mode` is set.
    pub api_keys: Vec<String>,

    /// Serve without authentication when the key set is empty.
    /// Must be requested explicitly; never inferred.
    pub open_mode: bool,

    /// Maximum accepted `content` byte length. Checked by the validator
    /// before any temp file is written.
    pub max_content_bytes: usize,

    /// Path (or `PATH`-resolved name) of the conversion engine binary.
    pub engine_bin: PathBuf,

    /// Wall-clock budget for a single engine invocation. The subprocess is
    /// killed when the budget is exceeded.
    pub engine_timeout: Duration,

    /// Preset names the validator accepts in `options.config`.
    pub presets: Vec<String>,

    /// Status code policy for engine timeouts.
    pub timeout_status: TimeoutStatus,
}

impl ServiceConfig {
    /// Create a new builder with defaults.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: ServiceConfig {
                api_keys: Vec::new(),
                open_mode: false,
                max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
                engine_bin: PathBuf::from(DEFAULT_ENGINE_BIN),
                engine_timeout: DEFAULT_ENGINE_TIMEOUT,
                presets: DEFAULT_PRESETS.iter().map(|s| s.to_string()).collect(),
                timeout_status: TimeoutStatus::default(),
            },
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Replace the key set. Blank entries are dropped during `build()`.
    pub fn api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.api_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Append a single key.
    pub fn add_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_keys.push(key.into());
        self
    }

    pub fn open_mode(mut self, v: bool) -> Self {
        self.config.open_mode = v;
        self
    }

    pub fn max_content_bytes(mut self, n: usize) -> Self {
        self.config.max_content_bytes = n.max(1);
        self
    }

    pub fn engine_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.config.engine_bin = bin.into();
        self
    }

    pub fn engine_timeout(mut self, d: Duration) -> Self {
        self.config.engine_timeout = d.max(Duration::from_millis(1));
        self
    }

    /// Replace the accepted preset set. Order is irrelevant here; the order
    /// that matters is the one the client supplies per request.
    pub fn presets<I, S>(mut self, presets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.presets = presets.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout_status(mut self, s: TimeoutStatus) -> Self {
        self.config.timeout_status = s;
        self
    }

    /// Build the configuration, enforcing the startup policy.
    ///
    /// Fails with [`ConfigError::NoKeysConfigured`] when the key set is
    /// empty and open mode was not requested, so the process never becomes
    /// ready in an accidentally-open state.
    pub fn build(mut self) -> Result<ServiceConfig, ConfigError> {
        self.config.api_keys = self
            .config
            .api_keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if self.config.api_keys.is_empty() && !self.config.open_mode {
            return Err(ConfigError::NoKeysConfigured);
        }

        if self.config.open_mode && !self.config.api_keys.is_empty() {
            warn!(
                keys = self.config.api_keys.len(),
                "open mode requested but API keys are configured; keys remain enforced"
            );
        }

        let weak = self
            .config
            .api_keys
            .iter()
            .filter(|k| k.len() < MIN_KEY_LEN)
            .count();
        if weak > 0 {
            warn!(
                weak,
                "API keys shorter than {MIN_KEY_LEN} characters configured; consider stronger keys"
            );
        }

        Ok(self.config)
    }
}
