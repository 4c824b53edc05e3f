//! # chordpro-api
//!
//! Serve the [ChordPro](https://www.chordpro.org) chord-sheet converter
//! over HTTP. Clients POST ChordPro markup plus structured options and get
//! the rendered document (PDF, HTML, plain text, or normalized ChordPro
//! source) back in the response body — conversion-as-a-service instead of
//! a local binary.
//!
//! The engine itself is an external, pre-existing process; this crate is
//! the pipeline between the HTTP boundary and that process: key checking,
//! payload validation, option-to-flag mapping, scoped temp-file staging,
//! bounded subprocess invocation, and error-to-status mapping.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /convert
//!  │
//!  ├─ 1. Auth      constant-time key check (skipped in open mode)
//!  ├─ 2. Validate  ordered rules over the JSON body → typed request
//!  ├─ 3. Map       options → deterministic engine argument list
//!  ├─ 4. Engine    temp files + subprocess, killed on timeout
//!  └─ 5. Respond   rendered bytes, or {"error": …} with a mapped status
//! ```
//!
//! Every request is independent; the only shared state is the immutable
//! startup configuration. Temp files live in a per-request directory that
//! is removed on every exit path.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chordpro_api::{app, AppState, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .api_keys(["an-operator-issued-key"])
//!         .build()?;
//!     let router = app(AppState::new(config));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `chordpro-api` server binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! chordpro-api = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod auth;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use auth::{AuthMode, KeyStore, API_KEY_HEADER};
pub use config::{ServiceConfig, ServiceConfigBuilder, TimeoutStatus};
pub use convert::convert;
pub use error::{AuthError, ConfigError, ConvertError, ValidationError};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::validate::{ConversionOptions, ConversionRequest, OutputFormat};
pub use server::{app, AppState};
