//! Error types for the chordpro-api library.
//!
//! Three layers of errors reflect where a request can go wrong:
//!
//! * [`ValidationError`] — the request payload failed one of the ordered
//!   validation rules. Produced before any file or process exists.
//! * [`AuthError`] — the caller presented no key or a wrong key. Also
//!   produced before any resource is touched.
//! * [`ConvertError`] — the top-level taxonomy the HTTP layer maps to a
//!   status code. Wraps the two above and adds the post-spawn failures
//!   (engine exit, timeout, internal).
//!
//! `Internal` carries the underlying detail for server-side logs; the HTTP
//! layer never forwards that detail to the client.

use thiserror::Error;

/// A request payload rejected by one of the validation rules.
///
/// Each variant corresponds to exactly one rule so the client always learns
/// which field failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Body was not parseable as a JSON object.
    #[error("request body must be a JSON object")]
    MalformedBody,

    /// `content` field absent (or null).
    #[error("'content' field is required")]
    ContentMissing,

    /// `content` present but not a string.
    #[error("'content' must be a string")]
    ContentNotText,

    /// `content` present but empty.
    #[error("'content' must not be empty")]
    ContentEmpty,

    /// `content` byte length exceeds the configured maximum.
    #[error("'content' exceeds the maximum size of {limit} bytes")]
    ContentTooLarge { limit: usize },

    /// `output_format` is not one of the supported values.
    #[error("unsupported output format '{value}'")]
    UnknownFormat { value: String },

    /// `options` present but not an object.
    #[error("'options' must be an object")]
    OptionsNotObject,

    /// An option key outside the recognised set.
    #[error("unknown option '{key}'")]
    UnknownOption { key: String },

    /// `transpose` present but not an integer.
    #[error("'transpose' must be an integer")]
    TransposeNotInteger,

    /// `transpose` outside the accepted semitone range.
    #[error("'transpose' must be between -48 and 48 semitones, got {value}")]
    TransposeOutOfRange { value: i64 },

    /// `meta` present but not an object.
    #[error("'meta' must be an object of string values")]
    MetaNotObject,

    /// A `meta` entry whose value is not a string.
    #[error("'meta' value for '{key}' must be a string")]
    MetaValueNotString { key: String },

    /// `diagrams` present but not a boolean.
    #[error("'diagrams' must be a boolean")]
    DiagramsNotBool,

    /// `config` present but neither a string nor an array of strings.
    #[error("'config' must be a string or an array of strings")]
    ConfigNotStrings,

    /// A `config` entry naming a preset the service does not know.
    #[error("unknown config preset '{name}'")]
    UnknownPreset { name: String },
}

/// Authentication failure, produced before the validator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The request carried no API key header.
    #[error("valid API key required; include the 'X-API-Key' header")]
    Missing,

    /// The presented key matched none of the configured keys.
    #[error("invalid API key")]
    Invalid,
}

/// Top-level failure taxonomy for a conversion request.
///
/// The HTTP layer maps each variant to a status code; `Validation` and
/// `Auth` are guaranteed to occur before any temp file is written or any
/// process is spawned.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Payload rejected by the validator.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Caller failed authentication.
    #[error("unauthorized: {0}")]
    Auth(#[from] AuthError),

    /// The engine ran and exited non-zero. `detail` is a truncated,
    /// path-scrubbed stderr excerpt, safe to forward to the client.
    #[error("conversion engine failed (exit {code}): {detail}")]
    EngineFailed { code: i32, detail: String },

    /// The engine exceeded the configured time limit and was terminated.
    #[error("conversion exceeded the time limit")]
    Timeout,

    /// Unexpected pipeline failure (temp files, spawn, missing output).
    /// The detail is for server-side logs only; clients receive a generic
    /// message.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Startup configuration rejected by [`crate::config::ServiceConfigBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Authentication is enforced but the key set is empty. The service
    /// refuses to become ready rather than silently serving everyone.
    #[error(
        "no API keys configured and open mode not enabled; \
         set API_KEYS or pass --open-mode to serve without authentication"
    )]
    NoKeysConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_too_large_names_limit() {
        let e = ValidationError::ContentTooLarge { limit: 1_048_576 };
        assert!(e.to_string().contains("1048576"), "got: {e}");
    }

    #[test]
    fn unknown_preset_names_offender() {
        let e = ValidationError::UnknownPreset {
            name: "banjo-deluxe".into(),
        };
        assert!(e.to_string().contains("banjo-deluxe"));
    }

    #[test]
    fn unknown_format_names_value() {
        let e = ValidationError::UnknownFormat {
            value: "docx".into(),
        };
        assert!(e.to_string().contains("docx"));
    }

    #[test]
    fn auth_missing_mentions_header() {
        assert!(AuthError::Missing.to_string().contains("X-API-Key"));
    }

    #[test]
    fn engine_failed_display() {
        let e = ConvertError::EngineFailed {
            code: 2,
            detail: "unknown chord [X9]".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("exit 2"));
        assert!(msg.contains("unknown chord"));
    }

    #[test]
    fn validation_wraps_into_convert_error() {
        let e = ConvertError::from(ValidationError::ContentEmpty);
        assert!(matches!(e, ConvertError::Validation(_)));
    }
}
