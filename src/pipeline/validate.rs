//! Request validation: raw JSON body to a typed [`ConversionRequest`].
//!
//! The rules run in a fixed order and each failure names the offending
//! field, so clients never get a generic deserializer message. The body is
//! inspected at the `serde_json::Value` level rather than derived into a
//! struct: rule 2 must distinguish "content is not text" from "body is not
//! JSON", which a derived deserializer collapses into one error.
//!
//! This stage is pure — no filesystem or network access. The dynamic
//! string-or-array shape of `options.config` is normalized here into one
//! canonical ordered `Vec<String>`, so downstream stages never branch on
//! input shape.

use crate::config::ServiceConfig;
use crate::error::ValidationError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Accepted transpose range in semitones, either direction.
pub const MAX_TRANSPOSE: i64 = 48;

/// Supported output formats. `Pdf` is the documented default.
/// Serializes to the wire name, matching [`OutputFormat::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pdf,
    Text,
    Cho,
    Html,
}

impl OutputFormat {
    /// All supported formats, in the order advertised by `/formats`.
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Pdf,
        OutputFormat::Text,
        OutputFormat::Cho,
        OutputFormat::Html,
    ];

    /// Wire name, also used as the output file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Text => "text",
            OutputFormat::Cho => "cho",
            OutputFormat::Html => "html",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(OutputFormat::Pdf),
            "text" => Some(OutputFormat::Text),
            "cho" => Some(OutputFormat::Cho),
            "html" => Some(OutputFormat::Html),
            _ => None,
        }
    }

    /// MIME type of the rendered output.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Text | OutputFormat::Cho => "text/plain",
            OutputFormat::Html => "text/html",
        }
    }

    /// Backend name for the engine's format-selection flag.
    pub fn generate_arg(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "PDF",
            OutputFormat::Text => "Text",
            OutputFormat::Cho => "ChordPro",
            OutputFormat::Html => "HTML",
        }
    }
}

/// Validated conversion options.
///
/// `meta` is a `BTreeMap` so iteration (and therefore the mapped argument
/// list) is in stable lexicographic key order. `config` preserves the
/// client-supplied order exactly — later presets override earlier ones
/// inside the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    pub transpose: Option<i32>,
    pub meta: BTreeMap<String, String>,
    pub diagrams: bool,
    pub config: Vec<String>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            transpose: None,
            meta: BTreeMap::new(),
            diagrams: true,
            config: Vec::new(),
        }
    }
}

/// A fully validated conversion request. Every field is guaranteed to be
/// within bounds; downstream stages perform no further input checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub content: String,
    pub format: OutputFormat,
    pub options: ConversionOptions,
}

/// Validate a raw request body against the configured limits and presets.
///
/// Rules, in order: parseable JSON object; `content` present / text /
/// non-empty / within the size limit; known `output_format` (default
/// `pdf`); `transpose` an integer in ±48; `meta` a flat string map;
/// `diagrams` a boolean; `config` a string or string array naming only
/// known presets. The size check runs before anything else touches the
/// content, bounding memory for the rest of the pipeline.
pub fn validate(raw: &[u8], config: &ServiceConfig) -> Result<ConversionRequest, ValidationError> {
    let body: Value = serde_json::from_slice(raw).map_err(|_| ValidationError::MalformedBody)?;
    let body = body.as_object().ok_or(ValidationError::MalformedBody)?;

    let content = match body.get("content") {
        None | Some(Value::Null) => return Err(ValidationError::ContentMissing),
        Some(Value::String(s)) => s,
        Some(_) => return Err(ValidationError::ContentNotText),
    };
    if content.is_empty() {
        return Err(ValidationError::ContentEmpty);
    }
    if content.len() > config.max_content_bytes {
        return Err(ValidationError::ContentTooLarge {
            limit: config.max_content_bytes,
        });
    }

    let format = match body.get("output_format") {
        None | Some(Value::Null) => OutputFormat::default(),
        Some(Value::String(s)) => {
            OutputFormat::parse(s).ok_or_else(|| ValidationError::UnknownFormat {
                value: s.clone(),
            })?
        }
        Some(other) => {
            return Err(ValidationError::UnknownFormat {
                value: other.to_string(),
            })
        }
    };

    let options = match body.get("options") {
        None | Some(Value::Null) => ConversionOptions::default(),
        Some(Value::Object(map)) => validate_options(map, config)?,
        Some(_) => return Err(ValidationError::OptionsNotObject),
    };

    Ok(ConversionRequest {
        content: content.clone(),
        format,
        options,
    })
}

fn validate_options(
    map: &Map<String, Value>,
    config: &ServiceConfig,
) -> Result<ConversionOptions, ValidationError> {
    let mut options = ConversionOptions::default();

    for (key, value) in map {
        match key.as_str() {
            "transpose" => {
                let n = value
                    .as_i64()
                    .ok_or(ValidationError::TransposeNotInteger)?;
                if !(-MAX_TRANSPOSE..=MAX_TRANSPOSE).contains(&n) {
                    return Err(ValidationError::TransposeOutOfRange { value: n });
                }
                options.transpose = Some(n as i32);
            }
            "meta" => {
                let entries = value.as_object().ok_or(ValidationError::MetaNotObject)?;
                for (meta_key, meta_value) in entries {
                    let text = meta_value.as_str().ok_or_else(|| {
                        ValidationError::MetaValueNotString {
                            key: meta_key.clone(),
                        }
                    })?;
                    options.meta.insert(meta_key.clone(), text.to_string());
                }
            }
            "diagrams" => {
                options.diagrams = value.as_bool().ok_or(ValidationError::DiagramsNotBool)?;
            }
            "config" => {
                options.config = normalize_config(value, config)?;
            }
            other => {
                return Err(ValidationError::UnknownOption {
                    key: other.to_string(),
                })
            }
        }
    }

    Ok(options)
}

/// Normalize the string-or-array `config` shape into one ordered list and
/// check every name against the known preset set.
fn normalize_config(
    value: &Value,
    config: &ServiceConfig,
) -> Result<Vec<String>, ValidationError> {
    let names: Vec<String> = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or(ValidationError::ConfigNotStrings)
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(ValidationError::ConfigNotStrings),
    };

    for name in &names {
        if !config.presets.iter().any(|preset| preset == name) {
            return Err(ValidationError::UnknownPreset { name: name.clone() });
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn test_config() -> ServiceConfig {
        ServiceConfig::builder().open_mode(true).build().unwrap()
    }

    fn validate_str(body: &str) -> Result<ConversionRequest, ValidationError> {
        validate(body.as_bytes(), &test_config())
    }

    #[test]
    fn minimal_request_defaults_to_pdf() {
        let req = validate_str(r#"{"content": "{title: X}\n[C]la"}"#).unwrap();
        assert_eq!(req.format, OutputFormat::Pdf);
        assert_eq!(req.content, "{title: X}\n[C]la");
        assert_eq!(req.options, ConversionOptions::default());
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert_eq!(
            validate_str("not json").unwrap_err(),
            ValidationError::MalformedBody
        );
        assert_eq!(
            validate_str(r#"["an", "array"]"#).unwrap_err(),
            ValidationError::MalformedBody
        );
    }

    #[test]
    fn content_rules_fire_in_order() {
        assert_eq!(
            validate_str("{}").unwrap_err(),
            ValidationError::ContentMissing
        );
        assert_eq!(
            validate_str(r#"{"content": null}"#).unwrap_err(),
            ValidationError::ContentMissing
        );
        assert_eq!(
            validate_str(r#"{"content": 42}"#).unwrap_err(),
            ValidationError::ContentNotText
        );
        assert_eq!(
            validate_str(r#"{"content": ""}"#).unwrap_err(),
            ValidationError::ContentEmpty
        );
    }

    #[test]
    fn oversized_content_is_rejected() {
        let config = ServiceConfig::builder()
            .open_mode(true)
            .max_content_bytes(8)
            .build()
            .unwrap();
        let err = validate(br#"{"content": "123456789"}"#, &config).unwrap_err();
        assert_eq!(err, ValidationError::ContentTooLarge { limit: 8 });
    }

    #[test]
    fn unknown_format_is_not_silently_defaulted() {
        let err = validate_str(r#"{"content": "x", "output_format": "docx"}"#).unwrap_err();
        assert_eq!(err, ValidationError::UnknownFormat { value: "docx".into() });

        let err = validate_str(r#"{"content": "x", "output_format": 3}"#).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownFormat { .. }));
    }

    #[test]
    fn all_formats_parse() {
        for format in OutputFormat::ALL {
            assert_eq!(OutputFormat::parse(format.as_str()), Some(format));
        }
        assert_eq!(OutputFormat::parse("PDF"), None);
    }

    #[test]
    fn formats_serialize_to_wire_names() {
        for format in OutputFormat::ALL {
            let value = serde_json::to_value(format).unwrap();
            assert_eq!(value, format.as_str());
        }
    }

    #[test]
    fn transpose_bounds() {
        let req = validate_str(r#"{"content": "x", "options": {"transpose": -3}}"#).unwrap();
        assert_eq!(req.options.transpose, Some(-3));

        let err =
            validate_str(r#"{"content": "x", "options": {"transpose": 49}}"#).unwrap_err();
        assert_eq!(err, ValidationError::TransposeOutOfRange { value: 49 });

        let err =
            validate_str(r#"{"content": "x", "options": {"transpose": 2.5}}"#).unwrap_err();
        assert_eq!(err, ValidationError::TransposeNotInteger);

        let err =
            validate_str(r#"{"content": "x", "options": {"transpose": "2"}}"#).unwrap_err();
        assert_eq!(err, ValidationError::TransposeNotInteger);
    }

    #[test]
    fn meta_must_be_flat_string_map() {
        let req = validate_str(
            r#"{"content": "x", "options": {"meta": {"title": "T", "artist": "A"}}}"#,
        )
        .unwrap();
        assert_eq!(req.options.meta.get("title").map(String::as_str), Some("T"));

        let err =
            validate_str(r#"{"content": "x", "options": {"meta": {"year": 1999}}}"#).unwrap_err();
        assert_eq!(err, ValidationError::MetaValueNotString { key: "year".into() });

        let err = validate_str(r#"{"content": "x", "options": {"meta": []}}"#).unwrap_err();
        assert_eq!(err, ValidationError::MetaNotObject);
    }

    #[test]
    fn diagrams_must_be_boolean() {
        let req =
            validate_str(r#"{"content": "x", "options": {"diagrams": false}}"#).unwrap();
        assert!(!req.options.diagrams);

        let err =
            validate_str(r#"{"content": "x", "options": {"diagrams": "yes"}}"#).unwrap_err();
        assert_eq!(err, ValidationError::DiagramsNotBool);
    }

    #[test]
    fn config_string_and_array_normalize_identically() {
        let from_string =
            validate_str(r#"{"content": "x", "options": {"config": "ukulele, modern3"}}"#)
                .unwrap();
        let from_array =
            validate_str(r#"{"content": "x", "options": {"config": ["ukulele", "modern3"]}}"#)
                .unwrap();
        assert_eq!(from_string.options.config, vec!["ukulele", "modern3"]);
        assert_eq!(from_string.options.config, from_array.options.config);
    }

    #[test]
    fn config_order_is_preserved() {
        let req =
            validate_str(r#"{"content": "x", "options": {"config": ["modern3", "ukulele"]}}"#)
                .unwrap();
        assert_eq!(req.options.config, vec!["modern3", "ukulele"]);
    }

    #[test]
    fn unknown_preset_is_named() {
        let err = validate_str(
            r#"{"content": "x", "options": {"config": "ukulele,nonexistent-preset"}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownPreset {
                name: "nonexistent-preset".into()
            }
        );
    }

    #[test]
    fn config_shape_errors() {
        let err = validate_str(r#"{"content": "x", "options": {"config": 7}}"#).unwrap_err();
        assert_eq!(err, ValidationError::ConfigNotStrings);

        let err =
            validate_str(r#"{"content": "x", "options": {"config": ["ukulele", 7]}}"#)
                .unwrap_err();
        assert_eq!(err, ValidationError::ConfigNotStrings);
    }

    #[test]
    fn unknown_option_key_is_rejected() {
        let err = validate_str(r#"{"content": "x", "options": {"columns": 2}}"#).unwrap_err();
        assert_eq!(err, ValidationError::UnknownOption { key: "columns".into() });
    }

    #[test]
    fn options_must_be_object() {
        let err = validate_str(r#"{"content": "x", "options": []}"#).unwrap_err();
        assert_eq!(err, ValidationError::OptionsNotObject);
    }

    #[test]
    fn content_types_per_format() {
        assert_eq!(OutputFormat::Pdf.content_type(), "application/pdf");
        assert_eq!(OutputFormat::Text.content_type(), "text/plain");
        assert_eq!(OutputFormat::Cho.content_type(), "text/plain");
        assert_eq!(OutputFormat::Html.content_type(), "text/html");
    }
}
