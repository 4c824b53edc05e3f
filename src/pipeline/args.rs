//! Option mapping: validated request to engine argument list.
//!
//! Pure and deterministic — the same [`ConversionRequest`] always yields a
//! byte-identical argument list. The input and output paths are not part of
//! this list; they are per-invocation and appended by the engine stage.

use crate::pipeline::validate::ConversionRequest;

/// Build the engine arguments for a validated request.
///
/// Mapping rules:
/// - exactly one `--generate=<backend>` format flag;
/// - `--transpose <n>` only when transpose was supplied;
/// - one `--meta key=value` per pair, in lexicographic key order (the
///   request's `BTreeMap` iteration order);
/// - `--no-diagrams` only when diagrams were disabled — the engine default
///   already includes diagrams;
/// - one `--config <name>` per preset, in the order supplied. Later
///   presets override earlier ones inside the engine, so the order must
///   survive exactly as the client sent it.
pub fn build_args(request: &ConversionRequest) -> Vec<String> {
    let mut args = Vec::new();

    args.push(format!("--generate={}", request.format.generate_arg()));

    if let Some(semitones) = request.options.transpose {
        args.push("--transpose".to_string());
        args.push(semitones.to_string());
    }

    for (key, value) in &request.options.meta {
        args.push("--meta".to_string());
        args.push(format!("{key}={value}"));
    }

    if !request.options.diagrams {
        args.push("--no-diagrams".to_string());
    }

    for preset in &request.options.config {
        args.push("--config".to_string());
        args.push(preset.clone());
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::validate::{ConversionOptions, ConversionRequest, OutputFormat};
    use std::collections::BTreeMap;

    fn request(format: OutputFormat, options: ConversionOptions) -> ConversionRequest {
        ConversionRequest {
            content: "[C]la".to_string(),
            format,
            options,
        }
    }

    #[test]
    fn defaults_emit_only_the_format_flag() {
        let args = build_args(&request(OutputFormat::Pdf, ConversionOptions::default()));
        assert_eq!(args, vec!["--generate=PDF"]);
    }

    #[test]
    fn each_format_selects_one_backend() {
        for (format, backend) in [
            (OutputFormat::Pdf, "--generate=PDF"),
            (OutputFormat::Text, "--generate=Text"),
            (OutputFormat::Cho, "--generate=ChordPro"),
            (OutputFormat::Html, "--generate=HTML"),
        ] {
            let args = build_args(&request(format, ConversionOptions::default()));
            assert_eq!(args[0], backend);
            assert_eq!(
                args.iter().filter(|a| a.starts_with("--generate")).count(),
                1
            );
        }
    }

    #[test]
    fn transpose_is_omitted_when_absent() {
        let args = build_args(&request(OutputFormat::Pdf, ConversionOptions::default()));
        assert!(!args.iter().any(|a| a.contains("transpose")));

        let args = build_args(&request(
            OutputFormat::Pdf,
            ConversionOptions {
                transpose: Some(-5),
                ..ConversionOptions::default()
            },
        ));
        assert_eq!(args[1..3], ["--transpose", "-5"]);
    }

    #[test]
    fn meta_pairs_come_out_in_lexicographic_key_order() {
        let mut meta = BTreeMap::new();
        meta.insert("title".to_string(), "Amazing Grace".to_string());
        meta.insert("artist".to_string(), "Trad.".to_string());
        meta.insert("key".to_string(), "G".to_string());

        let args = build_args(&request(
            OutputFormat::Pdf,
            ConversionOptions {
                meta,
                ..ConversionOptions::default()
            },
        ));
        let pairs: Vec<&str> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| flag.as_str() == "--meta")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(pairs, vec!["artist=Trad.", "key=G", "title=Amazing Grace"]);
    }

    #[test]
    fn diagrams_flag_only_on_disable() {
        let args = build_args(&request(
            OutputFormat::Pdf,
            ConversionOptions {
                diagrams: false,
                ..ConversionOptions::default()
            },
        ));
        assert!(args.contains(&"--no-diagrams".to_string()));

        let args = build_args(&request(OutputFormat::Pdf, ConversionOptions::default()));
        assert!(!args.iter().any(|a| a.contains("diagrams")));
    }

    #[test]
    fn config_presets_keep_supplied_order() {
        let args = build_args(&request(
            OutputFormat::Pdf,
            ConversionOptions {
                config: vec!["modern3".to_string(), "ukulele".to_string()],
                ..ConversionOptions::default()
            },
        ));
        let presets: Vec<&str> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| flag.as_str() == "--config")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(presets, vec!["modern3", "ukulele"]);
    }

    #[test]
    fn repeated_calls_are_byte_identical() {
        let mut meta = BTreeMap::new();
        meta.insert("title".to_string(), "X".to_string());
        let req = request(
            OutputFormat::Html,
            ConversionOptions {
                transpose: Some(2),
                meta,
                diagrams: false,
                config: vec!["ukulele".to_string(), "modern3".to_string()],
            },
        );
        let first = build_args(&req);
        for _ in 0..8 {
            assert_eq!(build_args(&req), first);
        }
    }
}
