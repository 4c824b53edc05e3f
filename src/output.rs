//! Output types for a completed conversion.

use crate::pipeline::validate::OutputFormat;
use serde::Serialize;

/// The rendered document plus per-run statistics.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Bytes the engine wrote to the output file.
    pub bytes: Vec<u8>,
    /// MIME type matching the requested format.
    pub content_type: &'static str,
    /// The format that was rendered.
    pub format: OutputFormat,
    pub stats: ConversionStats,
}

/// Statistics for one engine invocation, logged per request.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ConversionStats {
    /// Wall-clock time spent inside the engine subprocess.
    pub engine_duration_ms: u64,
    /// Size of the rendered output in bytes.
    pub output_bytes: usize,
}
