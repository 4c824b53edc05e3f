//! Conversion entry point: the pipeline walked end to end.
//!
//! [`convert`] is the single function the HTTP handler calls. Validation
//! and option mapping run first and are pure; only a request that passed
//! both reaches the engine stage, so no temp file or process ever exists
//! for an invalid payload.

use crate::config::ServiceConfig;
use crate::error::ConvertError;
use crate::output::ConversionOutput;
use crate::pipeline::{args, engine, validate};
use tracing::{debug, info};

/// Convert a raw request body into a rendered document.
///
/// # Errors
/// - [`ConvertError::Validation`] — payload rejected; nothing was staged.
/// - [`ConvertError::EngineFailed`] / [`ConvertError::Timeout`] — the
///   engine ran and did not produce output.
/// - [`ConvertError::Internal`] — unexpected pipeline failure.
pub async fn convert(
    config: &ServiceConfig,
    raw_body: &[u8],
) -> Result<ConversionOutput, ConvertError> {
    let request = validate::validate(raw_body, config)?;
    let arguments = args::build_args(&request);

    debug!(
        format = request.format.as_str(),
        content_bytes = request.content.len(),
        presets = request.options.config.len(),
        "request validated"
    );

    let output = engine::run(config, &request, &arguments).await?;

    info!(
        format = output.format.as_str(),
        bytes = output.stats.output_bytes,
        engine_ms = output.stats.engine_duration_ms,
        "conversion complete"
    );

    Ok(output)
}
