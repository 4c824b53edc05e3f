//! Engine invocation: temp-file staging, bounded subprocess, cleanup.
//!
//! The only stage with side effects, and the failure-sensitive one. All
//! per-request files live in a fresh [`TempDir`] whose `Drop` removes them
//! on every exit path — success, non-zero exit, timeout, and early `?`
//! returns alike. The child process is spawned with `kill_on_drop`, so the
//! timeout path terminates it before the directory is removed.
//!
//! No shared state is held across the await on the subprocess; concurrent
//! requests block only inside their own invocation.

use crate::config::ServiceConfig;
use crate::error::ConvertError;
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::validate::ConversionRequest;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Budget for the `--version` availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Stderr excerpt cap for client-visible failure messages.
const MAX_STDERR_BYTES: usize = 1024;

/// Run one engine invocation for a validated request.
///
/// `args` is the list produced by [`crate::pipeline::args::build_args`];
/// the input and output paths are created here and prepended in the
/// engine's `<input> -o <output>` convention. Exactly one attempt is made:
/// failures are returned, never retried.
pub async fn run(
    config: &ServiceConfig,
    request: &ConversionRequest,
    args: &[String],
) -> Result<ConversionOutput, ConvertError> {
    let workdir = TempDir::new()
        .map_err(|e| ConvertError::Internal(format!("failed to create temp dir: {e}")))?;
    let input_path = workdir.path().join("input.cho");
    let output_path = workdir
        .path()
        .join(format!("output.{}", request.format.as_str()));

    tokio::fs::write(&input_path, &request.content)
        .await
        .map_err(|e| ConvertError::Internal(format!("failed to write input file: {e}")))?;

    debug!(
        engine = %config.engine_bin.display(),
        format = request.format.as_str(),
        ?args,
        "invoking engine"
    );

    let mut cmd = Command::new(&config.engine_bin);
    cmd.arg(&input_path)
        .arg("-o")
        .arg(&output_path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let waited = tokio::time::timeout(config.engine_timeout, cmd.output()).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let output = match waited {
        // Elapsed: the dropped future kills the child via kill_on_drop.
        Err(_) => {
            warn!(
                timeout_ms = config.engine_timeout.as_millis() as u64,
                "engine exceeded time limit, terminated"
            );
            return Err(ConvertError::Timeout);
        }
        Ok(Err(e)) => {
            return Err(ConvertError::Internal(format!(
                "failed to spawn engine '{}': {e}",
                config.engine_bin.display()
            )));
        }
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = sanitize_stderr(&stderr, &input_path, &output_path);
        error!(code, %detail, "engine exited non-zero");
        return Err(ConvertError::EngineFailed { code, detail });
    }

    let bytes = tokio::fs::read(&output_path).await.map_err(|_| {
        ConvertError::Internal("engine reported success but produced no output file".to_string())
    })?;

    debug!(bytes = bytes.len(), elapsed_ms, "engine finished");

    Ok(ConversionOutput {
        content_type: request.format.content_type(),
        format: request.format,
        stats: ConversionStats {
            engine_duration_ms: elapsed_ms,
            output_bytes: bytes.len(),
        },
        bytes,
    })
}

/// Probe engine availability with `--version`.
///
/// Returns the reported version string, or `None` when the binary is
/// missing, fails, or does not answer within 2 seconds. Used by `/health`
/// and the startup check; never fatal.
pub async fn probe(config: &ServiceConfig) -> Option<String> {
    let mut cmd = Command::new(&config.engine_bin);
    cmd.arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    match tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let version = stdout.trim();
            let version = if version.is_empty() {
                stderr.trim()
            } else {
                version
            };
            if version.is_empty() {
                Some("unknown".to_string())
            } else {
                Some(version.lines().next().unwrap_or("unknown").to_string())
            }
        }
        _ => None,
    }
}

static RE_ABS_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:/[A-Za-z0-9._~-]+){2,}").unwrap());

/// Scrub an engine stderr excerpt for client consumption.
///
/// The per-request temp paths become `<input>`/`<output>`, any remaining
/// absolute path is elided, and the result is truncated to 1 KiB. The raw
/// stderr stays in the server-side log only.
fn sanitize_stderr(raw: &str, input_path: &Path, output_path: &Path) -> String {
    let mut text = raw.trim().to_string();
    text = text.replace(&input_path.display().to_string(), "<input>");
    text = text.replace(&output_path.display().to_string(), "<output>");
    text = RE_ABS_PATH.replace_all(&text, "<path>").into_owned();

    if text.len() > MAX_STDERR_BYTES {
        let mut end = MAX_STDERR_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push('…');
    }

    if text.is_empty() {
        "no diagnostic output".to_string()
    } else {
        text
    }
}
