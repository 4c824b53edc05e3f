//! HTTP surface: router, handlers, auth middleware, error mapping.
//!
//! The router exposes the four read-only endpoints without authentication
//! and gates `POST /convert` behind the API key middleware when keys are
//! configured. [`ApiError`] is the single place a [`ConvertError`] becomes
//! an HTTP status and JSON error body; internal detail is logged here and
//! never forwarded.

use crate::auth::{KeyStore, API_KEY_HEADER};
use crate::config::{ServiceConfig, TimeoutStatus};
use crate::error::ConvertError;
use crate::pipeline::{engine, validate::OutputFormat};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, warn};

/// Service name reported by `/` and `/health`.
pub const SERVICE_NAME: &str = "chordpro-api";

/// Shared per-process state: the immutable configuration and the key
/// store built from it. Cloning is cheap (two `Arc`s) and no field is
/// mutated after startup, so handlers take it without locking.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub keys: Arc<KeyStore>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let keys = KeyStore::from_config(&config);
        Self {
            config: Arc::new(config),
            keys: Arc::new(keys),
        }
    }
}

/// Build the application router.
///
/// The body-size layer is sized above the content limit so oversized
/// `content` reaches the validator and earns its specific 400 instead of a
/// bare 413; the layer only backstops grossly oversized bodies.
pub fn app(state: AppState) -> Router {
    let body_limit = 2 * state.config.max_content_bytes + 64 * 1024;

    let gated = Router::new()
        .route("/convert", post(convert_doc))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/formats", get(formats))
        .route("/options", get(option_schema))
        .merge(gated)
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /health": "service and engine status",
            "GET /formats": "supported output formats",
            "GET /options": "recognised conversion options",
            "POST /convert": "convert ChordPro content (X-API-Key required when keys are configured)",
        },
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let version = engine::probe(&state.config).await;
    let available = version.is_some();
    Json(serde_json::json!({
        "status": if available { "healthy" } else { "degraded" },
        "service": SERVICE_NAME,
        "engine_available": available,
        "engine_version": version,
    }))
}

async fn formats() -> impl IntoResponse {
    Json(serde_json::json!({
        "supported_formats": OutputFormat::ALL,
        "default_format": OutputFormat::default(),
    }))
}

async fn option_schema(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "supported_options": {
            "transpose": {
                "type": "integer",
                "description": "Transpose by semitones (-48 to 48)",
            },
            "meta": {
                "type": "object",
                "description": "Metadata key-value pairs (string values)",
            },
            "diagrams": {
                "type": "boolean",
                "description": "Include chord diagrams (default true)",
            },
            "config": {
                "type": "string|array",
                "description": "Configuration preset name(s); comma-separated string or array, applied in order",
                "known_presets": state.config.presets,
            },
        },
    }))
}

async fn convert_doc(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let output = crate::convert::convert(&state.config, &body)
        .await
        .map_err(|err| ApiError::from_convert(err, state.config.timeout_status))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(output.content_type),
    );
    let disposition = format!("attachment; filename=\"output.{}\"", output.format.as_str());
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((headers, output.bytes).into_response())
}

// ── Middleware ───────────────────────────────────────────────────────────

/// Gate a request on the key store, emitting one audit event per outcome.
/// Only the non-secret fingerprint of the presented key is ever logged.
async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.keys.verify(presented) {
        Ok(()) => {
            if let Some(key) = presented {
                debug!(key = %KeyStore::fingerprint(key), "api key accepted");
            }
            next.run(request).await
        }
        Err(err) => {
            match presented {
                Some(key) => warn!(key = %KeyStore::fingerprint(key), "api key rejected"),
                None => warn!("api key missing"),
            }
            ApiError::from_convert(
                ConvertError::Auth(err),
                state.config.timeout_status,
            )
            .into_response()
        }
    }
}

/// Security headers on every response, including errors.
async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

// ── Error mapping ────────────────────────────────────────────────────────

/// A [`ConvertError`] resolved to its HTTP representation.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Map a pipeline error to status and client message, logging the
    /// server-side detail where the client message must stay generic.
    pub fn from_convert(err: ConvertError, timeout_status: TimeoutStatus) -> Self {
        let (status, message) = match err {
            ConvertError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ConvertError::Auth(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            ConvertError::EngineFailed { code, detail } => {
                error!(code, %detail, "conversion engine failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("conversion failed: {detail}"),
                )
            }
            ConvertError::Timeout => {
                let status = match timeout_status {
                    TimeoutStatus::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
                    TimeoutStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "conversion exceeded the time limit".to_string())
            }
            ConvertError::Internal(detail) => {
                error!(%detail, "internal conversion error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        Self { status, message }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, ValidationError};

    fn map(err: ConvertError) -> ApiError {
        ApiError::from_convert(err, TimeoutStatus::default())
    }

    #[test]
    fn validation_maps_to_400() {
        let e = map(ConvertError::Validation(ValidationError::ContentEmpty));
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert!(e.message.contains("content"));
    }

    #[test]
    fn auth_maps_to_401() {
        let e = map(ConvertError::Auth(AuthError::Missing));
        assert_eq!(e.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn engine_failure_maps_to_500_with_detail() {
        let e = map(ConvertError::EngineFailed {
            code: 1,
            detail: "bad directive".into(),
        });
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.message.contains("bad directive"));
    }

    #[test]
    fn timeout_status_is_operator_configurable() {
        let e = ApiError::from_convert(ConvertError::Timeout, TimeoutStatus::GatewayTimeout);
        assert_eq!(e.status(), StatusCode::GATEWAY_TIMEOUT);

        let e = ApiError::from_convert(ConvertError::Timeout, TimeoutStatus::InternalError);
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_detail_is_not_forwarded() {
        let e = map(ConvertError::Internal(
            "could not create /var/tmp/xyz: permission denied".into(),
        ));
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.message, "internal error");
    }
}
