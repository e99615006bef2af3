use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};
use tracing::{error, warn};

use docket_core::errors::PipelineError;
use docket_core::input::PipelineInput;
use docket_core::run::PipelineRun;
use docket_engine::demo_snapshot;
use docket_telemetry::MetricsSnapshot;

use crate::rate_limit::Admission;
use crate::server::AppState;

const ANONYMOUS: &str = "anonymous";

/// Error returned by HTTP handlers, rendered as a JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// Body was not JSON at all.
    MalformedBody,
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::MalformedBody => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request format" })),
            )
                .into_response(),
            Self::Pipeline(PipelineError::InvalidInput(details)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request", "details": details })),
            )
                .into_response(),
            Self::Pipeline(PipelineError::RateLimited { retry_after }) => {
                let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
                let mut resp = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": "Rate limit exceeded. Please try again later.",
                        "retryAfterSecs": secs,
                    })),
                )
                    .into_response();
                resp.headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                resp
            }
            Self::Pipeline(e) => {
                error!(error = %e, kind = e.error_kind(), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e.to_string(), "kind": e.error_kind() })),
                )
                    .into_response()
            }
        }
    }
}

/// Caller identity for rate admission: `x-client-id`, else the first
/// `x-forwarded-for` hop, else "anonymous".
pub fn client_id(headers: &HeaderMap) -> String {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    header_str("x-client-id")
        .or_else(|| {
            header_str("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .unwrap_or(ANONYMOUS)
        .to_string()
}

/// HTTP status for a finished run. The body is the run either way.
pub fn run_status_code(run: &PipelineRun) -> StatusCode {
    match &run.error {
        None => StatusCode::OK,
        Some(failure) if failure.kind == "compliance_violation" => StatusCode::UNPROCESSABLE_ENTITY,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /api/pipeline
pub async fn submit_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body: Value = serde_json::from_slice(&body).map_err(|_| ApiError::MalformedBody)?;
    let input = PipelineInput::from_json(&body)?;

    let client = client_id(&headers);
    if let Admission::Refused { retry_after } = state.rate_limiter.check(&client) {
        warn!(client = %client, retry_after_ms = retry_after.as_millis() as u64, "rate limit exceeded");
        return Err(PipelineError::RateLimited { retry_after }.into());
    }

    let run = state.orchestrator.run(&input).await;
    Ok((run_status_code(&run), Json(run)).into_response())
}

/// GET /api/pipeline
pub async fn describe_pipeline() -> Json<Value> {
    Json(json!({
        "endpoint": "/api/pipeline",
        "method": "POST",
        "description": "Run the lead-generation pipeline for one keyword",
        "body": {
            "keyword": "string (1-100 chars)",
            "jurisdiction": "string (2-50 chars)",
            "practiceArea": "string (2-50 chars)",
            "firmId": "string (optional)",
        },
        "responses": {
            "200": "Run completed",
            "400": "Invalid request",
            "422": "Compliance gate failed",
            "429": "Rate limit exceeded",
            "500": "Generation failed",
        },
        "example": {
            "keyword": "car accident lawyer houston",
            "jurisdiction": "Texas",
            "practiceArea": "Personal Injury",
        },
    }))
}

/// GET /api/demo
pub async fn demo() -> Json<PipelineRun> {
    Json(demo_snapshot())
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "mode": state.orchestrator.mode(),
        "uptimeSecs": state.start_time.elapsed().as_secs(),
    }))
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
