//! HTTP surface: Slack Events webhook and JSON endpoints for the workflows.
//!
//! Everything except `/health` must carry a valid Slack request signature.
//! Internal callers of `/api/*` sign with the same secret.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::archive::pipeline::ArchivePipeline;
use crate::archive::registry::TriggerRegistry;
use crate::channels::signature::{SIGNATURE_HEADER, SignatureVerifier, TIMESTAMP_HEADER};
use crate::channels::slack::{SlackEnvelope, parse_message_event};
use crate::content::model::Category;
use crate::content::service::{ContentService, SubmitContentRequest, SubmitPassRequest};
use crate::error::{SignatureError, ValidationError, WorkflowError};

/// Largest request body accepted for signature checking.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentService>,
    pub registry: Arc<TriggerRegistry>,
    pub pipeline: Arc<ArchivePipeline>,
    pub verifier: Arc<SignatureVerifier>,
}

// ── Errors ──────────────────────────────────────────────────────────

/// Workflow failure rendered as an HTTP response.
///
/// Validation failures become 422 with `{"errors": {field: message}}`,
/// the same shape a Slack modal expects for inline errors.
pub struct ApiError(WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        Self(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self(e.into())
    }
}

/// Input field a validation failure belongs to.
fn error_field(e: &ValidationError) -> &'static str {
    match e {
        ValidationError::InvalidUrl => "url",
        ValidationError::MissingSigil { .. }
        | ValidationError::TooShort
        | ValidationError::ContainsWhitespace
        | ValidationError::SimilarTrigger { .. } => "trigger_word",
        ValidationError::PassExhausted | ValidationError::ConsecutivePass => "pass",
        ValidationError::UserNotRegistered | ValidationError::NotChannelMember => "user",
    }
}

fn field_error(field: &str, message: String) -> Response {
    let errors: HashMap<&str, String> = HashMap::from([(field, message)]);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({ "errors": errors })),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            WorkflowError::Validation(e) => field_error(error_field(&e), e.to_string()),
            WorkflowError::Repository(e) => {
                error!(error = %e, "Repository failure while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({"error": "Internal storage error"})),
                )
                    .into_response()
            }
        }
    }
}

// ── Request signing ─────────────────────────────────────────────────

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader(name))
}

fn unauthorized(e: &SignatureError) -> Response {
    warn!(error = %e, "Rejected unsigned or badly signed request");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "Invalid request signature"})),
    )
        .into_response()
}

/// Buffer the body, check the signature over the exact bytes received,
/// then hand the same bytes to the handler.
async fn require_signature(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let checked = header(&parts.headers, TIMESTAMP_HEADER).and_then(|timestamp| {
        let signature = header(&parts.headers, SIGNATURE_HEADER)?;
        state
            .verifier
            .verify(timestamp, signature, &bytes, chrono::Utc::now().timestamp())
    });
    if let Err(e) = checked {
        return unauthorized(&e);
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

// ── Slack events ────────────────────────────────────────────────────

/// POST /slack/events
///
/// Answers the URL verification handshake and acknowledges callbacks
/// immediately. Message events are archived on a background task so Slack
/// never waits on the pipeline.
async fn slack_events(
    State(state): State<AppState>,
    Json(envelope): Json<SlackEnvelope>,
) -> Response {
    match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            Json(serde_json::json!({ "challenge": challenge })).into_response()
        }
        SlackEnvelope::EventCallback { event } => {
            if let Some(inbound) = parse_message_event(event) {
                let pipeline = Arc::clone(&state.pipeline);
                tokio::spawn(async move {
                    let channel_id = inbound.channel_id.clone();
                    let ts = inbound.ts.clone();
                    if let Err(e) = pipeline.handle(inbound).await {
                        error!(channel_id = %channel_id, ts = %ts, error = %e, "Archive pipeline failed");
                    }
                });
            }
            StatusCode::OK.into_response()
        }
        SlackEnvelope::Unsupported => {
            debug!("Ignoring unsupported Slack envelope");
            StatusCode::OK.into_response()
        }
    }
}

// ── Members ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RegisterUserBody {
    user_id: String,
    name: String,
    channel_id: String,
}

/// POST /api/users
async fn register_user(
    State(state): State<AppState>,
    Json(body): Json<RegisterUserBody>,
) -> Result<Response, ApiError> {
    let user = state
        .content
        .register_user(&body.user_id, &body.name, &body.channel_id)
        .await?;
    Ok(Json(user).into_response())
}

#[derive(Debug, Deserialize)]
struct SubmissionBody {
    user_id: String,
    channel_id: String,
    username: String,
    url: String,
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: String,
}

/// POST /api/submissions
async fn submit_content(
    State(state): State<AppState>,
    Json(body): Json<SubmissionBody>,
) -> Result<Response, ApiError> {
    let category: Category = match body.category.parse() {
        Ok(category) => category,
        Err(message) => return Ok(field_error("category", message)),
    };

    let user = state.content.get_user(&body.user_id, &body.channel_id).await?;
    let content = state
        .content
        .submit_content(
            &user,
            SubmitContentRequest {
                username: body.username,
                url: body.url,
                category,
                description: body.description,
                tags_raw: body.tags,
            },
        )
        .await?;

    state.content.announce(&body.channel_id, &content).await;
    Ok((StatusCode::CREATED, Json(content)).into_response())
}

#[derive(Debug, Deserialize)]
struct PassBody {
    user_id: String,
    channel_id: String,
    username: String,
    #[serde(default)]
    description: String,
}

/// POST /api/passes
async fn submit_pass(
    State(state): State<AppState>,
    Json(body): Json<PassBody>,
) -> Result<Response, ApiError> {
    let user = state.content.get_user(&body.user_id, &body.channel_id).await?;
    let content = state
        .content
        .submit_pass(
            &user,
            SubmitPassRequest {
                username: body.username,
                description: body.description,
            },
        )
        .await?;

    state.content.announce(&body.channel_id, &content).await;
    Ok((StatusCode::CREATED, Json(content)).into_response())
}

// ── Triggers ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TriggerBody {
    user_id: String,
    channel_id: String,
    trigger_word: String,
}

/// POST /api/triggers
async fn create_trigger(
    State(state): State<AppState>,
    Json(body): Json<TriggerBody>,
) -> Result<Response, ApiError> {
    let trigger = state
        .registry
        .create_trigger(&body.user_id, &body.channel_id, body.trigger_word.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(trigger)).into_response())
}

async fn health() -> &'static str {
    "ok"
}

/// Build the full application router.
pub fn app_routes(state: AppState) -> Router {
    let signed = Router::new()
        .route("/slack/events", post(slack_events))
        .route("/api/users", post(register_user))
        .route("/api/submissions", post(submit_content))
        .route("/api/passes", post(submit_pass))
        .route("/api/triggers", post(create_trigger))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_signature));

    Router::new()
        .route("/health", get(health))
        .merge(signed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
