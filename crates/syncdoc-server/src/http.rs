//! REST endpoints: one-shot envelopes dispatched without a session.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use metrics::counter;
use serde_json::json;
use syncdoc_core::{Command, Message};
use syncdoc_store::StoreError;
use tracing::debug;

use crate::dispatch::{DispatchOutcome, Origin};
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::server::AppState;

/// Body of every `400` caused by a wrong method or content type.
pub const UNSUPPORTED_REQUEST: &str = "Only POST application/json with typed object supported";

const JSON: &str = "application/json";
const JSON_PATCH: &str = "application/json-patch+json";
const MERGE_PATCH: &str = "application/merge-patch+json";

/// REST endpoint family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// `/publish/{*path}`
    Publish,
    /// `/notify/{*path}`
    Notify,
    /// `/sharedobject/{*path}`
    SharedObject,
}

impl Endpoint {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Notify => "notify",
            Self::SharedObject => "sharedobject",
        }
    }

    /// Command implied by a method and media type, if the pair is accepted.
    pub fn command_for(self, method: &Method, media_type: Option<&str>) -> Option<Command> {
        match (self, method, media_type?) {
            (Self::Publish, &Method::POST, JSON) => Some(Command::Publish),
            (Self::Notify, &Method::POST, JSON) => Some(Command::Notify),
            (Self::SharedObject, &Method::POST, JSON)
            | (Self::SharedObject, &Method::PATCH, MERGE_PATCH) => Some(Command::Merge),
            (Self::SharedObject, &Method::PATCH, JSON_PATCH) => Some(Command::Patch),
            _ => None,
        }
    }
}

/// Lowercased media type of a request, parameters stripped.
pub fn media_type(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = raw.split(';').next()?.trim().to_ascii_lowercase();
    (!essence.is_empty()).then_some(essence)
}

/// `/publish/{*path}`
pub async fn publish(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    handle(&state, Endpoint::Publish, &method, &headers, path, &body)
}

/// `/notify/{*path}`
pub async fn notify(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    handle(&state, Endpoint::Notify, &method, &headers, path, &body)
}

/// `/sharedobject/{*path}`
pub async fn shared_object(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Path(path): Path<String>,
    body: Bytes,
) -> Response {
    handle(&state, Endpoint::SharedObject, &method, &headers, path, &body)
}

/// Any endpoint hit without a path.
pub async fn missing_path() -> Response {
    (StatusCode::BAD_REQUEST, UNSUPPORTED_REQUEST).into_response()
}

fn handle(
    state: &AppState,
    endpoint: Endpoint,
    method: &Method,
    headers: &HeaderMap,
    path: String,
    body: &[u8],
) -> Response {
    let response = respond(state, endpoint, method, headers, path, body);
    counter!(
        HTTP_REQUESTS_TOTAL,
        "endpoint" => endpoint.as_str(),
        "status" => response.status().as_str().to_owned()
    )
    .increment(1);
    response
}

fn respond(
    state: &AppState,
    endpoint: Endpoint,
    method: &Method,
    headers: &HeaderMap,
    path: String,
    body: &[u8],
) -> Response {
    let media = media_type(headers);
    let Some(command) = endpoint.command_for(method, media.as_deref()) else {
        debug!(endpoint = endpoint.as_str(), %method, media = ?media, "unsupported request");
        return (StatusCode::BAD_REQUEST, UNSUPPORTED_REQUEST).into_response();
    };

    let mut message: Message = match serde_json::from_slice(body) {
        Ok(message) => message,
        Err(error) if command == Command::Merge => {
            let error = StoreError::Merge {
                path,
                reason: error.to_string(),
            };
            debug!(endpoint = endpoint.as_str(), %error, "undecodable merge patch");
            let body = json!({"error": error.error_kind(), "message": error.to_string()});
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
        Err(error) => {
            debug!(endpoint = endpoint.as_str(), %error, "undecodable request body");
            return (StatusCode::BAD_REQUEST, error.to_string()).into_response();
        }
    };
    if message.path.is_empty() {
        message.path = path;
    }
    match message.command {
        None => message.command = Some(command),
        Some(named) if named != command => {
            debug!(
                endpoint = endpoint.as_str(),
                named = named.as_str(),
                expected = command.as_str(),
                "envelope names a different command, ignoring"
            );
            return Json(json!({"outcome": "ignored", "reason": "command_mismatch"}))
                .into_response();
        }
        Some(_) => {}
    }

    let outcome = state.hub.dispatcher().dispatch(Origin::Request, message);
    Json(outcome_body(&outcome)).into_response()
}

fn outcome_body(outcome: &DispatchOutcome) -> serde_json::Value {
    match outcome {
        DispatchOutcome::Applied(command) => {
            json!({"outcome": "applied", "command": command.as_str()})
        }
        DispatchOutcome::Ignored(reason) => json!({"outcome": "ignored", "reason": reason}),
        DispatchOutcome::Failed { command, error } => {
            json!({"outcome": "failed", "command": command.as_str(), "error": error})
        }
    }
}
