use super::SharedDispatcher;
use crate::core::version;
use crate::plugin::api::{Config, ErrorResponse, PluginError, RunState, StopSignal};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::warn;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

fn status_code_for(error: &PluginError) -> StatusCode {
    match error {
        PluginError::NotReady { .. } => StatusCode::CONFLICT,
        PluginError::InvalidConfig { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 200 unless the scanner is still initializing
pub(super) async fn healthz(State(dispatcher): State<SharedDispatcher>) -> StatusCode {
    match dispatcher.status().state {
        RunState::NotReady => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

/// Scanner metadata stamped with the protocol version this binary speaks
pub(super) async fn metadata(State(dispatcher): State<SharedDispatcher>) -> Response {
    let mut metadata = dispatcher.metadata();
    metadata.api_version = Some(version::api_version().to_string());
    Json(metadata).into_response()
}

pub(super) async fn status(State(dispatcher): State<SharedDispatcher>) -> Response {
    Json(dispatcher.status()).into_response()
}

/// Accept a configuration and start the scan in the background
///
/// Only a body that does not decode as a `Config` is a 400 here; every
/// other check happens behind the `Ready` precondition.
pub(super) async fn configure(
    State(dispatcher): State<SharedDispatcher>,
    payload: Result<Json<Config>, JsonRejection>,
) -> Response {
    let config = match payload {
        Ok(Json(config)) => config,
        Err(rejection) => {
            warn!("Malformed configuration: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match dispatcher.trigger_start(config) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => error_response(status_code_for(&e), e.to_string()),
    }
}

/// Forward a stop request; an empty body means "no grace period"
///
/// A body that is present but does not decode is rejected and never
/// reaches the dispatcher.
pub(super) async fn stop(State(dispatcher): State<SharedDispatcher>, body: Bytes) -> Response {
    let signal = match parse_stop_signal(&body) {
        Ok(signal) => signal,
        Err(e) => {
            warn!("Malformed stop request: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Failed to parse the request body as JSON: {}", e),
            );
        }
    };
    dispatcher.trigger_stop(signal);
    StatusCode::CREATED.into_response()
}

fn parse_stop_signal(body: &[u8]) -> Result<StopSignal, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StopSignal::default());
    }
    serde_json::from_slice(body)
}
