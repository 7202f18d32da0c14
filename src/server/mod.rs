use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::{
    db::exchanges::ExchangeRepository,
    domain::PageCommand,
    pipeline::Whitelist,
    tasks::{driver::SessionHandle, forwarder::CaptureForwarder, queue::CommandQueue},
};

mod ingest;
mod relay;

pub use ingest::{ingest, IngestOutcome};

#[derive(Clone)]
pub struct AppState {
    pub whitelist: Arc<Whitelist>,
    pub store: Arc<ExchangeRepository>,
    pub commands: Arc<CommandQueue<PageCommand>>,
    pub session: Option<SessionHandle>,
    pub forwarder: CaptureForwarder,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn json_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/capture", post(ingest::post_capture).get(ingest::get_captures))
        .route("/clear", get(ingest::clear_captures))
        .route("/relay/page-loaded", post(relay::page_loaded))
        .route("/relay/login-confirmed", post(relay::login_confirmed))
        .route("/relay/capture", post(relay::relay_capture))
        .route("/relay/commands", get(relay::take_commands))
        .route("/relay/status", get(relay::status))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
}
