//! HTTP API endpoints.
//!
//! Room creation and read-only lookups. Everything live goes over the
//! WebSocket at `/ws`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::code::normalize_code;
use crate::config::ServerConfig;
use crate::error::PollError;
use crate::state::AppState;
use crate::ws;

#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub presenter_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub code: String,
    pub join_url: String,
    pub present_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub msg: String,
}

/// Map a domain error onto an HTTP status and `{code, msg}` body
pub fn error_response(e: PollError) -> Response {
    let (status, code) = match &e {
        PollError::RoomNotFound | PollError::QuestionNotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        PollError::InvalidQuestion(_) | PollError::InvalidResponse(_) => {
            (StatusCode::BAD_REQUEST, e.code())
        }
        PollError::AlreadyExists
        | PollError::CodeCollision
        | PollError::NoActiveQuestion
        | PollError::RoomClosed => (StatusCode::CONFLICT, e.code()),
        PollError::Unauthorized => (StatusCode::UNAUTHORIZED, e.code()),
        PollError::CapacityExhausted { .. } | PollError::StoreUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, e.code())
        }
    };
    let body = ErrorBody {
        code: code.to_string(),
        msg: e.to_string(),
    };
    (status, Json(body)).into_response()
}

/// Create a room under a freshly allocated code.
///
/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Arc<ServerConfig>>,
    body: Option<Json<CreateRoomRequest>>,
) -> Response {
    let password = body
        .and_then(|Json(req)| req.presenter_password)
        .unwrap_or_default();
    match state.create_room_with_allocation(&password).await {
        Ok(room) => {
            let body = CreateRoomResponse {
                join_url: config.join_url(&room.code),
                present_url: config.present_url(&room.code),
                code: room.code,
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => {
            tracing::error!("Room creation failed: {}", e);
            error_response(e)
        }
    }
}

/// GET /api/rooms/{code}
pub async fn get_room(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    let Some(code) = normalize_code(&code) else {
        return error_response(PollError::RoomNotFound);
    };
    match state.get_room(&code).await {
        Ok(room) => Json(room).into_response(),
        Err(e) => error_response(e),
    }
}

/// Tallies of the active question, `null` when nothing is active.
///
/// GET /api/rooms/{code}/results
pub async fn get_results(State(state): State<Arc<AppState>>, Path(code): Path<String>) -> Response {
    let Some(code) = normalize_code(&code) else {
        return error_response(PollError::RoomNotFound);
    };
    match state.active_tallies(&code).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// Assemble every route the server exposes
pub fn build_router(state: Arc<AppState>, config: Arc<ServerConfig>) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/{code}", get(get_room))
        .route("/api/rooms/{code}/results", get(get_results))
        .route("/ws", get(ws::ws_handler));

    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving static files from {}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(Extension(config))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
