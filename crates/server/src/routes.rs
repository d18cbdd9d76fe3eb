//! HTTP surface for the dealership assistant.
//!
//! - `POST /chat`     one conversational turn
//! - `GET  /bookings` bookings made this process lifetime
//! - `GET  /health`   liveness plus catalog summary

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use showroom_agent::SessionOrchestrator;
use showroom_core::domain::booking::Booking;
use showroom_core::inventory::InventoryStore;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub inventory: Arc<InventoryStore>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Omitted on the first message; the server mints one.
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct BookingsResponse {
    pub bookings: Vec<Booking>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub dealership: String,
    pub vehicle_count: usize,
    pub checked_at: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/bookings", get(bookings))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    let session_id =
        request.session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        event_name = "system.routes.chat_received",
        session_id = %session_id,
        "chat message received"
    );

    let reply = state.orchestrator.process(&session_id, &request.message).await;

    (
        StatusCode::OK,
        Json(ChatResponse { session_id, reply, timestamp: Utc::now().to_rfc3339() }),
    )
}

pub async fn bookings(State(state): State<AppState>) -> Json<BookingsResponse> {
    Json(BookingsResponse { bookings: state.orchestrator.bookings() })
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        dealership: state.inventory.profile().name.clone(),
        vehicle_count: state.inventory.vehicles().len(),
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}
