//! HTTP routes.

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{BridgeState, serve_client};

/// Body of `GET /api/users`.
#[derive(Debug, Serialize)]
pub struct UsersResponse {
    /// Online usernames, sorted
    pub users: Vec<String>,
    /// Number of online usernames
    pub count: usize,
}

/// Build the bridge router: `/ws`, `/ping` and `/api/users`.
pub fn router(state: BridgeState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/ping", get(ping))
        .route("/api/users", get(online_users))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<BridgeState>) -> Response {
    let limit = state.config().max_message_size;
    ws.max_message_size(limit).max_frame_size(limit).on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        serve_client(sink, stream, state).await;
    })
}

async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong!" }))
}

async fn online_users(State(state): State<BridgeState>) -> Json<UsersResponse> {
    let users = state.presence().online_users().await;
    let count = users.len();
    Json(UsersResponse { users, count })
}
