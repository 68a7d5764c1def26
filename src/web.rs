//! ==============================================================================
//! web.rs - dashboard, snapshot api and live websocket
//! ==============================================================================
//!
//! routes:
//!     GET /             index.html from the static dir (inline fallback page)
//!     GET /api/sensors  every sensor snapshot as json
//!     GET /ws           websocket: one "init" message, then "update"s
//!     /static/*         static assets, when the directory exists
//!
//! relationships:
//!     - reads: store.rs through the dispatcher (get_all / init message)
//!     - registers subscribers with: hub.rs
//!
//! ==============================================================================

use crate::dispatcher::UpdateDispatcher;
use crate::domain::SensorSnapshot;
use crate::hub::RealtimeHub;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const FALLBACK_INDEX: &str =
    "<html><body><h1>Dashboard</h1><p>Static files not found.</p></body></html>";

/// shared handles for the http handlers
#[derive(Clone)]
pub struct WebState {
    pub dispatcher: Arc<UpdateDispatcher>,
    pub hub: Arc<RealtimeHub>,
    pub static_dir: PathBuf,
}

pub fn router(state: WebState) -> Router {
    let static_dir = state.static_dir.clone();
    let mut app = Router::new()
        .route("/", get(index_handler))
        .route("/api/sensors", get(sensors_handler))
        .route("/ws", get(websocket_handler));

    if static_dir.is_dir() {
        app = app.nest_service("/static", ServeDir::new(static_dir));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// bind and serve until the listener fails
pub async fn run_server(addr: &str, state: WebState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Dashboard listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<WebState>) -> Html<String> {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html),
        Err(_) => Html(FALLBACK_INDEX.to_string()),
    }
}

/// json api endpoint for programmatic access
async fn sensors_handler(State(state): State<WebState>) -> Json<HashMap<String, SensorSnapshot>> {
    Json(state.dispatcher.store().get_all())
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<WebState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: WebState) {
    let (mut sender, mut receiver) = socket.split();

    // register first so no update slips between the init snapshot and the feed
    let (conn_id, mut rx) = state.hub.register();

    let init = match serde_json::to_string(&state.dispatcher.init_message()) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize init message");
            state.hub.unregister(conn_id);
            return;
        }
    };
    if sender.send(Message::Text(init)).await.is_err() {
        state.hub.unregister(conn_id);
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    tracing::debug!(connection_id = conn_id, text = %text, "Received from client");
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!(connection_id = conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.hub.unregister(conn_id);
}
