//! WebSocket endpoint streaming simulation frames

use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::Response;
use orrery_core::StreamSession;

use crate::server::AppState;
use crate::websocket::WebSocketTransport;

/// Upgrades the request and runs one streaming session on the socket.
///
/// Each connection gets its own simulation and producer.
pub async fn simulation_session(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(socket: WebSocket, state: AppState) {
    let transport = WebSocketTransport::new(socket);
    let session = match StreamSession::start(
        transport,
        &state.config.simulation,
        &state.config.streaming,
    ) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(error = %err, "Failed to start simulation session");
            return;
        }
    };

    let report = session.run().await;
    tracing::info!(
        session_id = %report.session_id,
        reason = %report.reason,
        batches = report.batches_sent,
        frames = report.frames_sent,
        "Simulation session finished"
    );
}
