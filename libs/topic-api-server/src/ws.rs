use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;

use site_api::Record;
use topic_engine::{BoxFuture, Transport, TransportError};

use super::AppState;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /videoSubmissions
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(socket, state))
}

async fn ws_connection(socket: WebSocket, state: AppState) {
    match state.videos.connect(WsTransport { socket }).await {
        Ok(end) => tracing::debug!(reason = ?end, "viewer disconnected"),
        Err(e) => tracing::warn!(error = %e, "viewer session aborted"),
    }
}

/// One record per text frame, JSON encoded.
struct WsTransport {
    socket: WebSocket,
}

impl Transport for WsTransport {
    fn send<'a>(&'a mut self, record: &'a Record) -> BoxFuture<'a, Result<(), TransportError>> {
        Box::pin(async move {
            let json = serde_json::to_string(record)
                .map_err(|e| TransportError::new(format!("encode: {e}")))?;
            self.socket
                .send(Message::Text(json.into()))
                .await
                .map_err(|e| TransportError::new(e.to_string()))
        })
    }

    fn closed(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            loop {
                match self.socket.recv().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => continue,
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, self.socket.send(Message::Close(None))).await;
        })
    }
}
