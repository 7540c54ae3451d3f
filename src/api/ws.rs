use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::AppState;

/// GET /ws - WebSocket接続にアップグレードする
pub(super) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 1日ごとの処理結果をクライアントへ流し続ける
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut rx = state.broadcast_tx.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(report) => {
                        let Ok(json_text) = serde_json::to_string(&report) else {
                            continue;
                        };
                        if socket.send(Message::Text(json_text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(count)) => {
                        // 遅れた分は捨てて継続（切断しない）
                        warn!(skipped = count, "websocket client lagged behind");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            // クライアント側の切断検知。受信したメッセージは無視する
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
        }
    }
    debug!("websocket client disconnected");
}
