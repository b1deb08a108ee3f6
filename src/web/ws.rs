use axum::extract::{
    State,
    ws::{self, WebSocket, WebSocketUpgrade},
};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::practice::messages::{
    ClientToServerMessage, ServerToClientMessage, client_message_from_ws_text,
};
use crate::session::SessionActorHandle;
use crate::state::AppState;

pub async fn ws_handler(
    ws_upgrade: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    tracing::info!("WebSocket: Connection attempt to /ws endpoint");
    ws_upgrade.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn reject(ws_sender: &mut SplitSink<WebSocket, ws::Message>, message: String) {
    let error_response = ServerToClientMessage::SystemError { message };
    if let Ok(ws_msg) = error_response.to_ws_text() {
        let _ = ws_sender.send(ws_msg).await;
    }
    let _ = ws_sender.close().await;
}

pub async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let session_handle: SessionActorHandle = match ws_receiver.next().await {
        Some(Ok(ws::Message::Text(text_msg))) => {
            tracing::debug!(ws.initial = %text_msg, "WS: Received initial message");
            match client_message_from_ws_text(&text_msg) {
                Ok(ClientToServerMessage::ConnectToSession { session_id }) => {
                    match app_state
                        .session_manager
                        .get_session_handle(session_id)
                        .await
                    {
                        Some(handle) => handle,
                        None => {
                            tracing::warn!(session.id = %session_id, "WebSocket: Session not found. Closing");
                            reject(&mut ws_sender, format!("Session {} not found.", session_id))
                                .await;
                            return;
                        }
                    }
                }
                Ok(other_msg) => {
                    tracing::warn!(
                        ws.initial = ?other_msg,
                        "WebSocket: Initial message was not ConnectToSession. Closing"
                    );
                    reject(
                        &mut ws_sender,
                        "Invalid initial message type. Expected ConnectToSession.".to_string(),
                    )
                    .await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        ws.initial = %text_msg,
                        "WebSocket: Failed to deserialize initial message. Closing"
                    );
                    reject(
                        &mut ws_sender,
                        format!("Invalid initial connection message format: {}", e),
                    )
                    .await;
                    return;
                }
            }
        }
        Some(Ok(other_type_msg)) => {
            tracing::warn!(ws.initial = ?other_type_msg, "WS: Client sent non-text initial message. Closing");
            reject(
                &mut ws_sender,
                "Initial message must be a text JSON message (ConnectToSession).".to_string(),
            )
            .await;
            return;
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "WS: Error receiving initial message. Closing");
            let _ = ws_sender.close().await;
            return;
        }
        None => {
            tracing::info!("WS: Client disconnected before sending initial message");
            return;
        }
    };

    let client_id = Uuid::new_v4();
    let session_id = session_handle.session_id;
    let (session_to_client_tx, mut session_to_client_rx) = mpsc::channel::<ws::Message>(32);

    if let Err(e) = session_handle
        .client_connected(client_id, session_to_client_tx)
        .await
    {
        tracing::warn!(session.id = %session_id, error = %e, "WebSocket: Session stopped before attach");
        reject(&mut ws_sender, e.to_string()).await;
        return;
    }

    tracing::info!(
        client.id = %client_id,
        session.id = %session_id,
        "WebSocket: Client attached to session"
    );

    let mut send_task = tokio::spawn(async move {
        while let Some(message_to_send) = session_to_client_rx.recv().await {
            if ws_sender.send(message_to_send).await.is_err() {
                tracing::info!(
                    client.id = %client_id,
                    session.id = %session_id,
                    "WS send error, client likely disconnected"
                );
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let session_handle_recv = session_handle.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            match ws_receiver.next().await {
                Some(Ok(ws::Message::Text(text_msg))) => {
                    if let Err(e) = session_handle_recv
                        .forward_client_event(client_id, text_msg.to_string())
                        .await
                    {
                        tracing::error!(
                            client.id = %client_id,
                            session.id = %session_id,
                            error = %e,
                            "Error sending event to session"
                        );
                        break;
                    }
                }
                Some(Ok(ws::Message::Close(_))) => {
                    tracing::info!(client.id = %client_id, session.id = %session_id, "WebSocket closed by client");
                    break;
                }
                Some(Ok(_)) => {
                    tracing::trace!(client.id = %client_id, "Ignoring non-text frame");
                }
                Some(Err(e)) => {
                    tracing::warn!(client.id = %client_id, error = %e, "WebSocket receive error");
                    break;
                }
                None => break,
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    session_handle.client_disconnected(client_id).await;
    tracing::info!(
        client.id = %client_id,
        session.id = %session_id,
        "WebSocket: Client fully disconnected"
    );
}
