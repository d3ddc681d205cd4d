//! WebSocket connection handling.
//!
//! One task pair per live connection: a writer task draining the
//! connection's fan-out queue, and a reader loop feeding commands to the
//! coordinator. Actions from a single connection are therefore processed in
//! submission order, while the poll mutex serializes across connections.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use ranker_engine::ErrorKind;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::Authed;
use crate::events::{ActionError, ClientCommand, ServerEvent};
use crate::service::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// `GET /ws` — authenticate and upgrade.
///
/// The credential may arrive as an `Authorization: Bearer` header or, for
/// browser WebSocket clients that cannot set headers, a `token` query
/// parameter. An expired token rejects the subscribe here; it does not evict
/// an already-established connection.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let token = bearer_token(&headers).or(query.token);
    let Some(token) = token else {
        return (StatusCode::UNAUTHORIZED, "missing credentials").into_response();
    };
    match state.verifier.verify(&token) {
        Err(e) => (StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
        Ok(authed) => ws.on_upgrade(move |socket| handle_socket(socket, authed, state)),
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Per-connection state machine, one spawned per upgraded socket.
async fn handle_socket(socket: WebSocket, authed: Authed, state: AppState) {
    let connection_id = Uuid::new_v4();
    let poll_id = authed.poll_id.clone();
    info!(
        %connection_id,
        poll_id = %poll_id,
        participant_id = %authed.participant_id,
        "WebSocket connection established"
    );

    let rooms = state.coordinator.rooms();
    let (tx, mut rx) = mpsc::channel::<String>(rooms.channel_capacity());

    if let Err(err) = state.coordinator.join(&authed, connection_id, tx).await {
        let (mut sink, _) = socket.split();
        if let Ok(msg) = serde_json::to_string(&ServerEvent::ActionError(err)) {
            let _ = sink.send(Message::Text(msg)).await;
        }
        let _ = sink.close().await;
        return;
    }

    let (mut sink, mut stream) = socket.split();

    // server -> client: drain the fan-out queue.
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // client -> server: decode and apply commands in submission order.
    let coordinator = Arc::clone(&state.coordinator);
    let recv_authed = authed.clone();
    let mut recv_task = tokio::spawn(async move {
        let rooms = coordinator.rooms();
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => {
                        coordinator.apply(&recv_authed, connection_id, command).await;
                    }
                    Err(e) => {
                        rooms.send_to(
                            &recv_authed.poll_id,
                            connection_id,
                            &ServerEvent::ActionError(ActionError::new(
                                ErrorKind::InvalidArgument,
                                format!("malformed command: {e}"),
                            )),
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Either direction terminating tears the connection down.
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.coordinator.disconnect(&poll_id, connection_id);
    debug!(%connection_id, poll_id = %poll_id, "WebSocket connection closed");
}
