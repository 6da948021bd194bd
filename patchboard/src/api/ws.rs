//! The browser subscription socket.
//!
//! A client connects with `GET /ui/ws?instanceId=...`, receives one full
//! `schema_update` for first sync, then a stream of `patch` /
//! `schema_update` / `switch_instance` messages. The socket is
//! outbound-only; inbound frames other than ping/close are ignored
//! (user events go through `POST /ui/event`).

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::runtime::OutboundMessage;

use super::routes::InstanceQuery;
use super::AppState;

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<InstanceQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, query.instance_id, socket))
}

async fn handle_socket(state: AppState, requested: Option<String>, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();

    let (instance, conn_id, mut rx, initial) = {
        let mut rt = state.runtime.write().await;
        let instance = rt.resolve_instance(requested.as_deref()).to_string();
        match rt.subscribe(&instance) {
            Ok((id, rx, initial)) => (instance, id, rx, initial),
            Err(e) => {
                drop(rt);
                let body = json!({"type": "error", "error": e.to_string()});
                let _ = sink.send(Message::Text(body.to_string())).await;
                let _ = sink.close().await;
                return;
            }
        }
    };
    info!(%instance, connection = %conn_id, "browser subscribed");

    // First sync: the full current schema.
    let first = OutboundMessage::schema_update(&instance, initial);
    if send_message(&mut sink, &first).await.is_err() {
        let mut rt = state.runtime.write().await;
        rt.unsubscribe(&instance, conn_id);
        return;
    }

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(msg) = outbound else { break };
                if send_message(&mut sink, &msg).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        debug!(%instance, "ignoring inbound frame");
                    }
                    Some(Err(e)) => {
                        warn!(%instance, error = %e, "socket error");
                        break;
                    }
                }
            }
        }
    }

    let mut rt = state.runtime.write().await;
    rt.unsubscribe(&instance, conn_id);
    info!(%instance, connection = %conn_id, "browser unsubscribed");
}

async fn send_message<S>(sink: &mut S, msg: &OutboundMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let text = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}
