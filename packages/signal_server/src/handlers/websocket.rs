use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt, future};
use rendezvous::{Channel, Inbound, Session};
use tracing::info;

use crate::AppState;

/// Signaling WebSocket - one rendezvous session per connection
pub async fn websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let max_message_bytes = state.config.max_message_bytes;
    ws.max_message_size(max_message_bytes)
        .max_frame_size(max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Adapt an upgraded socket to the signaling core and run the session.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    state.metrics.connection_opened();

    let (ws_sender, ws_receiver) = socket.split();

    let sink = ws_sender.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    });
    let channel = Channel::new(sink);
    let conn_id = channel.id();

    // Ping/pong is answered by axum; the core only sees data frames and close.
    let inbound = ws_receiver.filter_map(|frame| {
        future::ready(match frame {
            Ok(Message::Text(text)) => Some(Ok(Inbound::Text(text.to_string()))),
            Ok(Message::Binary(data)) => Some(Ok(Inbound::Binary(data.to_vec()))),
            Ok(Message::Close(_)) => Some(Ok(Inbound::Close)),
            Ok(Message::Ping(_) | Message::Pong(_)) => None,
            Err(e) => Some(Err(e)),
        })
    });

    info!(conn_id = %conn_id, "New signaling connection");

    Session::new(channel, state.switchboard.clone())
        .with_config(state.config.session.clone())
        .with_observer(state.metrics.clone())
        .run(inbound)
        .await;

    state.metrics.connection_closed();
    info!(conn_id = %conn_id, "Signaling connection closed");
}
