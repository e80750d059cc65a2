//! WebSocket connection loop.
//!
//! Registers the socket as a peer context, feeds its text frames to the
//! bridge transport, and writes queued outbound payloads back to it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::app_state::AppState;
use crate::pool::SyncSession;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads text frames from the client and delivers them to the pool.
/// - Forwards payloads the pool sends to this peer.
/// - Optionally pings the peer until it answers, cancelling on close.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (peer, mut outbound) = state.transport.connect();
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::debug!(%peer, "ws peer connected");

    let session = state.sync_on_connect.then(|| {
        SyncSession::start_with_interval(
            &state.pool,
            Some(peer),
            Arc::clone(&state.scheduler),
            state.sync_interval,
            move || tracing::info!(%peer, "ws peer synchronized"),
        )
    });

    loop {
        tokio::select! {
            // Incoming frame from the peer
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !state.transport.deliver(peer, text.as_str().to_owned()) {
                            tracing::debug!(%peer, "payload ignored: pool not bound");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(%peer, error = %err, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Payload queued by the pool for this peer
            payload = outbound.recv() => {
                let Some(payload) = payload else {
                    break;
                };
                if ws_tx.send(Message::text(payload)).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(session) = session {
        session.cancel();
    }
    state.transport.disconnect(peer);
    tracing::debug!(%peer, "ws connection closed");
}
