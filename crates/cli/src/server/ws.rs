//! Websocket feed of fleet events.

use afk_protocol::FleetEvent;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use super::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
	ws.on_upgrade(move |socket| handle_observer(socket, state))
}

/// Sends the current status of every bot, then forwards events until either
/// side goes away.
async fn handle_observer(socket: WebSocket, state: AppState) {
	// Subscribe before the snapshot so nothing published in between is lost.
	let mut events = BroadcastStream::new(state.fleet.subscribe());
	let (mut ws_tx, mut ws_rx) = socket.split();
	info!(target = "afk.server", "observer connected");

	for status in state.fleet.all_statuses() {
		let event = FleetEvent::Status {
			bot_id: status.id,
			status,
		};
		if send(&mut ws_tx, &event).await.is_err() {
			return;
		}
	}

	loop {
		tokio::select! {
			event = events.next() => match event {
				Some(Ok(event)) => {
					if send(&mut ws_tx, &event).await.is_err() {
						break;
					}
				}
				Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
					warn!(target = "afk.server", skipped, "observer lagging, events dropped");
				}
				None => break,
			},
			incoming = ws_rx.next() => match incoming {
				Some(Ok(Message::Close(_))) | None => break,
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					debug!(target = "afk.server", error = %err, "observer websocket error");
					break;
				}
			},
		}
	}

	info!(target = "afk.server", "observer disconnected");
}

async fn send<S>(ws_tx: &mut S, event: &FleetEvent) -> Result<(), ()>
where
	S: SinkExt<Message> + Unpin,
{
	let text = match serde_json::to_string(event) {
		Ok(text) => text,
		Err(err) => {
			warn!(target = "afk.server", error = %err, "failed to encode event");
			return Ok(());
		}
	};
	ws_tx.send(Message::Text(text.into())).await.map_err(|_| ())
}
