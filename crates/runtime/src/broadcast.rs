//! Fire-and-forget publish point for observer events.

use afk_protocol::{AuthChallenge, BotId, FleetEvent, LogEntry, StatusSnapshot};
use tokio::sync::broadcast;

/// Events buffered per subscriber before the slowest one starts lagging.
pub const DEFAULT_BUFFER: usize = 1024;

/// Cloneable handle to the observer channel.
///
/// Publishing never blocks: with no subscribers the event is dropped, and a
/// lagging subscriber loses its oldest events instead of slowing publishers.
#[derive(Debug, Clone)]
pub struct Broadcaster {
	tx: broadcast::Sender<FleetEvent>,
}

impl Default for Broadcaster {
	fn default() -> Self {
		Self::new(DEFAULT_BUFFER)
	}
}

impl Broadcaster {
	pub fn new(buffer: usize) -> Self {
		let (tx, _) = broadcast::channel(buffer.max(1));
		Self { tx }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
		self.tx.subscribe()
	}

	pub fn publish(&self, event: FleetEvent) {
		let _ = self.tx.send(event);
	}

	pub fn publish_status(&self, bot_id: BotId, status: StatusSnapshot) {
		self.publish(FleetEvent::Status { bot_id, status });
	}

	pub fn publish_log(&self, bot_id: BotId, entry: LogEntry) {
		self.publish(FleetEvent::Log { bot_id, entry });
	}

	pub fn publish_auth_challenge(&self, bot_id: BotId, challenge: AuthChallenge) {
		self.publish(FleetEvent::AuthChallenge { bot_id, challenge });
	}
}
