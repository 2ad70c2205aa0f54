//! Observer events published by supervisors.

use serde::{Deserialize, Serialize};

use crate::ids::BotId;
use crate::log::LogEntry;
use crate::status::StatusSnapshot;

/// Device-code prompt that requires an out-of-band human step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallenge {
	pub user_code: String,
	pub verification_uri: String,
}

/// One event on the observer channel, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FleetEvent {
	Status { bot_id: BotId, status: StatusSnapshot },
	Log { bot_id: BotId, entry: LogEntry },
	AuthChallenge { bot_id: BotId, challenge: AuthChallenge },
}

impl FleetEvent {
	pub fn bot_id(&self) -> BotId {
		match self {
			FleetEvent::Status { bot_id, .. }
			| FleetEvent::Log { bot_id, .. }
			| FleetEvent::AuthChallenge { bot_id, .. } => *bot_id,
		}
	}
}
