//! Observer-facing projection of a supervisor's state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::AuthChallenge;
use crate::ids::BotId;

/// Connection lifecycle of a supervised session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
	/// No session and not trying to get one.
	#[default]
	Offline,
	/// Connect issued, waiting for login.
	Connecting,
	/// Waiting for a human to complete a device-code challenge.
	AuthPending,
	/// Logged in.
	Online,
	/// Session ended, reconnect scheduled.
	Reconnecting,
}

impl Lifecycle {
	/// Whether a session is live or being established.
	pub fn is_active(self) -> bool {
		matches!(self, Lifecycle::Connecting | Lifecycle::AuthPending | Lifecycle::Online)
	}
}

impl fmt::Display for Lifecycle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			Lifecycle::Offline => "offline",
			Lifecycle::Connecting => "connecting",
			Lifecycle::AuthPending => "auth pending",
			Lifecycle::Online => "online",
			Lifecycle::Reconnecting => "reconnecting",
		};
		f.write_str(label)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
	pub x: f64,
	pub y: f64,
	pub z: f64,
}

/// Live fields read from the session's world entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
	pub health: Option<f32>,
	pub food: Option<u32>,
	pub position: Option<Position>,
	pub dimension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
	pub id: BotId,
	pub name: String,
	pub lifecycle: Lifecycle,
	/// Lifecycle is online and the session has a world entity.
	pub online: bool,
	/// A session handle is held.
	pub running: bool,
	pub username: Option<String>,
	pub server: String,
	pub uptime: String,
	pub idle_active: bool,
	pub auto_reconnect: bool,
	pub owner: Option<String>,
	pub pending_auth: Option<AuthChallenge>,
	#[serde(flatten)]
	pub telemetry: Telemetry,
}

/// Fleet-wide counts for dashboards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
	pub total_bots: usize,
	pub online_bots: usize,
	pub running_bots: usize,
	pub total_servers: usize,
	/// Server profiles with at least one bot assigned.
	pub servers_with_bots: usize,
	/// Profiles among those with at least one assigned bot online.
	pub servers_online: usize,
	pub servers_offline: usize,
}
