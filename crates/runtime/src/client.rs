//! Narrow interface to the game protocol client.
//!
//! A client turns [`ConnectOptions`] into a live [`GameSession`] plus a typed
//! stream of [`SessionEvent`]s. The supervisor folds that stream into its
//! state; it never sees protocol callbacks directly.

use std::sync::Arc;

use afk_protocol::{AuthChallenge, AuthMode, ProtocolVersion, Telemetry};
use tokio::sync::mpsc;

use crate::error::ClientError;

/// Everything the client needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
	pub host: String,
	pub port: u16,
	pub version: ProtocolVersion,
	pub username: String,
	pub auth: AuthMode,
	/// Whether the account completed a device-code challenge before.
	pub verified: bool,
}

/// Event emitted by a live session, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	/// Device-code flow started; a human must visit the URI.
	AuthChallenge(AuthChallenge),
	Login { username: String },
	/// The session's world entity now exists.
	Spawn,
	/// Raw server or system message.
	Message(String),
	Chat { username: String, message: String },
	/// Health, food, position or dimension changed.
	Telemetry,
	Kicked { reason: String },
	Error { message: String },
	/// The session is gone, whether by quit, kick, or network failure.
	End { reason: String },
}

/// Movement control toggled by the idle loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
	Jump,
}

/// Handle to one live session.
///
/// All calls are best-effort: implementations swallow their own failures.
pub trait GameSession: Send + Sync {
	fn username(&self) -> Option<String>;

	/// Whether the session currently has a world entity.
	fn has_entity(&self) -> bool;

	fn telemetry(&self) -> Telemetry;

	fn look(&self, yaw: f32, pitch: f32);

	fn set_control(&self, control: Control, active: bool);

	fn swing_arm(&self);

	fn chat(&self, message: &str);

	/// Requests a graceful disconnect. The session still emits [`SessionEvent::End`].
	fn quit(&self);
}

/// Opens sessions against a game server.
pub trait GameClient: Send + Sync {
	/// Issues the connect call.
	///
	/// Returns once the attempt is underway; login arrives later on the event
	/// stream. An `Err` means the attempt never started.
	fn connect(
		&self,
		options: ConnectOptions,
	) -> Result<(Arc<dyn GameSession>, mpsc::UnboundedReceiver<SessionEvent>), ClientError>;
}
