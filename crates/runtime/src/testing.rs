//! Scripted collaborators for exercising supervisors without a game server.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use afk_protocol::Telemetry;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::client::{ConnectOptions, Control, GameClient, GameSession, SessionEvent};
use crate::error::ClientError;

/// A call made against a [`FakeSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCall {
	Look { yaw: f32, pitch: f32 },
	SetControl(Control, bool),
	SwingArm,
	Chat(String),
	Quit,
}

/// Session that records every call and lets tests push events.
pub struct FakeSession {
	username: Mutex<Option<String>>,
	entity: AtomicBool,
	telemetry: Mutex<Telemetry>,
	calls: Mutex<Vec<SessionCall>>,
	events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
}

impl FakeSession {
	pub fn new(username: &str) -> Self {
		Self {
			username: Mutex::new(Some(username.to_string())),
			entity: AtomicBool::new(false),
			telemetry: Mutex::new(Telemetry::default()),
			calls: Mutex::new(Vec::new()),
			events: Mutex::new(None),
		}
	}

	pub fn set_entity(&self, present: bool) {
		self.entity.store(present, Ordering::SeqCst);
	}

	pub fn set_telemetry(&self, telemetry: Telemetry) {
		*self.telemetry.lock() = telemetry;
	}

	pub fn calls(&self) -> Vec<SessionCall> {
		self.calls.lock().clone()
	}

	/// Pushes an event onto this session's stream. Returns false once the
	/// consumer is gone.
	pub fn emit(&self, event: SessionEvent) -> bool {
		match self.events.lock().as_ref() {
			Some(tx) => tx.send(event).is_ok(),
			None => false,
		}
	}

	/// Drops the event sender, as a client does when its connection dies
	/// without reporting an end.
	pub fn close_stream(&self) {
		self.events.lock().take();
	}

	fn record(&self, call: SessionCall) {
		self.calls.lock().push(call);
	}
}

impl GameSession for FakeSession {
	fn username(&self) -> Option<String> {
		self.username.lock().clone()
	}

	fn has_entity(&self) -> bool {
		self.entity.load(Ordering::SeqCst)
	}

	fn telemetry(&self) -> Telemetry {
		self.telemetry.lock().clone()
	}

	fn look(&self, yaw: f32, pitch: f32) {
		self.record(SessionCall::Look { yaw, pitch });
	}

	fn set_control(&self, control: Control, active: bool) {
		self.record(SessionCall::SetControl(control, active));
	}

	fn swing_arm(&self) {
		self.record(SessionCall::SwingArm);
	}

	fn chat(&self, message: &str) {
		self.record(SessionCall::Chat(message.to_string()));
	}

	fn quit(&self) {
		self.record(SessionCall::Quit);
		self.set_entity(false);
		self.emit(SessionEvent::End {
			reason: "quit".to_string(),
		});
	}
}

/// Client that hands out [`FakeSession`]s and records connect calls.
#[derive(Default)]
pub struct FakeClient {
	connects: Mutex<Vec<ConnectOptions>>,
	sessions: Mutex<Vec<Arc<FakeSession>>>,
	fail_next: Mutex<Option<ClientError>>,
}

impl FakeClient {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Makes the next connect call fail synchronously.
	pub fn fail_next(&self, err: ClientError) {
		*self.fail_next.lock() = Some(err);
	}

	pub fn connects(&self) -> Vec<ConnectOptions> {
		self.connects.lock().clone()
	}

	pub fn connect_count(&self) -> usize {
		self.connects.lock().len()
	}

	/// The most recently opened session.
	pub fn last_session(&self) -> Option<Arc<FakeSession>> {
		self.sessions.lock().last().cloned()
	}

	/// Emits on the most recent session's stream.
	pub fn emit(&self, event: SessionEvent) -> bool {
		self.last_session().is_some_and(|session| session.emit(event))
	}

	/// Drives the most recent session through login and spawn.
	pub fn go_online(&self, username: &str) -> bool {
		let Some(session) = self.last_session() else {
			return false;
		};
		session.set_entity(true);
		session.emit(SessionEvent::Login {
			username: username.to_string(),
		}) && session.emit(SessionEvent::Spawn)
	}
}

impl GameClient for FakeClient {
	fn connect(
		&self,
		options: ConnectOptions,
	) -> Result<(Arc<dyn GameSession>, mpsc::UnboundedReceiver<SessionEvent>), ClientError> {
		if let Some(err) = self.fail_next.lock().take() {
			return Err(err);
		}
		let session = Arc::new(FakeSession::new(&options.username));
		let (tx, rx) = mpsc::unbounded_channel();
		*session.events.lock() = Some(tx);
		self.connects.lock().push(options);
		self.sessions.lock().push(session.clone());
		Ok((session, rx))
	}
}
