//! In-process stand-in for the game protocol client.
//!
//! [`SimulatedClient`] walks each session through the same event sequence a
//! real client produces (optional device-code challenge, login, spawn,
//! periodic telemetry) so the supervisor, the control server, and observers
//! can run without a game server. Hosts under the reserved `.invalid` TLD
//! fail like an unresolvable address.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use afk_protocol::{AuthChallenge, AuthMode, Position, Telemetry};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time;
use tracing::debug;

use crate::client::{ConnectOptions, Control, GameClient, GameSession, SessionEvent};
use crate::error::ClientError;

const VERIFICATION_URI: &str = "https://www.microsoft.com/link";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOptions {
	/// Delay before login (or before the auth challenge).
	pub connect_latency: Duration,
	/// Time a human takes to complete the device-code challenge.
	pub auth_delay: Duration,
	pub telemetry_interval: Duration,
}

impl Default for SimulationOptions {
	fn default() -> Self {
		Self {
			connect_latency: Duration::from_millis(300),
			auth_delay: Duration::from_secs(5),
			telemetry_interval: Duration::from_secs(10),
		}
	}
}

#[derive(Debug, Default, Clone)]
pub struct SimulatedClient {
	options: SimulationOptions,
}

impl SimulatedClient {
	pub fn new(options: SimulationOptions) -> Self {
		Self { options }
	}
}

impl GameClient for SimulatedClient {
	fn connect(
		&self,
		options: ConnectOptions,
	) -> Result<(Arc<dyn GameSession>, mpsc::UnboundedReceiver<SessionEvent>), ClientError> {
		if options.host.trim().is_empty() {
			return Err(ClientError::InvalidOptions("empty host".into()));
		}
		if options.port == 0 {
			return Err(ClientError::InvalidOptions("port 0".into()));
		}

		let (tx, rx) = mpsc::unbounded_channel();
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		let session = Arc::new(SimSession {
			username: Mutex::new(None),
			entity: AtomicBool::new(false),
			telemetry: Mutex::new(Telemetry::default()),
			events: tx,
			shutdown: shutdown_tx,
		});
		debug!(target = "afk.session", host = %options.host, port = options.port, "simulated connect");
		tokio::spawn(drive(session.clone(), options, self.options, shutdown_rx));
		Ok((session, rx))
	}
}

struct SimSession {
	username: Mutex<Option<String>>,
	entity: AtomicBool,
	telemetry: Mutex<Telemetry>,
	events: mpsc::UnboundedSender<SessionEvent>,
	shutdown: watch::Sender<bool>,
}

impl SimSession {
	fn emit(&self, event: SessionEvent) {
		let _ = self.events.send(event);
	}

	fn drift(&self) {
		let mut rng = rand::rng();
		let mut telemetry = self.telemetry.lock();
		if let Some(position) = telemetry.position.as_mut() {
			position.x += rng.random_range(-0.5..0.5);
			position.z += rng.random_range(-0.5..0.5);
		}
		if let Some(food) = telemetry.food.as_mut() {
			if rng.random_bool(0.1) {
				*food = food.saturating_sub(1).max(6);
			}
		}
	}
}

impl GameSession for SimSession {
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
		debug!(target = "afk.session", yaw, pitch, "look");
	}

	fn set_control(&self, control: Control, active: bool) {
		debug!(target = "afk.session", ?control, active, "set control");
	}

	fn swing_arm(&self) {
		debug!(target = "afk.session", "swing arm");
	}

	fn chat(&self, message: &str) {
		if let Some(username) = self.username() {
			self.emit(SessionEvent::Chat {
				username,
				message: message.to_string(),
			});
		}
	}

	fn quit(&self) {
		if self.shutdown.send_replace(true) {
			return;
		}
		self.entity.store(false, Ordering::SeqCst);
		self.emit(SessionEvent::End {
			reason: "quit".to_string(),
		});
	}
}

fn display_name(options: &ConnectOptions) -> String {
	match options.auth {
		AuthMode::Offline => options.username.clone(),
		AuthMode::Microsoft => options
			.username
			.split('@')
			.next()
			.unwrap_or(&options.username)
			.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_"),
	}
}

fn user_code() -> String {
	const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
	let mut rng = rand::rng();
	let mut code: String = (0..8)
		.map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
		.collect();
	code.insert(4, '-');
	code
}

async fn drive(
	session: Arc<SimSession>,
	options: ConnectOptions,
	sim: SimulationOptions,
	mut shutdown: watch::Receiver<bool>,
) {
	macro_rules! pause {
		($duration:expr) => {
			tokio::select! {
				_ = time::sleep($duration) => {}
				_ = shutdown.changed() => return,
			}
		};
	}

	pause!(sim.connect_latency);

	if options.host.ends_with(".invalid") {
		session.emit(SessionEvent::Error {
			message: format!("getaddrinfo ENOTFOUND {}", options.host),
		});
		session.emit(SessionEvent::End {
			reason: "socketClosed".to_string(),
		});
		return;
	}

	if options.auth == AuthMode::Microsoft && !options.verified {
		session.emit(SessionEvent::AuthChallenge(AuthChallenge {
			user_code: user_code(),
			verification_uri: VERIFICATION_URI.to_string(),
		}));
		pause!(sim.auth_delay);
	}

	let username = display_name(&options);
	*session.username.lock() = Some(username.clone());
	session.emit(SessionEvent::Login { username });

	*session.telemetry.lock() = Telemetry {
		health: Some(20.0),
		food: Some(20),
		position: Some(Position {
			x: 0.5,
			y: 64.0,
			z: 0.5,
		}),
		dimension: Some("overworld".to_string()),
	};
	session.entity.store(true, Ordering::SeqCst);
	session.emit(SessionEvent::Spawn);
	session.emit(SessionEvent::Message(format!(
		"{} joined the game",
		session.username().unwrap_or_default()
	)));

	loop {
		pause!(sim.telemetry_interval);
		session.drift();
		session.emit(SessionEvent::Telemetry);
	}
}
