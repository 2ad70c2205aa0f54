//! Per-session lifecycle supervisor.
//!
//! A [`Supervisor`] owns one session's state machine:
//!
//! ```text
//! Offline -> Connecting -> (AuthPending) -> Online -> Reconnecting -> Connecting ...
//!    ^                                                    |
//!    +------------------ stop / no auto-reconnect --------+
//! ```
//!
//! Protocol events arrive on a per-connection stream and are folded into the
//! state under a single lock. Each connection gets a generation number so
//! events from a superseded connection are ignored. Logs and broadcasts are
//! collected while the lock is held and emitted after it is released.

use std::sync::{Arc, Weak};
use std::time::Duration;

use afk_protocol::{
	AuthChallenge, BotId, GlobalSettings, Lifecycle, LogCategory, LogEntry, SessionConfig, StatusSnapshot, Telemetry,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::client::{ConnectOptions, GameClient, GameSession, SessionEvent};
use crate::history::{DEFAULT_CAPACITY, LogHistory};
use crate::idle::{self, IdlePolicy};
use crate::store::{KIND_BOTS, Store, save_typed};
use crate::timer::{TimerHandle, Timings};

/// Collaborators and constants shared by every supervisor in a fleet.
pub struct SupervisorContext {
	pub client: Arc<dyn GameClient>,
	pub store: Arc<dyn Store>,
	pub broadcaster: Broadcaster,
	pub settings: Arc<RwLock<GlobalSettings>>,
	pub timings: Timings,
	pub idle_policy: IdlePolicy,
	pub history_capacity: usize,
	/// Serializes read-modify-write of persisted bot records.
	pub(crate) records: Mutex<()>,
}

impl SupervisorContext {
	pub fn new(client: Arc<dyn GameClient>, store: Arc<dyn Store>, broadcaster: Broadcaster) -> Self {
		Self {
			client,
			store,
			broadcaster,
			settings: Arc::new(RwLock::new(GlobalSettings::default())),
			timings: Timings::default(),
			idle_policy: IdlePolicy::default(),
			history_capacity: DEFAULT_CAPACITY,
			records: Mutex::new(()),
		}
	}
}

/// Cloneable handle to one supervised session.
#[derive(Clone)]
pub struct Supervisor {
	inner: Arc<Inner>,
}

struct Inner {
	id: BotId,
	ctx: Arc<SupervisorContext>,
	config: RwLock<SessionConfig>,
	state: Mutex<SupervisorState>,
	history: Mutex<LogHistory>,
}

#[derive(Default)]
struct SupervisorState {
	lifecycle: Lifecycle,
	session: Option<LiveSession>,
	generation: u64,
	next_token: u64,
	started_at: Option<Instant>,
	should_auto_reconnect: bool,
	pending_auth: Option<AuthChallenge>,
	idle: Option<TimerHandle>,
	reconnect: Option<TimerHandle>,
	restart: Option<TimerHandle>,
	heartbeat: Option<TimerHandle>,
}

impl SupervisorState {
	fn token(&mut self) -> u64 {
		self.next_token += 1;
		self.next_token
	}
}

struct LiveSession {
	handle: Arc<dyn GameSession>,
	generation: u64,
	username: Option<String>,
	pump: TimerHandle,
}

/// Side effects collected under the state lock.
#[derive(Default)]
struct Effects {
	logs: Vec<(String, LogCategory)>,
	challenge: Option<AuthChallenge>,
	quit: Option<Arc<dyn GameSession>>,
	mark_verified: bool,
	status: bool,
}

impl Effects {
	fn log(&mut self, message: impl Into<String>, category: LogCategory) {
		self.logs.push((message.into(), category));
	}
}

impl Supervisor {
	/// Creates an offline supervisor and restores its log history.
	pub fn new(config: SessionConfig, ctx: Arc<SupervisorContext>) -> Self {
		let id = config.id;
		let history = LogHistory::load(id, ctx.history_capacity, ctx.store.clone());
		Self {
			inner: Arc::new(Inner {
				id,
				ctx,
				config: RwLock::new(config),
				state: Mutex::new(SupervisorState::default()),
				history: Mutex::new(history),
			}),
		}
	}

	fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
		weak.upgrade().map(|inner| Self { inner })
	}

	pub fn id(&self) -> BotId {
		self.inner.id
	}

	pub fn config(&self) -> SessionConfig {
		self.inner.config.read().clone()
	}

	/// Replaces the configuration. Takes effect on the next connect.
	pub fn update_config(&self, config: SessionConfig) {
		*self.inner.config.write() = config;
		self.publish_status();
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.inner.state.lock().lifecycle
	}

	/// Opens a session unless one is already live or being established.
	pub fn start(&self) {
		let mut fx = Effects::default();
		{
			let mut state = self.inner.state.lock();
			self.start_locked(&mut state, &mut fx);
		}
		self.apply(fx);
	}

	/// Stops the session and cancels every pending timer.
	///
	/// In-memory state is cleared before this returns; the disconnect itself
	/// is best-effort.
	pub fn stop(&self) {
		let mut fx = Effects::default();
		{
			let mut state = self.inner.state.lock();
			self.stop_locked(&mut state, &mut fx);
		}
		self.apply(fx);
	}

	/// Stops now and starts again after the restart delay.
	pub fn restart(&self) {
		let mut fx = Effects::default();
		{
			let mut state = self.inner.state.lock();
			self.stop_locked(&mut state, &mut fx);
			let token = state.token();
			let weak = Arc::downgrade(&self.inner);
			state.restart = Some(TimerHandle::after(token, self.inner.ctx.timings.restart_delay, move || {
				if let Some(supervisor) = Supervisor::from_weak(&weak) {
					supervisor.restart_fired(token);
				}
			}));
		}
		self.apply(fx);
	}

	/// Starts the idle loop. Returns false when there is no live session.
	pub fn start_idle(&self) -> bool {
		let mut fx = Effects::default();
		let started = {
			let mut guard = self.inner.state.lock();
			let state = &mut *guard;
			let token = state.token();
			match state.session.as_ref() {
				Some(live) if live.handle.has_entity() => {
					let timings = &self.inner.ctx.timings;
					let handle = idle::spawn_loop(
						token,
						&live.handle,
						self.inner.ctx.idle_policy,
						timings.idle_interval,
						timings.jump_pulse,
					);
					state.idle = Some(handle);
					fx.log("Starting AFK mode...", LogCategory::Info);
					fx.status = true;
					true
				}
				_ => false,
			}
		};
		self.apply(fx);
		started
	}

	/// Stops the idle loop if it is running.
	pub fn stop_idle(&self) {
		let mut fx = Effects::default();
		{
			let mut state = self.inner.state.lock();
			if state.idle.take().is_some() {
				fx.log("AFK mode stopped.", LogCategory::Info);
				fx.status = true;
			}
		}
		self.apply(fx);
	}

	/// Sends a chat message. Returns false when there is no live session.
	pub fn chat(&self, message: &str) -> bool {
		let handle = self.inner.state.lock().session.as_ref().map(|live| live.handle.clone());
		let Some(handle) = handle else {
			return false;
		};
		handle.chat(message);
		self.log(format!("> {message}"), LogCategory::Output);
		true
	}

	/// Projects the current state. Never mutates anything.
	pub fn status(&self) -> StatusSnapshot {
		let state = self.inner.state.lock();
		let config = self.inner.config.read();
		let live = state.session.as_ref();
		let has_entity = live.is_some_and(|live| live.handle.has_entity());
		let telemetry = match live {
			Some(live) if has_entity => live.handle.telemetry(),
			_ => Telemetry::default(),
		};

		StatusSnapshot {
			id: self.inner.id,
			name: config.name.clone(),
			lifecycle: state.lifecycle,
			online: state.lifecycle == Lifecycle::Online && has_entity,
			running: live.is_some(),
			username: live.and_then(|live| live.username.clone().or_else(|| live.handle.username())),
			server: config.endpoint.to_string(),
			uptime: state
				.started_at
				.map(|started| format_uptime(started.elapsed()))
				.unwrap_or_else(|| "0s".to_string()),
			idle_active: state.idle.is_some(),
			auto_reconnect: state.should_auto_reconnect,
			owner: config.owner.clone(),
			pending_auth: state.pending_auth.clone(),
			telemetry,
		}
	}

	/// The most recent `count` log entries, oldest first.
	pub fn history(&self, count: usize) -> Vec<LogEntry> {
		self.inner.history.lock().read(count)
	}

	pub fn clear_history(&self) {
		if let Err(err) = self.inner.history.lock().clear() {
			warn!(target = "afk.store", id = %self.inner.id, error = %err, "failed to delete log history");
		}
	}

	fn start_locked(&self, state: &mut SupervisorState, fx: &mut Effects) {
		if state.lifecycle.is_active() {
			fx.log("Bot is already running.", LogCategory::Warning);
			return;
		}

		state.should_auto_reconnect = true;
		state.reconnect = None;
		state.restart = None;

		let config = self.inner.config.read().clone();
		let Some(username) = config.account.identifier() else {
			fx.log("No Minecraft account email set.", LogCategory::Error);
			state.lifecycle = Lifecycle::Offline;
			state.should_auto_reconnect = false;
			fx.status = true;
			return;
		};

		let options = ConnectOptions {
			host: config.endpoint.host.clone(),
			port: config.endpoint.port,
			version: config.endpoint.version.clone(),
			username: username.to_string(),
			auth: config.account.auth,
			verified: config.account.verified,
		};
		fx.log(
			format!("Connecting to {} as {}...", config.endpoint, options.username),
			LogCategory::Info,
		);

		match self.inner.ctx.client.connect(options) {
			Ok((handle, events)) => {
				state.generation += 1;
				let generation = state.generation;
				let token = state.token();
				let pump = self.spawn_pump(token, generation, events);
				state.session = Some(LiveSession {
					handle,
					generation,
					username: None,
					pump,
				});
				state.lifecycle = Lifecycle::Connecting;
				state.pending_auth = None;
			}
			Err(err) => {
				fx.log(format!("Failed to create bot: {err}"), LogCategory::Error);
				state.lifecycle = Lifecycle::Offline;
				state.should_auto_reconnect = false;
			}
		}
		fx.status = true;
	}

	fn stop_locked(&self, state: &mut SupervisorState, fx: &mut Effects) {
		state.should_auto_reconnect = false;
		let cancelled_reconnect = state.reconnect.take().is_some();
		let cancelled_restart = state.restart.take().is_some();
		if state.session.is_none() && state.lifecycle == Lifecycle::Offline && !cancelled_reconnect && !cancelled_restart {
			return;
		}

		fx.log("Stopping bot...", LogCategory::Info);
		if state.idle.take().is_some() {
			fx.log("AFK mode stopped.", LogCategory::Info);
		}
		if let Some(live) = state.session.take() {
			fx.quit = Some(live.handle);
		}
		state.started_at = None;
		state.heartbeat = None;
		state.pending_auth = None;
		state.lifecycle = Lifecycle::Offline;
		fx.status = true;
		fx.log("Bot stopped.", LogCategory::Info);
	}

	fn end_locked(&self, state: &mut SupervisorState, reason: &str, fx: &mut Effects) {
		fx.log(format!("Bot disconnected: {reason}"), LogCategory::Warning);
		if let Some(live) = state.session.take() {
			// The pump delivering this event is the task behind `live.pump`.
			live.pump.detach();
		}
		state.started_at = None;
		state.heartbeat = None;
		state.pending_auth = None;
		if state.idle.take().is_some() {
			fx.log("AFK mode stopped.", LogCategory::Info);
		}

		let globally_enabled = self.inner.ctx.settings.read().auto_reconnect;
		if state.should_auto_reconnect && globally_enabled {
			let delay = self.inner.ctx.timings.reconnect_delay;
			fx.log(format!("Auto-reconnecting in {}...", describe_delay(delay)), LogCategory::Info);
			let token = state.token();
			let weak = Arc::downgrade(&self.inner);
			state.reconnect = Some(TimerHandle::after(token, delay, move || {
				if let Some(supervisor) = Supervisor::from_weak(&weak) {
					supervisor.reconnect_fired(token);
				}
			}));
			state.lifecycle = Lifecycle::Reconnecting;
		} else {
			state.lifecycle = Lifecycle::Offline;
		}
		fx.status = true;
	}

	fn handle_event(&self, generation: u64, event: SessionEvent) {
		let mut fx = Effects::default();
		{
			let mut state = self.inner.state.lock();
			let current = state.session.as_ref().is_some_and(|live| live.generation == generation);
			if !current {
				debug!(target = "afk.session", id = %self.inner.id, generation, ?event, "ignoring event from superseded session");
				return;
			}

			match event {
				SessionEvent::AuthChallenge(challenge) => {
					fx.log(format!("Microsoft Auth Code: {}", challenge.user_code), LogCategory::Action);
					fx.log(format!("Please visit {}", challenge.verification_uri), LogCategory::Action);
					if state.lifecycle == Lifecycle::Connecting {
						state.lifecycle = Lifecycle::AuthPending;
					}
					state.pending_auth = Some(challenge.clone());
					fx.challenge = Some(challenge);
					fx.status = true;
				}
				SessionEvent::Login { username } => {
					fx.log(format!("Logged in as {username}"), LogCategory::Info);
					if let Some(live) = state.session.as_mut() {
						live.username = Some(username);
					}
					if state.pending_auth.take().is_some() {
						fx.mark_verified = !self.inner.config.read().account.verified;
					}
					state.lifecycle = Lifecycle::Online;
					state.started_at = Some(Instant::now());
					let token = state.token();
					state.heartbeat = Some(self.spawn_heartbeat(token));
					fx.status = true;
				}
				SessionEvent::Spawn => {
					fx.log("Bot spawned.", LogCategory::Info);
					fx.status = true;
				}
				SessionEvent::Message(text) => fx.log(format!("[MSG] {text}"), LogCategory::Chat),
				SessionEvent::Chat { username, message } => {
					fx.log(format!("[{username}] {message}"), LogCategory::Chat)
				}
				SessionEvent::Telemetry => fx.status = true,
				SessionEvent::Kicked { reason } => fx.log(format!("Bot kicked: {reason}"), LogCategory::Error),
				SessionEvent::Error { message } => fx.log(format!("Bot error: {message}"), LogCategory::Error),
				SessionEvent::End { reason } => self.end_locked(&mut state, &reason, &mut fx),
			}
		}
		self.apply(fx);
	}

	fn reconnect_fired(&self, token: u64) {
		let mut fx = Effects::default();
		{
			let mut state = self.inner.state.lock();
			if state.reconnect.as_ref().map(TimerHandle::token) != Some(token) {
				return;
			}
			if let Some(timer) = state.reconnect.take() {
				timer.detach();
			}
			self.start_locked(&mut state, &mut fx);
		}
		self.apply(fx);
	}

	fn restart_fired(&self, token: u64) {
		let mut fx = Effects::default();
		{
			let mut state = self.inner.state.lock();
			if state.restart.as_ref().map(TimerHandle::token) != Some(token) {
				return;
			}
			if let Some(timer) = state.restart.take() {
				timer.detach();
			}
			self.start_locked(&mut state, &mut fx);
		}
		self.apply(fx);
	}

	fn heartbeat_tick(&self) {
		let uptime = {
			let state = self.inner.state.lock();
			match (state.lifecycle, state.started_at) {
				(Lifecycle::Online, Some(started)) => format_uptime(started.elapsed()),
				_ => return,
			}
		};
		self.log(format!("Uptime: {uptime}"), LogCategory::Info);
	}

	fn spawn_pump(&self, token: u64, generation: u64, mut events: mpsc::UnboundedReceiver<SessionEvent>) -> TimerHandle {
		let weak = Arc::downgrade(&self.inner);
		let task = tokio::spawn(async move {
			while let Some(event) = events.recv().await {
				let Some(supervisor) = Supervisor::from_weak(&weak) else {
					return;
				};
				let ended = matches!(event, SessionEvent::End { .. });
				supervisor.handle_event(generation, event);
				if ended {
					return;
				}
			}
			// Stream closed without an end event; the session is gone all the same.
			if let Some(supervisor) = Supervisor::from_weak(&weak) {
				supervisor.handle_event(
					generation,
					SessionEvent::End {
						reason: "connection closed".to_string(),
					},
				);
			}
		});
		TimerHandle::from_task(token, task)
	}

	fn spawn_heartbeat(&self, token: u64) -> TimerHandle {
		let weak = Arc::downgrade(&self.inner);
		TimerHandle::every(token, self.inner.ctx.timings.heartbeat_interval, move || {
			match Supervisor::from_weak(&weak) {
				Some(supervisor) => {
					supervisor.heartbeat_tick();
					true
				}
				None => false,
			}
		})
	}

	fn apply(&self, fx: Effects) {
		if let Some(session) = fx.quit {
			session.quit();
		}
		if fx.mark_verified {
			self.mark_verified();
		}
		for (message, category) in fx.logs {
			self.log(message, category);
		}
		if let Some(challenge) = fx.challenge {
			self.inner.ctx.broadcaster.publish_auth_challenge(self.inner.id, challenge);
		}
		if fx.status {
			self.publish_status();
		}
	}

	/// Records that the account completed its device-code challenge.
	///
	/// Runs under the record lock so a concurrent config update can neither
	/// overwrite the flag nor race this write.
	fn mark_verified(&self) {
		let _records = self.inner.ctx.records.lock();
		let config = {
			let mut config = self.inner.config.write();
			if config.account.verified {
				return;
			}
			config.account.verified = true;
			config.clone()
		};
		if let Err(err) = save_typed(self.inner.ctx.store.as_ref(), KIND_BOTS, &config.id.to_string(), &config) {
			warn!(target = "afk.store", id = %self.inner.id, error = %err, "failed to persist bot config");
		}
	}

	/// Appends to the session log, mirrors it to tracing, and broadcasts it.
	fn log(&self, message: String, category: LogCategory) {
		let id = self.inner.id;
		match category {
			LogCategory::Warning | LogCategory::Error => {
				warn!(target = "afk.session", id = %id, %category, "{message}")
			}
			_ => info!(target = "afk.session", id = %id, %category, "{message}"),
		}
		let (entry, persisted) = self.inner.history.lock().append(message, category);
		if let Err(err) = persisted {
			warn!(target = "afk.store", id = %id, error = %err, "failed to persist log history");
		}
		self.inner.ctx.broadcaster.publish_log(id, entry);
	}

	fn publish_status(&self) {
		self.inner.ctx.broadcaster.publish_status(self.inner.id, self.status());
	}
}

/// Formats an uptime like `2d 3h 4m`, `3h 4m 5s`, `4m 5s`, or `5s`.
pub fn format_uptime(elapsed: Duration) -> String {
	let seconds = elapsed.as_secs();
	let minutes = seconds / 60;
	let hours = minutes / 60;
	let days = hours / 24;

	if days > 0 {
		format!("{days}d {}h {}m", hours % 24, minutes % 60)
	} else if hours > 0 {
		format!("{hours}h {}m {}s", minutes % 60, seconds % 60)
	} else if minutes > 0 {
		format!("{minutes}m {}s", seconds % 60)
	} else {
		format!("{seconds}s")
	}
}

fn describe_delay(delay: Duration) -> String {
	if delay.subsec_millis() == 0 {
		format!("{} seconds", delay.as_secs())
	} else {
		format!("{} ms", delay.as_millis())
	}
}
