//! Fleet registry: the single entry point for every bot operation.
//!
//! The [`Fleet`] owns one [`Supervisor`] per configured bot plus the
//! persisted records behind them (bot configs, global settings, server
//! profiles). Record mutations are serialized, together with the
//! supervisors' own config writes; supervisor operations are routed by id
//! and report [`FleetError::NotFound`] for unknown ids.

use std::collections::BTreeMap;
use std::sync::Arc;

use afk_protocol::{
	Account, AuthMode, BotId, DEFAULT_PORT, Endpoint, FleetEvent, FleetSummary, GlobalSettings, LogEntry,
	NewServerProfile, NewSession, ProtocolVersion, ServerId, ServerProfile, ServerProfilePatch, SessionConfig,
	SessionConfigPatch, SettingsPatch, StatusSnapshot,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::broadcast::{Broadcaster, DEFAULT_BUFFER};
use crate::client::GameClient;
use crate::error::{FleetError, Result};
use crate::history::DEFAULT_CAPACITY;
use crate::idle::IdlePolicy;
use crate::store::{KIND_BOTS, KIND_SERVERS, KIND_SETTINGS, Store, load_typed, save_typed};
use crate::supervisor::{Supervisor, SupervisorContext};
use crate::timer::Timings;

const SETTINGS_KEY: &str = "global";

/// Tunables applied to every supervisor in the fleet.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetOptions {
	pub timings: Timings,
	pub idle_policy: IdlePolicy,
	pub history_capacity: usize,
	pub broadcast_buffer: usize,
}

impl Default for FleetOptions {
	fn default() -> Self {
		Self {
			timings: Timings::default(),
			idle_policy: IdlePolicy::default(),
			history_capacity: DEFAULT_CAPACITY,
			broadcast_buffer: DEFAULT_BUFFER,
		}
	}
}

pub struct Fleet {
	ctx: Arc<SupervisorContext>,
	supervisors: RwLock<BTreeMap<BotId, Supervisor>>,
}

impl Fleet {
	pub fn new(client: Arc<dyn GameClient>, store: Arc<dyn Store>, options: FleetOptions) -> Self {
		let ctx = SupervisorContext {
			client,
			store,
			broadcaster: Broadcaster::new(options.broadcast_buffer),
			settings: Arc::new(RwLock::new(GlobalSettings::default())),
			timings: options.timings,
			idle_policy: options.idle_policy,
			history_capacity: options.history_capacity,
			records: Mutex::new(()),
		};
		Self {
			ctx: Arc::new(ctx),
			supervisors: RwLock::new(BTreeMap::new()),
		}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
		self.ctx.broadcaster.subscribe()
	}

	/// Loads settings and every bot record from the store and registers them.
	///
	/// Unreadable bot records are skipped with a warning. Returns the number
	/// of registered bots.
	pub fn bootstrap(&self) -> Result<usize> {
		let store = self.ctx.store.as_ref();
		match load_typed::<GlobalSettings>(store, KIND_SETTINGS, SETTINGS_KEY) {
			Ok(Some(settings)) => *self.ctx.settings.write() = settings,
			Ok(None) => {}
			Err(err) => warn!(target = "afk.fleet", error = %err, "ignoring unreadable settings"),
		}

		let mut configs = Vec::new();
		for key in store.keys(KIND_BOTS)? {
			match load_typed::<SessionConfig>(store, KIND_BOTS, &key) {
				Ok(Some(config)) => configs.push(config),
				Ok(None) => {}
				Err(err) => warn!(target = "afk.fleet", key = %key, error = %err, "skipping unreadable bot record"),
			}
		}
		self.initialize(configs);
		let count = self.supervisors.read().len();
		info!(target = "afk.fleet", count, "fleet bootstrapped");
		Ok(count)
	}

	/// Registers a supervisor for every config not already present.
	pub fn initialize(&self, configs: impl IntoIterator<Item = SessionConfig>) {
		let mut supervisors = self.supervisors.write();
		for config in configs {
			supervisors
				.entry(config.id)
				.or_insert_with(|| Supervisor::new(config, self.ctx.clone()));
		}
	}

	pub fn create(&self, input: NewSession) -> Result<SessionConfig> {
		let _guard = self.ctx.records.lock();

		let profile = match input.server_profile {
			Some(server_id) => {
				let profile = self.load_server(server_id)?;
				self.ensure_capacity(&profile, None)?;
				Some(profile)
			}
			None => None,
		};

		let host = non_empty(input.host);
		let endpoint = match (host, &profile) {
			(Some(host), _) => Endpoint {
				host,
				port: input.port.unwrap_or(DEFAULT_PORT),
				version: input.version.unwrap_or_default(),
			},
			(None, Some(profile)) => profile.endpoint(),
			(None, None) => return Err(FleetError::Validation("host is required".into())),
		};
		if endpoint.port == 0 {
			return Err(FleetError::Validation("port must be non-zero".into()));
		}

		let id = self.next_bot_id();
		let config = SessionConfig {
			id,
			name: non_empty(input.name).unwrap_or_else(|| format!("Bot {id}")),
			endpoint,
			account: Account {
				email: input.email.unwrap_or_default(),
				auth: input.auth.unwrap_or(AuthMode::Microsoft),
				verified: false,
			},
			owner: non_empty(input.owner),
			server_profile: profile.map(|profile| profile.id),
			created: Utc::now(),
		};

		save_typed(self.ctx.store.as_ref(), KIND_BOTS, &id.to_string(), &config)?;
		self.supervisors
			.write()
			.insert(id, Supervisor::new(config.clone(), self.ctx.clone()));
		info!(target = "afk.fleet", id = %id, name = %config.name, "bot created");
		Ok(config)
	}

	/// Stops the bot, discards its history, and deletes its record.
	pub fn delete(&self, id: BotId) -> Result<()> {
		let _guard = self.ctx.records.lock();
		let supervisor = self.supervisor(id)?;
		self.ctx.store.delete(KIND_BOTS, &id.to_string())?;
		self.supervisors.write().remove(&id);
		supervisor.stop();
		supervisor.clear_history();
		info!(target = "afk.fleet", id = %id, "bot deleted");
		Ok(())
	}

	/// Merges `patch` into the bot's config, persists it, and hands it to the
	/// live supervisor without reconnecting.
	pub fn update_config(&self, id: BotId, patch: SessionConfigPatch) -> Result<SessionConfig> {
		let _guard = self.ctx.records.lock();
		let supervisor = self.supervisor(id)?;
		if let Some(Some(server_id)) = patch.server_profile {
			self.load_server(server_id)?;
		}
		let mut config = supervisor.config();
		config.apply(patch);
		if config.endpoint.host.trim().is_empty() {
			return Err(FleetError::Validation("host is required".into()));
		}
		self.commit(&supervisor, config)
	}

	pub fn start(&self, id: BotId) -> Result<()> {
		self.supervisor(id)?.start();
		Ok(())
	}

	pub fn stop(&self, id: BotId) -> Result<()> {
		self.supervisor(id)?.stop();
		Ok(())
	}

	pub fn restart(&self, id: BotId) -> Result<()> {
		self.supervisor(id)?.restart();
		Ok(())
	}

	/// Returns whether the idle loop started; it needs a live session.
	pub fn start_idle(&self, id: BotId) -> Result<bool> {
		Ok(self.supervisor(id)?.start_idle())
	}

	pub fn stop_idle(&self, id: BotId) -> Result<()> {
		self.supervisor(id)?.stop_idle();
		Ok(())
	}

	/// Returns whether the message was sent; it needs a live session.
	pub fn chat(&self, id: BotId, message: &str) -> Result<bool> {
		Ok(self.supervisor(id)?.chat(message))
	}

	pub fn status(&self, id: BotId) -> Result<StatusSnapshot> {
		Ok(self.supervisor(id)?.status())
	}

	pub fn config(&self, id: BotId) -> Result<SessionConfig> {
		Ok(self.supervisor(id)?.config())
	}

	pub fn history(&self, id: BotId, count: usize) -> Result<Vec<LogEntry>> {
		Ok(self.supervisor(id)?.history(count))
	}

	pub fn clear_history(&self, id: BotId) -> Result<()> {
		self.supervisor(id)?.clear_history();
		Ok(())
	}

	/// One snapshot per bot, ordered by id.
	pub fn all_statuses(&self) -> Vec<StatusSnapshot> {
		self.snapshot().iter().map(Supervisor::status).collect()
	}

	/// Bot and server counts across the fleet.
	pub fn summary(&self) -> Result<FleetSummary> {
		let servers = self.servers()?;
		let mut summary = FleetSummary {
			total_servers: servers.len(),
			..FleetSummary::default()
		};
		// Per profile: whether any assigned bot is online.
		let mut assigned: BTreeMap<ServerId, bool> = BTreeMap::new();
		for supervisor in self.snapshot() {
			let status = supervisor.status();
			summary.total_bots += 1;
			summary.online_bots += usize::from(status.online);
			summary.running_bots += usize::from(status.running);
			if let Some(server) = supervisor.config().server_profile {
				*assigned.entry(server).or_default() |= status.online;
			}
		}
		summary.servers_with_bots = assigned.len();
		summary.servers_online = assigned.values().filter(|online| **online).count();
		summary.servers_offline = summary.servers_with_bots - summary.servers_online;
		Ok(summary)
	}

	pub fn configs(&self) -> Vec<SessionConfig> {
		self.snapshot().iter().map(Supervisor::config).collect()
	}

	pub fn settings(&self) -> GlobalSettings {
		self.ctx.settings.read().clone()
	}

	/// Persists the merged settings, then makes them live.
	pub fn update_settings(&self, patch: SettingsPatch) -> Result<GlobalSettings> {
		let _guard = self.ctx.records.lock();
		let mut settings = self.settings();
		settings.apply(patch);
		save_typed(self.ctx.store.as_ref(), KIND_SETTINGS, SETTINGS_KEY, &settings)?;
		*self.ctx.settings.write() = settings.clone();
		info!(target = "afk.fleet", auto_reconnect = settings.auto_reconnect, "settings updated");
		Ok(settings)
	}

	pub fn servers(&self) -> Result<Vec<ServerProfile>> {
		let store = self.ctx.store.as_ref();
		let mut servers = Vec::new();
		for key in store.keys(KIND_SERVERS)? {
			if let Some(profile) = load_typed::<ServerProfile>(store, KIND_SERVERS, &key)? {
				servers.push(profile);
			}
		}
		servers.sort_by_key(|profile| profile.id);
		Ok(servers)
	}

	pub fn create_server(&self, input: NewServerProfile) -> Result<ServerProfile> {
		let _guard = self.ctx.records.lock();
		let name = non_empty(input.name).ok_or_else(|| FleetError::Validation("name is required".into()))?;
		let host = non_empty(input.host).ok_or_else(|| FleetError::Validation("host is required".into()))?;
		let id = self
			.servers()?
			.last()
			.map(|profile| profile.id.next())
			.unwrap_or(ServerId(1));
		let profile = ServerProfile {
			id,
			name,
			host,
			port: input.port.unwrap_or(DEFAULT_PORT),
			version: input.version.unwrap_or(ProtocolVersion::Auto),
			max_bots: input.max_bots.unwrap_or(0),
			region: input.region,
			whitelist: input.whitelist.unwrap_or(false),
			notes: input.notes,
		};
		save_typed(self.ctx.store.as_ref(), KIND_SERVERS, &id.to_string(), &profile)?;
		info!(target = "afk.fleet", server = %id, name = %profile.name, "server profile created");
		Ok(profile)
	}

	pub fn update_server(&self, id: ServerId, patch: ServerProfilePatch) -> Result<ServerProfile> {
		let _guard = self.ctx.records.lock();
		let mut profile = self.load_server(id)?;
		profile.apply(patch);
		if profile.host.trim().is_empty() {
			return Err(FleetError::Validation("host is required".into()));
		}
		save_typed(self.ctx.store.as_ref(), KIND_SERVERS, &id.to_string(), &profile)?;
		Ok(profile)
	}

	/// Deletes a profile and clears it from every bot that referenced it.
	pub fn delete_server(&self, id: ServerId) -> Result<()> {
		let _guard = self.ctx.records.lock();
		self.load_server(id)?;
		for supervisor in self.snapshot() {
			let mut config = supervisor.config();
			if config.server_profile == Some(id) {
				config.server_profile = None;
				self.commit(&supervisor, config)?;
			}
		}
		self.ctx.store.delete(KIND_SERVERS, &id.to_string())?;
		info!(target = "afk.fleet", server = %id, "server profile deleted");
		Ok(())
	}

	/// Assigns a bot to a server profile, or clears the assignment.
	///
	/// Fails with [`FleetError::ProfileFull`] when the profile is at its
	/// `maxBots` limit; a bot already on the profile does not count twice.
	/// With `apply_profile` the profile's endpoint replaces the bot's.
	pub fn assign_server(&self, bot: BotId, server: Option<ServerId>, apply_profile: bool) -> Result<SessionConfig> {
		let _guard = self.ctx.records.lock();
		let supervisor = self.supervisor(bot)?;
		let mut config = supervisor.config();
		match server {
			Some(server_id) => {
				let profile = self.load_server(server_id)?;
				self.ensure_capacity(&profile, Some(bot))?;
				config.server_profile = Some(server_id);
				if apply_profile {
					config.endpoint = profile.endpoint();
				}
			}
			None => config.server_profile = None,
		}
		self.commit(&supervisor, config)
	}

	/// Assigns the bot to a dashboard user, or clears the owner.
	pub fn assign_owner(&self, bot: BotId, owner: Option<String>) -> Result<SessionConfig> {
		let _guard = self.ctx.records.lock();
		let supervisor = self.supervisor(bot)?;
		let mut config = supervisor.config();
		config.owner = non_empty(owner);
		self.commit(&supervisor, config)
	}

	pub fn statuses_for_owner(&self, owner: &str) -> Vec<StatusSnapshot> {
		self.snapshot()
			.iter()
			.filter(|supervisor| supervisor.config().owner.as_deref() == Some(owner))
			.map(Supervisor::status)
			.collect()
	}

	/// Stops every supervisor, cancelling timers and requesting disconnects.
	pub fn shutdown(&self) {
		let supervisors = self.snapshot();
		info!(target = "afk.fleet", count = supervisors.len(), "stopping all bots");
		for supervisor in supervisors {
			supervisor.stop();
		}
	}

	fn supervisor(&self, id: BotId) -> Result<Supervisor> {
		self.supervisors.read().get(&id).cloned().ok_or(FleetError::NotFound(id))
	}

	/// Clones the handles so no registry lock is held while supervisors run.
	fn snapshot(&self) -> Vec<Supervisor> {
		self.supervisors.read().values().cloned().collect()
	}

	fn next_bot_id(&self) -> BotId {
		let supervisors = self.supervisors.read();
		let from_registry = supervisors.keys().next_back().map(|id| id.next());
		let from_store = self
			.ctx
			.store
			.keys(KIND_BOTS)
			.unwrap_or_default()
			.iter()
			.filter_map(|key| key.parse::<BotId>().ok())
			.max()
			.map(BotId::next);
		from_registry.max(from_store).unwrap_or(BotId(1))
	}

	fn load_server(&self, id: ServerId) -> Result<ServerProfile> {
		load_typed::<ServerProfile>(self.ctx.store.as_ref(), KIND_SERVERS, &id.to_string())?
			.ok_or(FleetError::ServerNotFound(id))
	}

	fn ensure_capacity(&self, profile: &ServerProfile, bot: Option<BotId>) -> Result<()> {
		let assigned = self
			.snapshot()
			.iter()
			.filter(|supervisor| Some(supervisor.id()) != bot)
			.filter(|supervisor| supervisor.config().server_profile == Some(profile.id))
			.count();
		if profile.is_full(assigned) {
			return Err(FleetError::ProfileFull {
				name: profile.name.clone(),
				max_bots: profile.max_bots,
			});
		}
		Ok(())
	}

	/// Persists `config` and pushes it into the live supervisor.
	fn commit(&self, supervisor: &Supervisor, config: SessionConfig) -> Result<SessionConfig> {
		save_typed(self.ctx.store.as_ref(), KIND_BOTS, &config.id.to_string(), &config)?;
		supervisor.update_config(config.clone());
		Ok(config)
	}
}

fn non_empty(value: Option<String>) -> Option<String> {
	value
		.map(|value| value.trim().to_string())
		.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests;
