//! `config.json` for `afk serve` and data directory resolution.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use afk_runtime::{FleetOptions, IdlePolicy, Timings};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.json";

/// Server configuration. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServeConfig {
	pub bind: String,
	pub history_capacity: usize,
	pub reconnect_delay_ms: u64,
	pub restart_delay_ms: u64,
	pub heartbeat_interval_ms: u64,
	pub idle_interval_ms: u64,
	pub jump_pulse_ms: u64,
	pub idle: IdleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdleConfig {
	pub jump_chance: f64,
}

impl Default for IdleConfig {
	fn default() -> Self {
		Self {
			jump_chance: IdlePolicy::default().jump_chance,
		}
	}
}

impl Default for ServeConfig {
	fn default() -> Self {
		let timings = Timings::default();
		Self {
			bind: "127.0.0.1:3000".to_string(),
			history_capacity: afk_runtime::history::DEFAULT_CAPACITY,
			reconnect_delay_ms: millis(timings.reconnect_delay),
			restart_delay_ms: millis(timings.restart_delay),
			heartbeat_interval_ms: millis(timings.heartbeat_interval),
			idle_interval_ms: millis(timings.idle_interval),
			jump_pulse_ms: millis(timings.jump_pulse),
			idle: IdleConfig::default(),
		}
	}
}

fn millis(duration: Duration) -> u64 {
	duration.as_millis().try_into().unwrap_or(u64::MAX)
}

impl ServeConfig {
	/// Loads `<data_dir>/config.json`, falling back to defaults when absent.
	pub fn load(data_dir: &Path) -> Result<Self> {
		let path = data_dir.join(CONFIG_FILE);
		let config: Self = match fs::read_to_string(&path) {
			Ok(content) => serde_json::from_str(&content)
				.with_context(|| format!("Invalid config file: {}", path.display()))?,
			Err(err) if err.kind() == ErrorKind::NotFound => Self::default(),
			Err(err) => {
				return Err(err).with_context(|| format!("Failed to read config file: {}", path.display()));
			}
		};
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.heartbeat_interval_ms == 0 || self.idle_interval_ms == 0 {
			bail!("heartbeatIntervalMs and idleIntervalMs must be greater than zero");
		}
		if !(0.0..=1.0).contains(&self.idle.jump_chance) {
			bail!("idle.jumpChance must be between 0 and 1, got {}", self.idle.jump_chance);
		}
		if self.history_capacity == 0 {
			bail!("historyCapacity must be greater than zero");
		}
		Ok(())
	}

	pub fn fleet_options(&self) -> FleetOptions {
		FleetOptions {
			timings: Timings {
				reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
				restart_delay: Duration::from_millis(self.restart_delay_ms),
				heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
				idle_interval: Duration::from_millis(self.idle_interval_ms),
				jump_pulse: Duration::from_millis(self.jump_pulse_ms),
			},
			idle_policy: IdlePolicy {
				jump_chance: self.idle.jump_chance,
			},
			history_capacity: self.history_capacity,
			..FleetOptions::default()
		}
	}
}

/// Resolves the data directory.
///
/// Order: explicit flag, `$XDG_DATA_HOME/afk`, `$HOME/.local/share/afk`,
/// then `./afk-data`.
pub fn resolve_data_dir(flag: Option<&Path>) -> PathBuf {
	if let Some(dir) = flag {
		return dir.to_path_buf();
	}
	std::env::var_os("XDG_DATA_HOME")
		.filter(|value| !value.is_empty())
		.map(PathBuf::from)
		.or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
		.map(|base| base.join("afk"))
		.unwrap_or_else(|| PathBuf::from("afk-data"))
}
