//! Offline management of bot records.
//!
//! These commands work on the data directory directly. Changes made while a
//! server is running against the same directory are picked up on its next
//! start.

use std::path::Path;
use std::sync::Arc;

use afk_protocol::{AuthMode, NewSession, ProtocolVersion, SessionConfig};
use afk_runtime::{Fleet, FleetOptions, JsonFileStore, SimulatedClient};
use anyhow::{Context, Result};

use crate::cli::{AddBotArgs, BotsAction};

pub fn execute(data_dir: &Path, action: BotsAction) -> Result<()> {
	let fleet = open(data_dir)?;
	match action {
		BotsAction::List { json } => list(&fleet, json),
		BotsAction::Add(args) => add(&fleet, args),
		BotsAction::Rm { id } => {
			fleet.delete(id).with_context(|| format!("Failed to remove bot {id}"))?;
			println!("Removed bot {id}");
			Ok(())
		}
	}
}

fn open(data_dir: &Path) -> Result<Fleet> {
	let store = Arc::new(JsonFileStore::new(data_dir));
	let fleet = Fleet::new(Arc::new(SimulatedClient::default()), store, FleetOptions::default());
	fleet
		.bootstrap()
		.with_context(|| format!("Failed to load bots from {}", data_dir.display()))?;
	Ok(fleet)
}

fn list(fleet: &Fleet, json: bool) -> Result<()> {
	let configs = fleet.configs();
	if json {
		println!("{}", serde_json::to_string_pretty(&configs)?);
		return Ok(());
	}
	if configs.is_empty() {
		println!("No bots configured");
		return Ok(());
	}
	for config in &configs {
		println!("{}", summary_line(config));
	}
	Ok(())
}

fn summary_line(config: &SessionConfig) -> String {
	let account = config.account.identifier().unwrap_or("-");
	let mut line = format!(
		"{:>4}  {:<16}  {:<28}  {} ({})",
		config.id.0,
		config.name,
		config.endpoint.to_string(),
		account,
		config.endpoint.version
	);
	if let Some(owner) = &config.owner {
		line.push_str(&format!("  owner={owner}"));
	}
	line
}

fn add(fleet: &Fleet, args: AddBotArgs) -> Result<()> {
	let input = NewSession {
		name: args.name,
		host: Some(args.host),
		port: args.port,
		version: args.version.map(ProtocolVersion::from),
		email: args.email,
		auth: Some(if args.offline {
			AuthMode::Offline
		} else {
			AuthMode::Microsoft
		}),
		owner: args.owner,
		server_profile: None,
	};
	let config = fleet.create(input).context("Failed to add bot")?;
	println!("Added bot {} ({}) -> {}", config.id, config.name, config.endpoint);
	Ok(())
}
