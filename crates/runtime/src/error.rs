use std::path::PathBuf;

use afk_protocol::{BotId, ServerId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

/// Failures of the document store.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("store I/O failed at {path}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("corrupt record {kind}/{key}")]
	Corrupt {
		kind: String,
		key: String,
		#[source]
		source: serde_json::Error,
	},

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

/// Failures of the protocol client's connect call.
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("connection refused by {host}:{port}")]
	Refused { host: String, port: u16 },

	#[error("invalid connect options: {0}")]
	InvalidOptions(String),

	#[error("client error: {0}")]
	Other(String),
}

/// Typed failures returned by fleet operations.
#[derive(Debug, Error)]
pub enum FleetError {
	#[error("bot {0} not found")]
	NotFound(BotId),

	#[error("server profile {0} not found")]
	ServerNotFound(ServerId),

	#[error("invalid input: {0}")]
	Validation(String),

	#[error("server profile {name} is full ({max_bots} bots)")]
	ProfileFull { name: String, max_bots: u32 },

	#[error("persistence failed")]
	Persistence(#[from] StoreError),
}

impl FleetError {
	/// Whether the error refers to an unknown identifier.
	pub fn is_not_found(&self) -> bool {
		matches!(self, FleetError::NotFound(_) | FleetError::ServerNotFound(_))
	}
}
