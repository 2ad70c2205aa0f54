//! Persisted bot configuration: [`SessionConfig`] and its partial updates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{BotId, ServerId};

/// Default game port used when a record or request omits one.
pub const DEFAULT_PORT: u16 = 25565;
/// Default protocol version assigned to new bots.
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.20.4";
/// Default host assigned to records that predate the `host` field.
pub const DEFAULT_HOST: &str = "localhost";

/// Protocol version requested for a connection.
///
/// Serialized as a plain string: `"auto"` lets the client negotiate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProtocolVersion {
	Auto,
	Fixed(String),
}

impl Default for ProtocolVersion {
	fn default() -> Self {
		ProtocolVersion::Fixed(DEFAULT_PROTOCOL_VERSION.to_string())
	}
}

impl From<String> for ProtocolVersion {
	fn from(value: String) -> Self {
		let trimmed = value.trim();
		if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
			ProtocolVersion::Auto
		} else {
			ProtocolVersion::Fixed(trimmed.to_string())
		}
	}
}

impl From<ProtocolVersion> for String {
	fn from(value: ProtocolVersion) -> Self {
		value.to_string()
	}
}

impl fmt::Display for ProtocolVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolVersion::Auto => write!(f, "auto"),
			ProtocolVersion::Fixed(version) => write!(f, "{version}"),
		}
	}
}

/// Target game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
	#[serde(default = "default_host", alias = "ip")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
	#[serde(default)]
	pub version: ProtocolVersion,
}

impl Default for Endpoint {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: DEFAULT_PORT,
			version: ProtocolVersion::default(),
		}
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.host, self.port)
	}
}

fn default_host() -> String {
	DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
	DEFAULT_PORT
}

/// How the account authenticates against the game server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
	/// Device-code flow; may surface an [`AuthChallenge`](crate::AuthChallenge).
	#[default]
	Microsoft,
	/// Offline-mode username, no external authentication.
	Offline,
}

impl fmt::Display for AuthMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AuthMode::Microsoft => write!(f, "microsoft"),
			AuthMode::Offline => write!(f, "offline"),
		}
	}
}

/// Credential reference for a bot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
	/// Account identifier (email for Microsoft accounts, username offline).
	#[serde(default)]
	pub email: String,
	#[serde(default, alias = "type")]
	pub auth: AuthMode,
	/// Whether a device-code challenge has been completed for this account.
	#[serde(default)]
	pub verified: bool,
}

impl Account {
	/// Returns the account identifier when one is configured.
	pub fn identifier(&self) -> Option<&str> {
		let trimmed = self.email.trim();
		(!trimmed.is_empty()).then_some(trimmed)
	}
}

/// Persisted configuration of one supervised session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
	pub id: BotId,
	pub name: String,
	#[serde(default, alias = "server")]
	pub endpoint: Endpoint,
	#[serde(default)]
	pub account: Account,
	/// Username of the dashboard user this bot is assigned to.
	#[serde(default, skip_serializing_if = "Option::is_none", alias = "assignedTo")]
	pub owner: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server_profile: Option<ServerId>,
	#[serde(default = "Utc::now")]
	pub created: DateTime<Utc>,
}

impl SessionConfig {
	/// Merges `patch` into this config.
	///
	/// Nested `endpoint` and `account` objects merge field-by-field; absent
	/// fields keep their current value.
	pub fn apply(&mut self, patch: SessionConfigPatch) {
		if let Some(name) = patch.name {
			self.name = name;
		}
		if let Some(endpoint) = patch.endpoint {
			if let Some(host) = endpoint.host {
				self.endpoint.host = host;
			}
			if let Some(port) = endpoint.port {
				self.endpoint.port = port;
			}
			if let Some(version) = endpoint.version {
				self.endpoint.version = version;
			}
		}
		if let Some(account) = patch.account {
			if let Some(email) = account.email {
				self.account.email = email;
			}
			if let Some(auth) = account.auth {
				self.account.auth = auth;
			}
			if let Some(verified) = account.verified {
				self.account.verified = verified;
			}
		}
		if let Some(owner) = patch.owner {
			self.owner = owner;
		}
		if let Some(profile) = patch.server_profile {
			self.server_profile = profile;
		}
	}
}

/// Partial update for [`SessionConfig`].
///
/// Double options distinguish "leave unchanged" (field absent) from "clear"
/// (`null`) for the optional references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none", alias = "server")]
	pub endpoint: Option<EndpointPatch>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub account: Option<AccountPatch>,
	#[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
	pub owner: Option<Option<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "double_option")]
	pub server_profile: Option<Option<ServerId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointPatch {
	#[serde(default, skip_serializing_if = "Option::is_none", alias = "ip")]
	pub host: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<ProtocolVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth: Option<AuthMode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub verified: Option<bool>,
}

/// Input for creating a bot. Only `host` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none", alias = "ip")]
	pub host: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<ProtocolVersion>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auth: Option<AuthMode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub owner: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub server_profile: Option<ServerId>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
	T: Deserialize<'de>,
	D: Deserializer<'de>,
{
	Option::<T>::deserialize(deserializer).map(Some)
}
