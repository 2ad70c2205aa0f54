//! Server profiles: named game endpoints bots can be assigned to.

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_PORT, Endpoint, ProtocolVersion};
use crate::ids::ServerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProfile {
	pub id: ServerId,
	pub name: String,
	#[serde(alias = "ip")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
	#[serde(default)]
	pub version: ProtocolVersion,
	/// Maximum number of bots assigned to this profile; 0 means unlimited.
	#[serde(default)]
	pub max_bots: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(default)]
	pub whitelist: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

impl ServerProfile {
	pub fn endpoint(&self) -> Endpoint {
		Endpoint {
			host: self.host.clone(),
			port: self.port,
			version: self.version.clone(),
		}
	}

	/// Whether `assigned` bots already fill the profile.
	pub fn is_full(&self, assigned: usize) -> bool {
		self.max_bots != 0 && assigned >= self.max_bots as usize
	}

	pub fn apply(&mut self, patch: ServerProfilePatch) {
		if let Some(name) = patch.name {
			self.name = name;
		}
		if let Some(host) = patch.host {
			self.host = host;
		}
		if let Some(port) = patch.port {
			self.port = port;
		}
		if let Some(version) = patch.version {
			self.version = version;
		}
		if let Some(max_bots) = patch.max_bots {
			self.max_bots = max_bots;
		}
		if let Some(region) = patch.region {
			self.region = Some(region);
		}
		if let Some(whitelist) = patch.whitelist {
			self.whitelist = whitelist;
		}
		if let Some(notes) = patch.notes {
			self.notes = Some(notes);
		}
	}
}

fn default_port() -> u16 {
	DEFAULT_PORT
}

/// Input for creating a server profile. `name` and `host` are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServerProfile {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none", alias = "ip")]
	pub host: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<ProtocolVersion>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_bots: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub whitelist: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

pub type ServerProfilePatch = NewServerProfile;
