//! Fleet-wide settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
	/// When false, no session reconnects after it ends, whatever its own flag says.
	pub auto_reconnect: bool,
}

impl Default for GlobalSettings {
	fn default() -> Self {
		Self { auto_reconnect: true }
	}
}

impl GlobalSettings {
	pub fn apply(&mut self, patch: SettingsPatch) {
		if let Some(auto_reconnect) = patch.auto_reconnect {
			self.auto_reconnect = auto_reconnect;
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub auto_reconnect: Option<bool>,
}
