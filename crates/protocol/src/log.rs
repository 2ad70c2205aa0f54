//! Per-session log entries shown to observers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a session log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
	#[default]
	Info,
	Warning,
	Error,
	/// Something the operator must act on (e.g. an auth prompt).
	Action,
	/// Inbound chat or server messages.
	Chat,
	/// Outbound chat sent by the bot.
	Output,
}

impl fmt::Display for LogCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			LogCategory::Info => "info",
			LogCategory::Warning => "warning",
			LogCategory::Error => "error",
			LogCategory::Action => "action",
			LogCategory::Chat => "chat",
			LogCategory::Output => "output",
		};
		f.write_str(label)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
	pub timestamp: DateTime<Utc>,
	pub message: String,
	#[serde(default, rename = "type", alias = "category")]
	pub category: LogCategory,
}

impl LogEntry {
	/// Creates an entry stamped with the current time.
	pub fn now(message: impl Into<String>, category: LogCategory) -> Self {
		Self {
			timestamp: Utc::now(),
			message: message.into(),
			category,
		}
	}
}

impl fmt::Display for LogEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"[{}] {:<7} {}",
			self.timestamp.format("%H:%M:%S"),
			self.category,
			self.message
		)
	}
}
