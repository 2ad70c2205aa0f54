//! Bounded, persisted per-session log.

use std::collections::VecDeque;
use std::sync::Arc;

use afk_protocol::{BotId, LogCategory, LogEntry};
use tracing::warn;

use crate::error::StoreError;
use crate::store::{KIND_HISTORY, Store, load_typed, save_typed};

/// Entries kept per session unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 1000;
/// Entries returned by a history read when the caller gives no count.
pub const DEFAULT_READ_COUNT: usize = 100;

/// Append-only ring buffer of [`LogEntry`]s, written through to the store on
/// every append.
pub struct LogHistory {
	key: String,
	capacity: usize,
	entries: VecDeque<LogEntry>,
	store: Arc<dyn Store>,
}

impl LogHistory {
	/// Restores the history of `id` from the store.
	///
	/// Absent or unreadable history starts empty; corruption is logged.
	pub fn load(id: BotId, capacity: usize, store: Arc<dyn Store>) -> Self {
		let key = id.to_string();
		let capacity = capacity.max(1);
		let mut entries: VecDeque<LogEntry> =
			match load_typed::<Vec<LogEntry>>(store.as_ref(), KIND_HISTORY, &key) {
				Ok(Some(entries)) => entries.into(),
				Ok(None) => VecDeque::new(),
				Err(err) => {
					warn!(target = "afk.store", id = %id, error = %err, "discarding unreadable log history");
					VecDeque::new()
				}
			};
		while entries.len() > capacity {
			entries.pop_front();
		}
		Self {
			key,
			capacity,
			entries,
			store,
		}
	}

	/// Appends a timestamped entry, evicting the oldest past capacity.
	///
	/// The in-memory buffer is updated even if the write fails.
	pub fn append(&mut self, message: impl Into<String>, category: LogCategory) -> (LogEntry, Result<(), StoreError>) {
		let entry = LogEntry::now(message, category);
		self.entries.push_back(entry.clone());
		while self.entries.len() > self.capacity {
			self.entries.pop_front();
		}
		let persisted = self.persist();
		(entry, persisted)
	}

	/// The most recent `count` entries, oldest first.
	pub fn read(&self, count: usize) -> Vec<LogEntry> {
		let skip = self.entries.len().saturating_sub(count);
		self.entries.iter().skip(skip).cloned().collect()
	}

	/// Empties the buffer and removes the durable copy.
	pub fn clear(&mut self) -> Result<(), StoreError> {
		self.entries.clear();
		self.store.delete(KIND_HISTORY, &self.key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn persist(&self) -> Result<(), StoreError> {
		save_typed(self.store.as_ref(), KIND_HISTORY, &self.key, &self.entries)
	}
}
