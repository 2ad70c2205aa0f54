//! Opaque key/value document store for configs, settings, and histories.
//!
//! Documents are grouped by `kind` (`bots`, `settings`, `servers`, `history`)
//! and addressed by `key`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;

pub const KIND_BOTS: &str = "bots";
pub const KIND_SERVERS: &str = "servers";
pub const KIND_SETTINGS: &str = "settings";
pub const KIND_HISTORY: &str = "history";

pub trait Store: Send + Sync {
	fn load(&self, kind: &str, key: &str) -> Result<Option<Value>, StoreError>;

	fn save(&self, kind: &str, key: &str, value: &Value) -> Result<(), StoreError>;

	/// Removes a document. Missing documents are not an error.
	fn delete(&self, kind: &str, key: &str) -> Result<(), StoreError>;

	/// Keys present under `kind`, sorted.
	fn keys(&self, kind: &str) -> Result<Vec<String>, StoreError>;
}

/// Loads and decodes a typed document.
pub fn load_typed<T: DeserializeOwned>(
	store: &dyn Store,
	kind: &str,
	key: &str,
) -> Result<Option<T>, StoreError> {
	let Some(value) = store.load(kind, key)? else {
		return Ok(None);
	};
	serde_json::from_value(value)
		.map(Some)
		.map_err(|source| StoreError::Corrupt {
			kind: kind.to_string(),
			key: key.to_string(),
			source,
		})
}

pub fn save_typed<T: Serialize>(
	store: &dyn Store,
	kind: &str,
	key: &str,
	data: &T,
) -> Result<(), StoreError> {
	store.save(kind, key, &serde_json::to_value(data)?)
}

/// One pretty-printed JSON file per document: `<root>/<kind>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
	root: PathBuf,
}

impl JsonFileStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn path(&self, kind: &str, key: &str) -> PathBuf {
		self.root.join(kind).join(format!("{key}.json"))
	}
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
	move |source| StoreError::Io {
		path: path.to_path_buf(),
		source,
	}
}

impl Store for JsonFileStore {
	fn load(&self, kind: &str, key: &str) -> Result<Option<Value>, StoreError> {
		let path = self.path(kind, key);
		let content = match fs::read_to_string(&path) {
			Ok(content) => content,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
			Err(err) => return Err(io_error(&path)(err)),
		};
		serde_json::from_str(&content)
			.map(Some)
			.map_err(|source| StoreError::Corrupt {
				kind: kind.to_string(),
				key: key.to_string(),
				source,
			})
	}

	fn save(&self, kind: &str, key: &str, value: &Value) -> Result<(), StoreError> {
		let path = self.path(kind, key);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(io_error(parent))?;
		}
		// Readers never observe a partially written document.
		let tmp = path.with_extension("json.tmp");
		fs::write(&tmp, serde_json::to_string_pretty(value)?).map_err(io_error(&tmp))?;
		fs::rename(&tmp, &path).map_err(io_error(&path))?;
		debug!(target = "afk.store", kind, key, "saved document");
		Ok(())
	}

	fn delete(&self, kind: &str, key: &str) -> Result<(), StoreError> {
		let path = self.path(kind, key);
		match fs::remove_file(&path) {
			Ok(()) => Ok(()),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
			Err(err) => Err(io_error(&path)(err)),
		}
	}

	fn keys(&self, kind: &str) -> Result<Vec<String>, StoreError> {
		let dir = self.root.join(kind);
		let entries = match fs::read_dir(&dir) {
			Ok(entries) => entries,
			Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(io_error(&dir)(err)),
		};
		let mut keys = Vec::new();
		for entry in entries {
			let path = entry.map_err(io_error(&dir))?.path();
			if path.extension().is_some_and(|ext| ext == "json") {
				if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
					keys.push(stem.to_string());
				}
			}
		}
		keys.sort();
		Ok(keys)
	}
}

/// In-process store used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
	docs: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Store for MemoryStore {
	fn load(&self, kind: &str, key: &str) -> Result<Option<Value>, StoreError> {
		Ok(self.docs.lock().get(kind).and_then(|docs| docs.get(key)).cloned())
	}

	fn save(&self, kind: &str, key: &str, value: &Value) -> Result<(), StoreError> {
		self.docs
			.lock()
			.entry(kind.to_string())
			.or_default()
			.insert(key.to_string(), value.clone());
		Ok(())
	}

	fn delete(&self, kind: &str, key: &str) -> Result<(), StoreError> {
		if let Some(docs) = self.docs.lock().get_mut(kind) {
			docs.remove(key);
		}
		Ok(())
	}

	fn keys(&self, kind: &str) -> Result<Vec<String>, StoreError> {
		Ok(self
			.docs
			.lock()
			.get(kind)
			.map(|docs| docs.keys().cloned().collect())
			.unwrap_or_default())
	}
}
