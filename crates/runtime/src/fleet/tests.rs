use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use afk_protocol::{
	AuthChallenge, BotId, Lifecycle, NewServerProfile, NewSession, ServerId, SessionConfigPatch, SettingsPatch,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::time;

use super::*;
use crate::client::SessionEvent;
use crate::error::StoreError;
use crate::store::{JsonFileStore, KIND_HISTORY, MemoryStore};
use crate::testing::FakeClient;

fn fleet() -> (Fleet, Arc<FakeClient>, Arc<MemoryStore>) {
	let client = FakeClient::new();
	let store = Arc::new(MemoryStore::new());
	let fleet = Fleet::new(client.clone(), store.clone(), FleetOptions::default());
	(fleet, client, store)
}

fn new_bot(host: &str, email: &str) -> NewSession {
	NewSession {
		host: Some(host.into()),
		email: Some(email.into()),
		..Default::default()
	}
}

async fn settle() {
	for _ in 0..16 {
		tokio::task::yield_now().await;
	}
}

/// Store whose writes always fail.
#[derive(Default)]
struct ReadOnlyStore {
	inner: MemoryStore,
}

impl Store for ReadOnlyStore {
	fn load(&self, kind: &str, key: &str) -> std::result::Result<Option<Value>, StoreError> {
		self.inner.load(kind, key)
	}

	fn save(&self, _kind: &str, _key: &str, _value: &Value) -> std::result::Result<(), StoreError> {
		Err(StoreError::Io {
			path: PathBuf::from("/read-only"),
			source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
		})
	}

	fn delete(&self, kind: &str, key: &str) -> std::result::Result<(), StoreError> {
		self.inner.delete(kind, key)
	}

	fn keys(&self, kind: &str) -> std::result::Result<Vec<String>, StoreError> {
		self.inner.keys(kind)
	}
}

/// Store that refuses to delete bot records.
#[derive(Default)]
struct UndeletableStore {
	inner: MemoryStore,
}

impl Store for UndeletableStore {
	fn load(&self, kind: &str, key: &str) -> std::result::Result<Option<Value>, StoreError> {
		self.inner.load(kind, key)
	}

	fn save(&self, kind: &str, key: &str, value: &Value) -> std::result::Result<(), StoreError> {
		self.inner.save(kind, key, value)
	}

	fn delete(&self, kind: &str, key: &str) -> std::result::Result<(), StoreError> {
		if kind == KIND_BOTS {
			return Err(StoreError::Io {
				path: PathBuf::from("/locked"),
				source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
			});
		}
		self.inner.delete(kind, key)
	}

	fn keys(&self, kind: &str) -> std::result::Result<Vec<String>, StoreError> {
		self.inner.keys(kind)
	}
}

#[tokio::test]
async fn create_allocates_increasing_ids_with_defaults() {
	let (fleet, _, store) = fleet();
	let first = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	let second = fleet.create(new_bot("play.example.net", "b@example.com")).unwrap();

	assert_eq!(first.id, BotId(1));
	assert_eq!(second.id, BotId(2));
	assert_eq!(first.name, "Bot 1");
	assert_eq!(first.endpoint.port, 25565);
	assert_eq!(first.endpoint.version.to_string(), "1.20.4");
	assert_eq!(first.account.auth, AuthMode::Microsoft);
	assert!(!first.account.verified);
	assert!(store.load(KIND_BOTS, "2").unwrap().is_some());

	let statuses = fleet.all_statuses();
	assert_eq!(statuses.iter().map(|s| s.id).collect::<Vec<_>>(), [BotId(1), BotId(2)]);
}

#[tokio::test]
async fn create_requires_a_host() {
	let (fleet, _, _) = fleet();
	let err = fleet.create(NewSession::default()).unwrap_err();
	assert!(matches!(err, FleetError::Validation(_)));
	let err = fleet.create(new_bot("   ", "a@example.com")).unwrap_err();
	assert!(matches!(err, FleetError::Validation(_)));
	assert!(fleet.all_statuses().is_empty());
}

#[tokio::test]
async fn failed_create_registers_nothing() {
	let fleet = Fleet::new(FakeClient::new(), Arc::new(ReadOnlyStore::default()), FleetOptions::default());
	let err = fleet.create(new_bot("localhost", "a@example.com")).unwrap_err();
	assert!(matches!(err, FleetError::Persistence(_)));
	assert!(fleet.all_statuses().is_empty());
}

#[tokio::test]
async fn initialize_is_idempotent() {
	let (fleet, _, _) = fleet();
	let config = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	fleet.update_config(config.id, serde_json::from_str(r#"{"name":"Kept"}"#).unwrap()).unwrap();

	fleet.initialize(vec![config.clone(), config.clone()]);
	fleet.initialize(vec![config]);

	let statuses = fleet.all_statuses();
	assert_eq!(statuses.len(), 1);
	assert_eq!(statuses[0].name, "Kept");
}

#[tokio::test]
async fn consecutive_updates_merge_and_persist() {
	let (fleet, _, store) = fleet();
	let created = fleet
		.create(NewSession {
			name: Some("Miner".into()),
			owner: Some("alice".into()),
			..new_bot("mc.example.com", "old@example.com")
		})
		.unwrap();

	fleet.update_config(created.id, serde_json::from_str(r#"{"server":{"port":1}}"#).unwrap()).unwrap();
	let updated = fleet
		.update_config(created.id, serde_json::from_str(r#"{"account":{"email":"a@b.com"}}"#).unwrap())
		.unwrap();

	assert_eq!(updated.endpoint.port, 1);
	assert_eq!(updated.endpoint.host, "mc.example.com");
	assert_eq!(updated.account.email, "a@b.com");
	assert_eq!(updated.name, "Miner");
	assert_eq!(updated.owner.as_deref(), Some("alice"));

	let stored: SessionConfig = load_typed(store.as_ref(), KIND_BOTS, "1").unwrap().unwrap();
	assert_eq!(stored, updated);
	assert_eq!(fleet.status(created.id).unwrap().server, "mc.example.com:1");
}

#[tokio::test]
async fn update_does_not_reconnect_live_session() {
	let (fleet, client, _) = fleet();
	let config = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	fleet.start(config.id).unwrap();
	client.go_online("afk_bot");
	settle().await;

	fleet.update_config(config.id, SessionConfigPatch {
		name: Some("Renamed".into()),
		..Default::default()
	})
	.unwrap();
	settle().await;

	assert_eq!(client.connect_count(), 1);
	let status = fleet.status(config.id).unwrap();
	assert_eq!(status.lifecycle, Lifecycle::Online);
	assert_eq!(status.name, "Renamed");
}

#[tokio::test]
async fn unknown_ids_report_not_found() {
	let (fleet, _, _) = fleet();
	let missing = BotId(42);
	assert!(fleet.start(missing).unwrap_err().is_not_found());
	assert!(fleet.stop(missing).unwrap_err().is_not_found());
	assert!(fleet.restart(missing).unwrap_err().is_not_found());
	assert!(fleet.start_idle(missing).unwrap_err().is_not_found());
	assert!(fleet.stop_idle(missing).unwrap_err().is_not_found());
	assert!(fleet.chat(missing, "hi").unwrap_err().is_not_found());
	assert!(fleet.status(missing).unwrap_err().is_not_found());
	assert!(fleet.history(missing, 10).unwrap_err().is_not_found());
	assert!(fleet.clear_history(missing).unwrap_err().is_not_found());
	assert!(fleet.delete(missing).unwrap_err().is_not_found());
	assert!(fleet.update_config(missing, SessionConfigPatch::default()).unwrap_err().is_not_found());
}

#[tokio::test]
async fn delete_stops_and_removes_everything() {
	let (fleet, client, store) = fleet();
	let config = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	fleet.start(config.id).unwrap();
	client.go_online("afk_bot");
	settle().await;
	assert!(store.load(KIND_HISTORY, "1").unwrap().is_some());

	fleet.delete(config.id).unwrap();

	assert!(fleet.status(config.id).is_err());
	assert!(store.load(KIND_BOTS, "1").unwrap().is_none());
	assert!(store.load(KIND_HISTORY, "1").unwrap().is_none());
	assert!(client.last_session().unwrap().calls().contains(&crate::testing::SessionCall::Quit));
}

#[tokio::test]
async fn failed_delete_keeps_bot_registered_and_running() {
	let client = FakeClient::new();
	let store = Arc::new(UndeletableStore::default());
	let fleet = Fleet::new(client.clone(), store.clone(), FleetOptions::default());
	let config = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	fleet.start(config.id).unwrap();
	client.go_online("afk_bot");
	settle().await;

	let err = fleet.delete(config.id).unwrap_err();
	assert!(matches!(err, FleetError::Persistence(_)));

	assert!(store.load(KIND_BOTS, "1").unwrap().is_some());
	let status = fleet.status(config.id).unwrap();
	assert_eq!(status.lifecycle, Lifecycle::Online);
	assert!(!fleet.history(config.id, 100).unwrap().is_empty());
	assert!(!client.last_session().unwrap().calls().contains(&crate::testing::SessionCall::Quit));
}

#[tokio::test]
async fn new_ids_follow_the_highest_existing_id() {
	let (fleet, _, _) = fleet();
	for email in ["a@example.com", "b@example.com", "c@example.com"] {
		fleet.create(new_bot("localhost", email)).unwrap();
	}
	fleet.delete(BotId(2)).unwrap();

	let next = fleet.create(new_bot("localhost", "d@example.com")).unwrap();
	assert_eq!(next.id, BotId(4));
}

#[tokio::test]
async fn bootstrap_restores_configs_settings_and_history() {
	let tmp = TempDir::new().unwrap();
	{
		let fleet = Fleet::new(FakeClient::new(), Arc::new(JsonFileStore::new(tmp.path())), FleetOptions::default());
		let config = fleet.create(new_bot("localhost", "")).unwrap();
		fleet.start(config.id).unwrap();
		fleet
			.update_settings(SettingsPatch {
				auto_reconnect: Some(false),
			})
			.unwrap();
		fleet.create(new_bot("other.example.com", "b@example.com")).unwrap();
	}

	let fleet = Fleet::new(FakeClient::new(), Arc::new(JsonFileStore::new(tmp.path())), FleetOptions::default());
	assert_eq!(fleet.bootstrap().unwrap(), 2);
	assert!(!fleet.settings().auto_reconnect);

	let history = fleet.history(BotId(1), 100).unwrap();
	assert_eq!(history.last().map(|e| e.message.as_str()), Some("No Minecraft account email set."));
	assert_eq!(fleet.status(BotId(2)).unwrap().server, "other.example.com:25565");
	assert_eq!(fleet.status(BotId(1)).unwrap().lifecycle, Lifecycle::Offline);
}

#[tokio::test]
async fn bootstrap_skips_corrupt_records() {
	let (fleet, _, store) = fleet();
	store.save(KIND_BOTS, "1", &serde_json::json!({"nonsense": true})).unwrap();
	store
		.save(KIND_BOTS, "2", &serde_json::json!({"id": 2, "name": "Good", "endpoint": {"host": "h"}}))
		.unwrap();
	assert_eq!(fleet.bootstrap().unwrap(), 1);
	assert_eq!(fleet.status(BotId(2)).unwrap().name, "Good");
}

#[tokio::test(start_paused = true)]
async fn settings_change_applies_to_next_session_end() {
	let (fleet, client, _) = fleet();
	let config = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	fleet.start(config.id).unwrap();
	client.go_online("afk_bot");
	settle().await;

	fleet
		.update_settings(SettingsPatch {
			auto_reconnect: Some(false),
		})
		.unwrap();
	client.emit(SessionEvent::End {
		reason: "timeout".into(),
	});
	settle().await;
	assert_eq!(fleet.status(config.id).unwrap().lifecycle, Lifecycle::Offline);

	time::sleep(Duration::from_secs(30)).await;
	assert_eq!(client.connect_count(), 1);
}

#[tokio::test]
async fn failed_settings_write_leaves_settings_unchanged() {
	let fleet = Fleet::new(FakeClient::new(), Arc::new(ReadOnlyStore::default()), FleetOptions::default());
	let err = fleet
		.update_settings(SettingsPatch {
			auto_reconnect: Some(false),
		})
		.unwrap_err();
	assert!(matches!(err, FleetError::Persistence(_)));
	assert!(fleet.settings().auto_reconnect);
}

fn hub(max_bots: u32) -> NewServerProfile {
	NewServerProfile {
		name: Some("Hub".into()),
		host: Some("hub.example.com".into()),
		port: Some(25570),
		max_bots: Some(max_bots),
		..Default::default()
	}
}

#[tokio::test]
async fn server_profile_capacity_is_enforced() {
	let (fleet, _, _) = fleet();
	let profile = fleet.create_server(hub(1)).unwrap();
	assert_eq!(profile.id, ServerId(1));
	let a = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	let b = fleet.create(new_bot("localhost", "b@example.com")).unwrap();

	fleet.assign_server(a.id, Some(profile.id), false).unwrap();
	fleet.assign_server(a.id, Some(profile.id), false).unwrap();
	let err = fleet.assign_server(b.id, Some(profile.id), false).unwrap_err();
	assert!(matches!(err, FleetError::ProfileFull { max_bots: 1, .. }));

	fleet.assign_server(a.id, None, false).unwrap();
	fleet.assign_server(b.id, Some(profile.id), false).unwrap();
}

#[tokio::test]
async fn applying_a_profile_copies_its_endpoint() {
	let (fleet, _, _) = fleet();
	let profile = fleet.create_server(hub(0)).unwrap();
	let bot = fleet.create(new_bot("localhost", "a@example.com")).unwrap();

	let config = fleet.assign_server(bot.id, Some(profile.id), true).unwrap();
	assert_eq!(config.endpoint.host, "hub.example.com");
	assert_eq!(config.endpoint.port, 25570);
	assert_eq!(config.server_profile, Some(profile.id));
	assert_eq!(fleet.status(bot.id).unwrap().server, "hub.example.com:25570");
}

#[tokio::test]
async fn create_from_profile_without_host() {
	let (fleet, _, _) = fleet();
	let profile = fleet.create_server(hub(0)).unwrap();
	let config = fleet
		.create(NewSession {
			server_profile: Some(profile.id),
			..Default::default()
		})
		.unwrap();
	assert_eq!(config.endpoint.host, "hub.example.com");
	assert_eq!(config.server_profile, Some(profile.id));
}

#[tokio::test]
async fn deleting_a_profile_clears_references() {
	let (fleet, _, _) = fleet();
	let profile = fleet.create_server(hub(0)).unwrap();
	let bot = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	fleet.assign_server(bot.id, Some(profile.id), false).unwrap();

	fleet.delete_server(profile.id).unwrap();
	assert!(fleet.servers().unwrap().is_empty());
	assert_eq!(fleet.config(bot.id).unwrap().server_profile, None);
	assert!(matches!(
		fleet.delete_server(profile.id).unwrap_err(),
		FleetError::ServerNotFound(_)
	));
}

#[tokio::test]
async fn update_server_merges_fields() {
	let (fleet, _, _) = fleet();
	let profile = fleet.create_server(hub(3)).unwrap();
	let updated = fleet
		.update_server(profile.id, NewServerProfile {
			notes: Some("weekly reset".into()),
			..Default::default()
		})
		.unwrap();
	assert_eq!(updated.max_bots, 3);
	assert_eq!(updated.notes.as_deref(), Some("weekly reset"));
	assert_eq!(fleet.servers().unwrap(), vec![updated]);
}

#[tokio::test]
async fn statuses_filter_by_owner() {
	let (fleet, _, _) = fleet();
	let a = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	let b = fleet.create(new_bot("localhost", "b@example.com")).unwrap();
	fleet.assign_owner(a.id, Some("alice".into())).unwrap();
	fleet.assign_owner(b.id, Some("bob".into())).unwrap();

	let alice: Vec<_> = fleet.statuses_for_owner("alice").into_iter().map(|s| s.id).collect();
	assert_eq!(alice, [a.id]);

	fleet.assign_owner(b.id, None).unwrap();
	assert!(fleet.statuses_for_owner("bob").is_empty());
}

#[tokio::test]
async fn shutdown_stops_every_bot() {
	let (fleet, client, _) = fleet();
	for email in ["a@example.com", "b@example.com"] {
		let config = fleet.create(new_bot("localhost", email)).unwrap();
		fleet.start(config.id).unwrap();
	}
	assert_eq!(client.connect_count(), 2);

	fleet.shutdown();
	assert!(
		fleet
			.all_statuses()
			.iter()
			.all(|status| status.lifecycle == Lifecycle::Offline)
	);
}

#[tokio::test]
async fn verification_survives_config_updates_during_challenge() {
	let (fleet, client, store) = fleet();
	let config = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	assert!(!config.account.verified);
	fleet.start(config.id).unwrap();
	client.emit(SessionEvent::AuthChallenge(AuthChallenge {
		user_code: "WXYZ-9876".into(),
		verification_uri: "https://www.microsoft.com/link".into(),
	}));
	settle().await;

	fleet.update_config(config.id, SessionConfigPatch {
		name: Some("Renamed".into()),
		..Default::default()
	})
	.unwrap();
	client.go_online("afk_bot");
	settle().await;
	fleet.assign_owner(config.id, Some("alex".into())).unwrap();

	let live = fleet.config(config.id).unwrap();
	assert!(live.account.verified);
	assert_eq!(live.name, "Renamed");
	assert_eq!(live.owner.as_deref(), Some("alex"));
	let stored = load_typed::<SessionConfig>(store.as_ref(), KIND_BOTS, "1").unwrap().unwrap();
	assert_eq!(stored, live);
}

#[tokio::test]
async fn summary_counts_bots_and_servers() {
	let (fleet, client, _) = fleet();
	let busy = fleet.create_server(hub(0)).unwrap();
	let idle = fleet.create_server(hub(0)).unwrap();
	fleet.create_server(hub(0)).unwrap();

	let online = fleet.create(new_bot("localhost", "a@example.com")).unwrap();
	let parked = fleet.create(new_bot("localhost", "b@example.com")).unwrap();
	fleet.create(new_bot("localhost", "c@example.com")).unwrap();
	fleet.assign_server(online.id, Some(busy.id), false).unwrap();
	fleet.assign_server(parked.id, Some(idle.id), false).unwrap();

	fleet.start(online.id).unwrap();
	client.go_online("afk_bot");
	settle().await;

	let summary = fleet.summary().unwrap();
	assert_eq!(summary.total_bots, 3);
	assert_eq!(summary.online_bots, 1);
	assert_eq!(summary.running_bots, 1);
	assert_eq!(summary.total_servers, 3);
	assert_eq!(summary.servers_with_bots, 2);
	assert_eq!(summary.servers_online, 1);
	assert_eq!(summary.servers_offline, 1);
}
