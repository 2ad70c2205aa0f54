use std::sync::Arc;

use afk_runtime::testing::FakeClient;
use afk_runtime::{Fleet, FleetOptions, MemoryStore};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::{AppState, router};

fn app() -> (Router, Arc<FakeClient>) {
	let client = FakeClient::new();
	let fleet = Fleet::new(client.clone(), Arc::new(MemoryStore::new()), FleetOptions::default());
	let app = router(AppState { fleet: Arc::new(fleet) });
	(app, client)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
	let builder = Request::builder().method(method).uri(uri);
	let request = match body {
		Some(body) => builder
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap(),
		None => builder.body(Body::empty()).unwrap(),
	};
	let response = app.clone().oneshot(request).await.unwrap();
	let status = response.status();
	let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
	let value = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).unwrap()
	};
	(status, value)
}

async fn create_bot(app: &Router, body: Value) -> u64 {
	let (status, reply) = call(app, "POST", "/api/bots", Some(body)).await;
	assert_eq!(status, StatusCode::CREATED, "{reply}");
	reply["data"]["id"].as_u64().unwrap()
}

#[tokio::test]
async fn created_bot_is_listed_offline() {
	let (app, _) = app();
	let id = create_bot(&app, json!({"name": "Miner", "host": "mc.example.net", "email": "a@example.com"})).await;

	let (status, reply) = call(&app, "GET", "/api/bots", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(reply["success"], true);
	let bots = reply["data"].as_array().unwrap();
	assert_eq!(bots.len(), 1);
	assert_eq!(bots[0]["id"], id);
	assert_eq!(bots[0]["name"], "Miner");
	assert_eq!(bots[0]["online"], false);
	assert_eq!(bots[0]["running"], false);
}

#[tokio::test]
async fn create_without_host_is_rejected() {
	let (app, _) = app();
	let (status, reply) = call(&app, "POST", "/api/bots", Some(json!({"name": "NoHost"}))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(reply["success"], false);
	assert!(reply["message"].as_str().unwrap().contains("host"));
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
	let (app, _) = app();
	let request = Request::builder()
		.method("POST")
		.uri("/api/bots")
		.header("content-type", "application/json")
		.body(Body::from("{not json"))
		.unwrap();
	let response = app.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_bot_is_not_found() {
	let (app, _) = app();
	for (method, uri) in [
		("GET", "/api/bots/99"),
		("POST", "/api/bots/99/start"),
		("POST", "/api/bots/99/stop"),
		("GET", "/api/bots/99/logs"),
		("DELETE", "/api/bots/99"),
	] {
		let (status, reply) = call(&app, method, uri, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
		assert_eq!(reply["success"], false);
	}
}

#[tokio::test]
async fn patch_merges_nested_fields() {
	let (app, _) = app();
	let id = create_bot(&app, json!({"host": "old.example.net", "port": 25570, "email": "a@example.com"})).await;

	let (status, reply) = call(
		&app,
		"PATCH",
		&format!("/api/bots/{id}"),
		Some(json!({"server": {"host": "new.example.net"}})),
	)
	.await;
	assert_eq!(status, StatusCode::OK, "{reply}");
	assert_eq!(reply["data"]["endpoint"]["host"], "new.example.net");
	assert_eq!(reply["data"]["endpoint"]["port"], 25570);
	assert_eq!(reply["data"]["account"]["email"], "a@example.com");

	let (_, reply) = call(&app, "GET", &format!("/api/bots/{id}"), None).await;
	assert_eq!(reply["data"]["config"]["endpoint"]["host"], "new.example.net");
	assert_eq!(reply["data"]["status"]["server"], "new.example.net:25570");
}

#[tokio::test]
async fn start_and_stop_drive_the_session() {
	let (app, client) = app();
	let id = create_bot(&app, json!({"host": "mc.example.net", "email": "a@example.com"})).await;

	let (status, _) = call(&app, "POST", &format!("/api/bots/{id}/start"), None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(client.connect_count(), 1);
	let (_, reply) = call(&app, "GET", &format!("/api/bots/{id}"), None).await;
	assert_eq!(reply["data"]["status"]["running"], true);

	let (status, _) = call(&app, "POST", &format!("/api/bots/{id}/stop"), None).await;
	assert_eq!(status, StatusCode::OK);
	let (_, reply) = call(&app, "GET", &format!("/api/bots/{id}"), None).await;
	assert_eq!(reply["data"]["status"]["running"], false);

	let (_, reply) = call(&app, "GET", &format!("/api/bots/{id}/logs"), None).await;
	let messages: Vec<&str> = reply["data"]
		.as_array()
		.unwrap()
		.iter()
		.map(|entry| entry["message"].as_str().unwrap())
		.collect();
	assert!(messages.contains(&"Stopping bot..."), "{messages:?}");
	assert!(messages.contains(&"Bot stopped."), "{messages:?}");
}

#[tokio::test]
async fn chat_and_idle_need_an_online_bot() {
	let (app, _) = app();
	let id = create_bot(&app, json!({"host": "mc.example.net", "email": "a@example.com"})).await;

	let (status, reply) = call(&app, "POST", &format!("/api/bots/{id}/chat"), Some(json!({"message": "hi"}))).await;
	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(reply["success"], false);

	let (status, _) = call(&app, "POST", &format!("/api/bots/{id}/chat"), Some(json!({"message": "  "}))).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _) = call(&app, "POST", &format!("/api/bots/{id}/afk"), Some(json!({"enabled": true}))).await;
	assert_eq!(status, StatusCode::CONFLICT);

	let (status, _) = call(&app, "POST", &format!("/api/bots/{id}/afk"), Some(json!({"enabled": false}))).await;
	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logs_honour_count_and_clear() {
	let (app, _) = app();
	let id = create_bot(&app, json!({"host": "mc.example.net"})).await;

	// Missing email: each start logs one error line.
	for _ in 0..3 {
		call(&app, "POST", &format!("/api/bots/{id}/start"), None).await;
	}
	let (_, reply) = call(&app, "GET", &format!("/api/bots/{id}/logs?count=2"), None).await;
	let entries = reply["data"].as_array().unwrap();
	assert_eq!(entries.len(), 2);
	assert_eq!(entries[0]["type"], "error");

	let (status, _) = call(&app, "DELETE", &format!("/api/bots/{id}/logs"), None).await;
	assert_eq!(status, StatusCode::OK);
	let (_, reply) = call(&app, "GET", &format!("/api/bots/{id}/logs"), None).await;
	assert!(reply["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn settings_round_trip() {
	let (app, _) = app();
	let (_, reply) = call(&app, "GET", "/api/settings", None).await;
	assert_eq!(reply["data"]["autoReconnect"], true);

	let (status, reply) = call(&app, "PATCH", "/api/settings", Some(json!({"autoReconnect": false}))).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(reply["data"]["autoReconnect"], false);

	let (_, reply) = call(&app, "GET", "/api/settings", None).await;
	assert_eq!(reply["data"]["autoReconnect"], false);
}

#[tokio::test]
async fn full_server_profile_refuses_assignment() {
	let (app, _) = app();
	let (status, reply) = call(
		&app,
		"POST",
		"/api/servers",
		Some(json!({"name": "Hub", "host": "hub.example.net", "maxBots": 1})),
	)
	.await;
	assert_eq!(status, StatusCode::CREATED, "{reply}");
	let server = reply["data"]["id"].as_u64().unwrap();

	let first = create_bot(&app, json!({"host": "mc.example.net"})).await;
	let second = create_bot(&app, json!({"host": "mc.example.net"})).await;

	let (status, reply) = call(
		&app,
		"POST",
		&format!("/api/bots/{first}/server"),
		Some(json!({"serverId": server, "applyProfile": true})),
	)
	.await;
	assert_eq!(status, StatusCode::OK, "{reply}");
	assert_eq!(reply["data"]["endpoint"]["host"], "hub.example.net");

	let (status, reply) = call(
		&app,
		"POST",
		&format!("/api/bots/{second}/server"),
		Some(json!({"serverId": server})),
	)
	.await;
	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(reply["success"], false);

	let (status, _) = call(&app, "DELETE", &format!("/api/servers/{server}"), None).await;
	assert_eq!(status, StatusCode::OK);
	let (_, reply) = call(&app, "GET", &format!("/api/bots/{first}"), None).await;
	assert!(reply["data"]["config"].get("serverProfile").is_none());
}

#[tokio::test]
async fn owner_filter_limits_listing() {
	let (app, _) = app();
	let mine = create_bot(&app, json!({"host": "mc.example.net", "owner": "alex"})).await;
	let theirs = create_bot(&app, json!({"host": "mc.example.net"})).await;

	let (status, _) = call(
		&app,
		"POST",
		&format!("/api/bots/{theirs}/owner"),
		Some(json!({"owner": "sam"})),
	)
	.await;
	assert_eq!(status, StatusCode::OK);

	let (_, reply) = call(&app, "GET", "/api/bots?owner=alex", None).await;
	let bots = reply["data"].as_array().unwrap();
	assert_eq!(bots.len(), 1);
	assert_eq!(bots[0]["id"], mine);
	assert_eq!(bots[0]["owner"], "alex");
}

#[tokio::test]
async fn summary_reports_fleet_counts() {
	let (app, client) = app();
	let id = create_bot(&app, json!({"host": "mc.example.net", "email": "a@example.com"})).await;
	create_bot(&app, json!({"host": "mc.example.net"})).await;
	call(&app, "POST", &format!("/api/bots/{id}/start"), None).await;
	assert!(client.go_online("afk_bot"));
	for _ in 0..16 {
		tokio::task::yield_now().await;
	}

	let (status, reply) = call(&app, "GET", "/api/summary", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(reply["data"]["totalBots"], 2);
	assert_eq!(reply["data"]["onlineBots"], 1);
	assert_eq!(reply["data"]["totalServers"], 0);
	assert_eq!(reply["data"]["serversWithBots"], 0);
}
