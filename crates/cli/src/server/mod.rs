//! HTTP control server: JSON routes over the fleet plus a websocket feed.

mod response;
mod routes;
mod ws;

use std::path::Path;
use std::sync::Arc;

use afk_runtime::{Fleet, JsonFileStore, SimulatedClient};
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::info;

pub use response::{ApiError, Reply};

use crate::config::ServeConfig;

#[derive(Clone)]
pub struct AppState {
	pub fleet: Arc<Fleet>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/api/bots", get(routes::list_bots).post(routes::create_bot))
		.route(
			"/api/bots/{id}",
			get(routes::get_bot).patch(routes::update_bot).delete(routes::delete_bot),
		)
		.route("/api/bots/{id}/start", post(routes::start_bot))
		.route("/api/bots/{id}/stop", post(routes::stop_bot))
		.route("/api/bots/{id}/restart", post(routes::restart_bot))
		.route("/api/bots/{id}/afk", post(routes::set_idle))
		.route("/api/bots/{id}/chat", post(routes::chat))
		.route("/api/bots/{id}/logs", get(routes::get_logs).delete(routes::clear_logs))
		.route("/api/bots/{id}/server", post(routes::assign_server))
		.route("/api/bots/{id}/owner", post(routes::assign_owner))
		.route("/api/summary", get(routes::summary))
		.route("/api/settings", get(routes::get_settings).patch(routes::update_settings))
		.route("/api/servers", get(routes::list_servers).post(routes::create_server))
		.route(
			"/api/servers/{id}",
			axum::routing::patch(routes::update_server).delete(routes::delete_server),
		)
		.route("/ws", get(ws::upgrade))
		.with_state(state)
}

/// Runs the control server until SIGINT/SIGTERM, then stops every bot.
pub async fn run(data_dir: &Path, config: ServeConfig) -> Result<()> {
	let store = Arc::new(JsonFileStore::new(data_dir));
	let client = Arc::new(SimulatedClient::default());
	let fleet = Arc::new(Fleet::new(client, store, config.fleet_options()));
	let count = fleet
		.bootstrap()
		.with_context(|| format!("Failed to load bots from {}", data_dir.display()))?;

	let shutdown = Shutdown::install()?;
	let listener = TcpListener::bind(&config.bind)
		.await
		.with_context(|| format!("Failed to bind control server to {}", config.bind))?;
	let addr = listener.local_addr().context("Failed to read bound address")?;
	info!(target = "afk.server", %addr, bots = count, data_dir = %data_dir.display(), "control server listening");

	let app = router(AppState { fleet: fleet.clone() });
	let served = axum::serve(listener, app.into_make_service())
		.with_graceful_shutdown(shutdown.wait())
		.await
		.context("Control server error");

	fleet.shutdown();
	info!(target = "afk.server", "control server stopped");
	served
}

/// Termination signals, installed before the server starts accepting.
struct Shutdown {
	#[cfg(unix)]
	sigterm: tokio::signal::unix::Signal,
	#[cfg(unix)]
	sigint: tokio::signal::unix::Signal,
}

impl Shutdown {
	#[cfg(unix)]
	fn install() -> Result<Self> {
		use tokio::signal::unix::{SignalKind, signal};

		let sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
		let sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
		Ok(Self { sigterm, sigint })
	}

	#[cfg(not(unix))]
	fn install() -> Result<Self> {
		Ok(Self {})
	}

	#[cfg(unix)]
	async fn wait(mut self) {
		tokio::select! {
			_ = self.sigterm.recv() => {
				info!(target = "afk.server", "received SIGTERM, shutting down");
			}
			_ = self.sigint.recv() => {
				info!(target = "afk.server", "received SIGINT, shutting down");
			}
		}
	}

	#[cfg(not(unix))]
	async fn wait(self) {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!(target = "afk.server", "received Ctrl+C, shutting down");
		}
	}
}

#[cfg(test)]
mod tests;
