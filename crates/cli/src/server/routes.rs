use afk_protocol::{
	BotId, FleetSummary, GlobalSettings, LogEntry, NewServerProfile, NewSession, ServerId, ServerProfile,
	ServerProfilePatch, SessionConfig, SessionConfigPatch, SettingsPatch, StatusSnapshot,
};
use afk_runtime::history::DEFAULT_READ_COUNT;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::response::{ApiError, Reply};

type ApiResult<T> = Result<Reply<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
	owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
	count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct IdleRequest {
	enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
	message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignServerRequest {
	server_id: Option<ServerId>,
	#[serde(default)]
	apply_profile: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssignOwnerRequest {
	owner: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BotDetail {
	config: SessionConfig,
	status: StatusSnapshot,
}

pub async fn list_bots(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Reply<Vec<StatusSnapshot>> {
	let statuses = match query.owner.as_deref() {
		Some(owner) => state.fleet.statuses_for_owner(owner),
		None => state.fleet.all_statuses(),
	};
	Reply::data(statuses)
}

pub async fn create_bot(
	State(state): State<AppState>,
	input: Result<Json<NewSession>, JsonRejection>,
) -> Result<(StatusCode, Reply<SessionConfig>), ApiError> {
	let Json(input) = input?;
	let config = state.fleet.create(input)?;
	Ok((StatusCode::CREATED, Reply::data(config).with_message("Bot created")))
}

pub async fn get_bot(State(state): State<AppState>, Path(id): Path<BotId>) -> ApiResult<BotDetail> {
	let config = state.fleet.config(id)?;
	let status = state.fleet.status(id)?;
	Ok(Reply::data(BotDetail { config, status }))
}

pub async fn update_bot(
	State(state): State<AppState>,
	Path(id): Path<BotId>,
	patch: Result<Json<SessionConfigPatch>, JsonRejection>,
) -> ApiResult<SessionConfig> {
	let Json(patch) = patch?;
	let config = state.fleet.update_config(id, patch)?;
	Ok(Reply::data(config).with_message("Bot updated; changes apply on next connect"))
}

pub async fn delete_bot(State(state): State<AppState>, Path(id): Path<BotId>) -> ApiResult<()> {
	state.fleet.delete(id)?;
	Ok(Reply::ok("Bot deleted"))
}

pub async fn start_bot(State(state): State<AppState>, Path(id): Path<BotId>) -> ApiResult<()> {
	state.fleet.start(id)?;
	Ok(Reply::ok("Bot starting"))
}

pub async fn stop_bot(State(state): State<AppState>, Path(id): Path<BotId>) -> ApiResult<()> {
	state.fleet.stop(id)?;
	Ok(Reply::ok("Bot stopped"))
}

pub async fn restart_bot(State(state): State<AppState>, Path(id): Path<BotId>) -> ApiResult<()> {
	state.fleet.restart(id)?;
	Ok(Reply::ok("Bot restarting"))
}

pub async fn set_idle(
	State(state): State<AppState>,
	Path(id): Path<BotId>,
	request: Result<Json<IdleRequest>, JsonRejection>,
) -> ApiResult<()> {
	let Json(request) = request?;
	if !request.enabled {
		state.fleet.stop_idle(id)?;
		return Ok(Reply::ok("AFK mode stopped"));
	}
	if state.fleet.start_idle(id)? {
		Ok(Reply::ok("AFK mode started"))
	} else {
		Err(ApiError::Conflict("Bot is not online".into()))
	}
}

pub async fn chat(
	State(state): State<AppState>,
	Path(id): Path<BotId>,
	request: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<()> {
	let Json(request) = request?;
	let message = request.message.trim();
	if message.is_empty() {
		return Err(ApiError::BadRequest("message must not be empty".into()));
	}
	if state.fleet.chat(id, message)? {
		Ok(Reply::ok("Message sent"))
	} else {
		Err(ApiError::Conflict("Bot is not online".into()))
	}
}

pub async fn get_logs(
	State(state): State<AppState>,
	Path(id): Path<BotId>,
	Query(query): Query<LogsQuery>,
) -> ApiResult<Vec<LogEntry>> {
	let count = query.count.unwrap_or(DEFAULT_READ_COUNT);
	Ok(Reply::data(state.fleet.history(id, count)?))
}

pub async fn clear_logs(State(state): State<AppState>, Path(id): Path<BotId>) -> ApiResult<()> {
	state.fleet.clear_history(id)?;
	Ok(Reply::ok("Log history cleared"))
}

pub async fn assign_server(
	State(state): State<AppState>,
	Path(id): Path<BotId>,
	request: Result<Json<AssignServerRequest>, JsonRejection>,
) -> ApiResult<SessionConfig> {
	let Json(request) = request?;
	let config = state.fleet.assign_server(id, request.server_id, request.apply_profile)?;
	Ok(Reply::data(config))
}

pub async fn assign_owner(
	State(state): State<AppState>,
	Path(id): Path<BotId>,
	request: Result<Json<AssignOwnerRequest>, JsonRejection>,
) -> ApiResult<SessionConfig> {
	let Json(request) = request?;
	Ok(Reply::data(state.fleet.assign_owner(id, request.owner)?))
}

pub async fn summary(State(state): State<AppState>) -> ApiResult<FleetSummary> {
	Ok(Reply::data(state.fleet.summary()?))
}

pub async fn get_settings(State(state): State<AppState>) -> Reply<GlobalSettings> {
	Reply::data(state.fleet.settings())
}

pub async fn update_settings(
	State(state): State<AppState>,
	patch: Result<Json<SettingsPatch>, JsonRejection>,
) -> ApiResult<GlobalSettings> {
	let Json(patch) = patch?;
	Ok(Reply::data(state.fleet.update_settings(patch)?))
}

pub async fn list_servers(State(state): State<AppState>) -> ApiResult<Vec<ServerProfile>> {
	Ok(Reply::data(state.fleet.servers()?))
}

pub async fn create_server(
	State(state): State<AppState>,
	input: Result<Json<NewServerProfile>, JsonRejection>,
) -> Result<(StatusCode, Reply<ServerProfile>), ApiError> {
	let Json(input) = input?;
	let profile = state.fleet.create_server(input)?;
	Ok((StatusCode::CREATED, Reply::data(profile).with_message("Server created")))
}

pub async fn update_server(
	State(state): State<AppState>,
	Path(id): Path<ServerId>,
	patch: Result<Json<ServerProfilePatch>, JsonRejection>,
) -> ApiResult<ServerProfile> {
	let Json(patch) = patch?;
	Ok(Reply::data(state.fleet.update_server(id, patch)?))
}

pub async fn delete_server(State(state): State<AppState>, Path(id): Path<ServerId>) -> ApiResult<()> {
	state.fleet.delete_server(id)?;
	Ok(Reply::ok("Server deleted"))
}
