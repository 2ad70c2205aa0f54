//! Reply envelope shared by every control route.

use afk_runtime::FleetError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// `{success, message?, data?}`
#[derive(Debug, Serialize)]
pub struct Reply<T> {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
}

impl<T: Serialize> Reply<T> {
	pub fn data(data: T) -> Self {
		Self {
			success: true,
			message: None,
			data: Some(data),
		}
	}

	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());
		self
	}
}

impl Reply<()> {
	pub fn ok(message: impl Into<String>) -> Self {
		Self {
			success: true,
			message: Some(message.into()),
			data: None,
		}
	}
}

impl<T: Serialize> IntoResponse for Reply<T> {
	fn into_response(self) -> Response {
		Json(self).into_response()
	}
}

#[derive(Debug, Error)]
pub enum ApiError {
	#[error(transparent)]
	Fleet(#[from] FleetError),

	#[error("{0}")]
	BadRequest(String),

	/// The request is valid but the bot is in the wrong state for it.
	#[error("{0}")]
	Conflict(String),
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		ApiError::BadRequest(rejection.body_text())
	}
}

impl ApiError {
	fn status(&self) -> StatusCode {
		match self {
			ApiError::Fleet(FleetError::NotFound(_) | FleetError::ServerNotFound(_)) => StatusCode::NOT_FOUND,
			ApiError::Fleet(FleetError::Validation(_)) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::Fleet(FleetError::ProfileFull { .. }) | ApiError::Conflict(_) => StatusCode::CONFLICT,
			ApiError::Fleet(FleetError::Persistence(_)) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		let message = match &self {
			ApiError::Fleet(FleetError::Persistence(source)) => {
				error!(target = "afk.server", error = %source, "persistence failure");
				format!("{self}: {source}")
			}
			_ => self.to_string(),
		};
		let body = Reply::<()> {
			success: false,
			message: Some(message),
			data: None,
		};
		(status, Json(body)).into_response()
	}
}
