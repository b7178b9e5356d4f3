// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::filter::FilterError;
use crate::params::{DebugMode, ParamError};
use crate::services::ServiceError;
use crate::tree::TreeError;

pub const DEBUG_TYPE_WARNING: &str = "Debugging info is turned off, because incorrect type of value \
     of parameter 'dbg' (should be boolean)";

/// HTTP API error with the status and client-facing message of the envelope
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError(String),

    /// Any of the above together with its underlying cause, revealed only on `dbg=true`
    Traced { error: Box<ApiError>, cause: String },
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError(_) => 500,
            ApiError::Traced { error, .. } => error.status_code(),
        }
    }

    /// Client-safe message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::Traced { error, .. } => error.message(),
        }
    }

    /// What `debugInfo` shows when debugging is on
    pub fn debug_info(&self) -> String {
        match self {
            ApiError::Traced { cause, .. } => cause.clone(),
            other => other.message().to_string(),
        }
    }

    pub fn to_json(&self, debug: DebugMode) -> Value {
        let status = self.status_code();
        let mut body = json!({
            "message": self.message(),
            "responseType": response_type(status),
            "status": status,
        });
        match debug.resolved() {
            DebugMode::On => body["debugInfo"] = json!(self.debug_info()),
            DebugMode::Invalid => body["debugInfo"] = json!(DEBUG_TYPE_WARNING),
            DebugMode::Off | DebugMode::Default => {}
        }
        body
    }

    /// Pairs the error with the request's `dbg` outcome
    pub fn with_debug(self, debug: DebugMode) -> ErrorResponse {
        ErrorResponse { error: self, debug }
    }

    fn traced(self, cause: impl Into<String>) -> Self {
        ApiError::Traced {
            error: Box::new(self),
            cause: cause.into(),
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

/// Legacy `responseType` for a status code
pub fn response_type(status: u16) -> &'static str {
    match status {
        200 | 201 => "Success",
        304 => "Warning",
        400 | 401 | 403 | 404 | 500 => "Error",
        _ => "Info",
    }
}

/// Default message for a status code when none is given
pub fn default_message(status: u16) -> &'static str {
    match status {
        200 => "OK!",
        201 => "Created!",
        304 => "Not modified!",
        400 => "Bad request!",
        403 => "Forbidden",
        404 => "Not found!",
        _ => "Internal server error!",
    }
}

impl From<ParamError> for ApiError {
    fn from(err: ParamError) -> Self {
        ApiError::bad_request(err.to_string()).traced(format!("{:?}", err))
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::bad_request(err.to_string()).traced(format!("{:?}", err))
    }
}

impl From<TreeError> for ApiError {
    fn from(err: TreeError) -> Self {
        let cause = format!("{:?}", err);
        let error = match &err {
            TreeError::NodeNotFound(_) | TreeError::ParentNotFound(_) | TreeError::TargetNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            TreeError::RootProtected { .. } | TreeError::Forbidden { .. } => ApiError::forbidden(err.to_string()),
            TreeError::InvalidParent { .. }
            | TreeError::InvalidTarget { .. }
            | TreeError::NoOp { .. }
            | TreeError::LeafWithChildren { .. } => ApiError::bad_request(err.to_string()),
            TreeError::MissingRoot | TreeError::Invariant(_) => {
                tracing::error!("Structure is inconsistent: {}", err);
                ApiError::internal_server_error(default_message(500))
            }
            TreeError::Database(db_err) => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", db_err);
                ApiError::internal_server_error(default_message(500))
            }
        };
        error.traced(cause)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Param(e) => e.into(),
            ServiceError::Filter(e) => e.into(),
            ServiceError::Tree(e) => e.into(),
            other => ApiError::bad_request(other.to_string()).traced(format!("{:?}", other)),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

/// An error ready to be rendered, with the request's debugging choice
#[derive(Debug)]
pub struct ErrorResponse {
    error: ApiError,
    debug: DebugMode,
}

impl From<ApiError> for ErrorResponse {
    fn from(error: ApiError) -> Self {
        ErrorResponse {
            error,
            debug: DebugMode::Default,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.error.to_json(self.debug))).into_response()
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        ErrorResponse::from(self).into_response()
    }
}
