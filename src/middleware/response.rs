use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{default_message, response_type, ApiError, ErrorResponse};

/// Successful response wrapped in the `{message, responseType, status, ...}` envelope.
///
/// `data` must serialize to an object; its fields sit beside the envelope keys.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: Option<String>,
    pub status_code: Option<StatusCode>,
    /// Status reported in the body when it differs from the HTTP status
    pub body_status: Option<u16>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
            status_code: None,
            body_status: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::success(data)
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// HTTP 200 whose body reports `status` instead. Used for "nothing changed",
    /// since a real 304 cannot carry a body.
    pub fn reporting(mut self, status: u16) -> Self {
        self.body_status = Some(status);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);
        let reported = self.body_status.unwrap_or(status.as_u16());

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return ApiError::internal_server_error(default_message(500)).into_response();
            }
        };

        let mut envelope = match data_value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        let message = self
            .message
            .unwrap_or_else(|| default_message(reported).to_string());
        envelope.insert("message".to_string(), json!(message));
        envelope.insert(
            "responseType".to_string(),
            json!(if self.body_status.is_some() { "Info" } else { response_type(reported) }),
        );
        envelope.insert("status".to_string(), json!(reported));

        (status, Json(Value::Object(envelope))).into_response()
    }
}

// Convenience type aliases
pub type ApiResult<T> = Result<ApiResponse<T>, ErrorResponse>;
