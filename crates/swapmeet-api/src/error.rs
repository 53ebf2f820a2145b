use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use swapmeet_chat::ChatError;
use swapmeet_types::api::{Envelope, ErrorBody, ErrorEnvelope};

/// A chat failure on its way out as an HTTP response.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub ChatError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(ChatError::InvalidArgument(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ChatError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Conflict(_) => StatusCode::CONFLICT,
            ChatError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(ChatError::Internal(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            // Store details stay in the log
            ChatError::Internal(e) => {
                error!("Internal error: {:#}", e);
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorEnvelope {
            ok: false,
            error: ErrorBody {
                kind: self.0.kind().to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Wraps a payload in the success envelope.
pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope::success(data))
}

/// Runs synchronous chat work off the async runtime.
pub async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, ChatError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError(ChatError::Internal(anyhow::anyhow!("worker task failed")))
        })?
        .map_err(ApiError)
}
