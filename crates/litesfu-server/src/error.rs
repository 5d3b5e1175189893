use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use litesfu_protocol::{ErrorResponse, ProtocolError};
use thiserror::Error;

/// Message returned for every rejected signaling request
pub const INVALID_PAYLOAD: &str = "Invalid request payload";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("{context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: webrtc::Error,
    },
}

impl AppError {
    pub fn transport(context: &'static str, source: webrtc::Error) -> Self {
        AppError::Transport { context, source }
    }
}

impl From<ProtocolError> for AppError {
    fn from(e: ProtocolError) -> Self {
        tracing::debug!("Rejecting signaling request: {}", e);
        AppError::BadRequest(INVALID_PAYLOAD.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Transport { context, source } => {
                tracing::error!("{}: {}", context, source);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
