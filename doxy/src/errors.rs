//! Error types for the deployment dispatcher

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::deploy::command::CommandFailure;

/// Main error type for doxy
#[derive(Error, Debug)]
pub enum DoxyError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0}")]
    CommandFailed(Box<CommandFailure>),

    #[error("No deployment prefix found.")]
    NoDeployment,

    #[error("Deployment {0} not found.")]
    UnknownDeployment(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DoxyError {
    /// HTTP status returned to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DoxyError::JsonError(_)
            | DoxyError::ValidationError(_)
            | DoxyError::NoDeployment
            | DoxyError::UnknownDeployment(_) => StatusCode::BAD_REQUEST,
            DoxyError::HttpError(_) | DoxyError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CommandFailure> for DoxyError {
    fn from(failure: CommandFailure) -> Self {
        DoxyError::CommandFailed(Box::new(failure))
    }
}

impl IntoResponse for DoxyError {
    fn into_response(self) -> Response {
        let body = match &self {
            DoxyError::CommandFailed(failure) => failure.report(),
            other => other.to_string(),
        };
        (self.status_code(), body).into_response()
    }
}
