use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// A calendar provider call failed. The message is fixed per operation
    /// and never carries the underlying cause.
    #[error("{0}")]
    #[diagnostic(code(calchat::provider))]
    Provider(String),

    #[error("Unsupported provider: {0}")]
    #[diagnostic(code(calchat::unsupported_provider))]
    UnsupportedProvider(String),

    /// Missing or unusable OpenRouter API key
    #[error("{0}")]
    #[diagnostic(code(calchat::credential))]
    Credential(String),

    #[error("Tool execution failed: {0}")]
    #[diagnostic(code(calchat::tool_execution))]
    ToolExecution(String),

    #[error("Not authenticated")]
    #[diagnostic(code(calchat::unauthenticated))]
    Unauthenticated,

    #[error("LLM error: {0}")]
    #[diagnostic(code(calchat::llm))]
    Llm(String),

    #[error("Store error: {0}")]
    #[diagnostic(code(calchat::store))]
    Store(String),

    #[error("Session error: {0}")]
    #[diagnostic(code(calchat::session))]
    Session(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calchat::config))]
    Config(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(calchat::environment))]
    Environment(String),

    #[error("Bad request: {0}")]
    #[diagnostic(code(calchat::bad_request))]
    BadRequest(String),

    #[error(transparent)]
    #[diagnostic(code(calchat::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calchat::serialization))]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Session(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

impl Error {
    /// Status code and stable error code used in JSON error bodies
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Error::Credential(_) => (StatusCode::FORBIDDEN, "api_key_required"),
            Error::UnsupportedProvider(_) => (StatusCode::BAD_REQUEST, "unsupported_provider"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::Provider(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let message = match &self {
            Error::Unauthenticated
            | Error::Credential(_)
            | Error::UnsupportedProvider(_)
            | Error::BadRequest(_)
            | Error::Provider(_) => self.to_string(),
            other => {
                error!("Request failed: {:?}", other);
                "Something went wrong. Please try again.".to_string()
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create provider errors
pub fn provider_error(message: &str) -> Error {
    Error::Provider(message.to_string())
}

/// Helper to create credential errors
pub fn credential_error(message: &str) -> Error {
    Error::Credential(message.to_string())
}

/// Helper to create LLM errors
pub fn llm_error(message: &str) -> Error {
    Error::Llm(message.to_string())
}

/// Helper to create bad request errors
pub fn bad_request(message: &str) -> Error {
    Error::BadRequest(message.to_string())
}
