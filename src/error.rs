//! Typed errors and HTTP mapping.

use crate::alert::Alert;
use crate::messages::Messages;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config bundle not found: {0}")]
    NotFound(String),
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Opening the database handle failed; carries the driver error text.
    #[error("database connection failed: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("database: {0}")]
    Query(#[from] sqlx::Error),
    #[error("statement parameter: {0}")]
    Parameter(String),
    #[error("password hash: {0}")]
    Password(String),
}

impl AppError {
    /// Catalog key for the user-facing message that matches this error.
    pub fn message_key(&self) -> &'static str {
        match self {
            AppError::Config(_) => "error",
            AppError::Connection(_) => "db_connection_error",
            AppError::Query(_) | AppError::Parameter(_) => "db_query_error",
            AppError::Password(_) => "error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(error = %self, "request failed");
        let body = Alert::error(Messages::get(self.message_key()));
        (status, Html(body)).into_response()
    }
}
