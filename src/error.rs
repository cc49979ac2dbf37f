use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use sea_orm::DbErr;
use thiserror::Error;
use tracing::error;

/// An error from a request handler.
#[derive(Error, Debug)]
pub enum AppError {
    /// The requested record does not exist
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The request body could not be read
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("media storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Db(_) | Self::Template(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{self}");
        }
        let reason = status.canonical_reason().unwrap_or("Error");

        (
            status,
            Html(format!(
                "<!doctype html><title>{code} {reason}</title><h1>{code} {reason}</h1>",
                code = status.as_u16()
            )),
        )
            .into_response()
    }
}
