use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use thiserror::Error;

use crate::api::envelope::Envelope;
use crate::store::StoreError;

/// Every way a directory or vote request can be turned down.
///
/// The `Display` text is what the visitor sees in the envelope's `error`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Método no permitido.")]
    MethodNotAllowed,

    #[error("Error interno del servidor.")]
    Storage(#[from] StoreError),

    #[error("Error interno del servidor.")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_json() -> Self {
        AppError::Validation("Datos JSON inválidos.".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Storage(e) => error!("❌ Storage failure: {}", e),
            AppError::Internal(e) => error!("❌ Internal failure: {}", e),
            _ => {}
        }

        (self.status(), Envelope::<()>::failure(self.to_string())).into_response()
    }
}
