//! Erros da camada de API e seu mapeamento para respostas HTTP

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common_db::error::DbError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Não autenticado")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Não autenticado".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Database(db) => match db {
                DbError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                DbError::Conflict(msg) => (StatusCode::CONFLICT, msg),
                other => {
                    // Detalhes de armazenamento não vazam para o cliente
                    error!("Erro de banco de dados: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Falha ao processar a operação".to_string(),
                    )
                }
            },
            ApiError::Internal(err) => {
                error!("Erro interno: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Falha ao processar a operação".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
