//! Identidade autenticada do requisitante
//!
//! A verificação do token acontece fora deste serviço: um middleware de
//! autenticação (pacote externo) valida a credencial e insere o [`AuthUser`]
//! nas extensões da requisição. Aqui apenas o extraímos; requisições sem
//! identidade recebem 401.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

use crate::error::ApiError;

/// Identidade já verificada do usuário que fez a requisição
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AuthUser {
    pub user_id: i64,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(ApiError::Unauthorized)
    }
}
