//! Estado compartilhado do serviço

use std::sync::Arc;

use anyhow::Result;
use common_db::crypto::EncryptionKey;
use sqlx::SqlitePool;

use crate::config::AppConfig;

/// Estado compartilhado entre todos os handlers
///
/// Nenhum estado mutável vive aqui: tudo que muda fica no banco. O pool e a
/// chave são somente leitura depois da inicialização.
pub struct AppState {
    pub pool: SqlitePool,
    pub key: EncryptionKey,
}

impl AppState {
    /// Inicializa pool, migrações e chave de criptografia
    pub async fn init(config: &AppConfig) -> Result<Arc<Self>> {
        let pool = common_db::init_db_pool(&config.db_config()).await?;
        let key = EncryptionKey::from_phrase(&config.key_phrase);

        Ok(Arc::new(Self { pool, key }))
    }
}
