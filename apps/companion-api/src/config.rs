//! Configuração do serviço via variáveis de ambiente

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, Result};
use common_db::DbConfig;
use tracing::warn;

/// Frase usada quando `COMPANION_DB_KEY_PHRASE` não está definida.
/// Aceitável apenas em desenvolvimento.
const DEV_KEY_PHRASE: &str = "companion-dev-key";

/// Configuração do serviço
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Porta HTTP de escuta
    pub port: u16,
    /// Caminho do arquivo SQLite
    pub db_path: String,
    /// Número máximo de conexões no pool
    pub db_max_connections: u32,
    /// Frase da qual a chave de criptografia das notas é derivada
    pub key_phrase: String,
}

impl AppConfig {
    /// Carrega a configuração do ambiente, com padrões registrados em log
    pub fn load() -> Result<Self> {
        let key_phrase = match env::var("COMPANION_DB_KEY_PHRASE") {
            Ok(phrase) if !phrase.trim().is_empty() => phrase,
            _ => {
                warn!("COMPANION_DB_KEY_PHRASE não definida, usando chave de desenvolvimento");
                DEV_KEY_PHRASE.to_string()
            }
        };

        Ok(Self {
            port: env_or("COMPANION_PORT", 3000u16)?,
            db_path: env::var("COMPANION_DB_PATH")
                .unwrap_or_else(|_| "data/companion.db".to_string()),
            db_max_connections: env_or("COMPANION_DB_MAX_CONNECTIONS", 5u32)?,
            key_phrase,
        })
    }

    /// Configuração de banco derivada desta configuração
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            db_path: self.db_path.clone(),
            max_connections: self.db_max_connections,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Valor inválido para {}: {}", key, value)),
        Err(_) => {
            warn!("{} não definida, usando padrão: {}", key, default);
            Ok(default)
        }
    }
}
