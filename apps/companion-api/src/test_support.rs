//! Utilidades compartilhadas pelos testes do serviço

use anyhow::Result;
use chrono::Utc;
use common_db::crypto::EncryptionKey;
use common_db::{init_db_pool, DbConfig};
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

/// Banco temporário migrado + chave de testes
///
/// O `TempDir` devolvido precisa viver até o fim do teste; quando cai, o
/// arquivo do banco vai junto.
pub(crate) async fn setup() -> Result<(SqlitePool, EncryptionKey, TempDir)> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = temp_dir.path().join("test.db");

    let config = DbConfig {
        db_path: db_path.to_str().unwrap().to_string(),
        max_connections: 2,
    };

    let pool = init_db_pool(&config).await?;
    let key = EncryptionKey::from_phrase("frase-de-teste");

    Ok((pool, key, temp_dir))
}

pub(crate) async fn seed_doctor(pool: &SqlitePool, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO doctors (id, name, specialization, clinic, created_at)
         VALUES (?, ?, 'Clínica Geral', 'Unidade Centro', ?)",
    )
    .bind(id)
    .bind(name)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(id)
}

pub(crate) async fn seed_appointment_type(pool: &SqlitePool, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO appointment_types (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(id)
}

pub(crate) async fn seed_medication(pool: &SqlitePool, user_id: i64, name: &str) -> Result<Uuid> {
    let medication = crate::medications::create_medication(pool, user_id, name, None).await?;
    Ok(medication.id)
}
