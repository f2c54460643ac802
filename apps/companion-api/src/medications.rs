//! Medicações acompanhadas pelo usuário

use chrono::Utc;
use common_db::error::DbError;
use common_db::models::Medication;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Registra uma medicação para acompanhamento
pub async fn create_medication(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    dosage: Option<&str>,
) -> Result<Medication, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO medications (id, user_id, name, dosage, is_active, created_at)
         VALUES (?, ?, ?, ?, 1, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(dosage)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Medication {
        id,
        user_id,
        name: name.to_string(),
        dosage: dosage.map(|d| d.to_string()),
        is_active: true,
        created_at: now,
    })
}

/// Medicações ativas do usuário
pub async fn list_medications(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<Medication>, DbError> {
    let medications = sqlx::query_as::<_, Medication>(
        "SELECT id, user_id, name, dosage, is_active, created_at
         FROM medications WHERE user_id = ? AND is_active = 1 ORDER BY name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(medications)
}

/// Busca uma medicação ativa do usuário
pub async fn find_medication(
    pool: &SqlitePool,
    medication_id: Uuid,
    user_id: i64,
) -> Result<Option<Medication>, DbError> {
    let medication = sqlx::query_as::<_, Medication>(
        "SELECT id, user_id, name, dosage, is_active, created_at
         FROM medications WHERE id = ? AND user_id = ? AND is_active = 1",
    )
    .bind(medication_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(medication)
}
