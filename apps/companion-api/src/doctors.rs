//! Consulta a dados de médicos (referência, somente leitura)

use common_db::error::DbError;
use common_db::models::Doctor;
use sqlx::SqlitePool;
use uuid::Uuid;

const DOCTOR_COLUMNS: &str =
    "id, name, specialization, clinic, appointment_type_id, created_at";

/// Todos os médicos cadastrados, por nome
pub async fn list_doctors(pool: &SqlitePool) -> Result<Vec<Doctor>, DbError> {
    let doctors = sqlx::query_as::<_, Doctor>(&format!(
        "SELECT {} FROM doctors ORDER BY name",
        DOCTOR_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(doctors)
}

/// Busca um médico pelo id
pub async fn get_doctor(pool: &SqlitePool, doctor_id: Uuid) -> Result<Option<Doctor>, DbError> {
    let doctor = sqlx::query_as::<_, Doctor>(&format!(
        "SELECT {} FROM doctors WHERE id = ?",
        DOCTOR_COLUMNS
    ))
    .bind(doctor_id)
    .fetch_optional(pool)
    .await?;

    Ok(doctor)
}
