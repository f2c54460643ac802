//! Acesso a dados e regras de agendamento de consultas
//!
//! A regra central: nenhum médico tem dois agendamentos no mesmo par
//! data/horário. A verificação de horários ocupados e a escrita rodam na
//! mesma transação, e o índice único de `appointments` cobre a janela entre
//! requisições concorrentes; a violação chega aqui como [`DbError::Conflict`].

use chrono::{NaiveDate, NaiveTime, Utc};
use common_db::crypto::{self, EncryptedData, EncryptionKey};
use common_db::error::DbError;
use common_db::models::{Appointment, AppointmentDetails, AppointmentStatus};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

/// Mensagem exibida quando o horário solicitado já está ocupado
pub const SLOT_TAKEN: &str = "Este horário já está reservado.";

/// Dados para criação de um agendamento
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub user_id: i64,
    pub doctor_id: Uuid,
    pub appointment_type_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub notes: Option<String>,
}

/// Alterações aplicáveis a um agendamento existente
#[derive(Debug, Clone)]
pub struct AppointmentChange {
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub notes: Option<String>,
}

/// Resultado de uma atualização
///
/// `warning` é preenchido quando a atualização foi gravada mas a releitura
/// detalhada não retornou linha (inconsistência de junção). A operação não
/// falha nesse caso: a escrita já foi confirmada.
#[derive(Debug, Serialize)]
pub struct UpdatedAppointment {
    pub appointment: Option<AppointmentDetails>,
    pub warning: Option<String>,
}

fn encrypt_notes(
    notes: Option<&str>,
    key: &EncryptionKey,
) -> Result<(Option<Vec<u8>>, Option<Vec<u8>>), DbError> {
    match notes {
        Some(text) => {
            let encrypted = crypto::encrypt(text.as_bytes(), key)
                .map_err(|e| DbError::CryptoError(e.to_string()))?;
            Ok((Some(encrypted.ciphertext), Some(encrypted.nonce)))
        }
        None => Ok((None, None)),
    }
}

fn decrypt_notes(
    ciphertext: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
    key: &EncryptionKey,
) -> Result<Option<String>, DbError> {
    match (ciphertext, nonce) {
        (Some(ciphertext), Some(nonce)) => {
            let plaintext = crypto::decrypt(&EncryptedData { ciphertext, nonce }, key)
                .map_err(|e| DbError::CryptoError(e.to_string()))?;
            let text = String::from_utf8(plaintext)
                .map_err(|e| DbError::CryptoError(e.to_string()))?;
            Ok(Some(text))
        }
        _ => Ok(None),
    }
}

/// Reserva um horário com um médico
///
/// Falha com [`DbError::Conflict`] quando o horário já está ocupado, sem
/// gravar nada.
pub async fn book(
    pool: &SqlitePool,
    key: &EncryptionKey,
    new: NewAppointment,
) -> Result<Appointment, DbError> {
    let mut tx = pool.begin().await?;

    // Horários já reservados deste médico na data solicitada
    let booked: Vec<NaiveTime> = sqlx::query_scalar(
        "SELECT appointment_time FROM appointments
         WHERE doctor_id = ? AND appointment_date = ?",
    )
    .bind(new.doctor_id)
    .bind(new.appointment_date)
    .fetch_all(&mut *tx)
    .await?;

    if booked.contains(&new.appointment_time) {
        return Err(DbError::Conflict(SLOT_TAKEN.to_string()));
    }

    let (notes_ciphertext, notes_nonce) = encrypt_notes(new.notes.as_deref(), key)?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let status = AppointmentStatus::Scheduled;

    sqlx::query(
        "INSERT INTO appointments
            (id, user_id, doctor_id, appointment_type_id, appointment_date,
             appointment_time, notes_ciphertext, notes_nonce, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(new.user_id)
    .bind(new.doctor_id)
    .bind(new.appointment_type_id)
    .bind(new.appointment_date)
    .bind(new.appointment_time)
    .bind(&notes_ciphertext)
    .bind(&notes_nonce)
    .bind(status.to_string())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Appointment {
        id,
        user_id: new.user_id,
        doctor_id: new.doctor_id,
        appointment_type_id: new.appointment_type_id,
        appointment_date: new.appointment_date,
        appointment_time: new.appointment_time,
        status,
        created_at: now,
        updated_at: now,
    })
}

/// Atualiza data, horário e notas de um agendamento existente
///
/// O novo horário é verificado contra os demais agendamentos do mesmo
/// médico; o próprio registro (`id <> ?`) não conta como conflito. A
/// verificação de propriedade do registro é responsabilidade do handler.
pub async fn update(
    pool: &SqlitePool,
    key: &EncryptionKey,
    appointment_id: Uuid,
    change: AppointmentChange,
) -> Result<UpdatedAppointment, DbError> {
    let mut tx = pool.begin().await?;

    let doctor_id: Option<Uuid> =
        sqlx::query_scalar("SELECT doctor_id FROM appointments WHERE id = ?")
            .bind(appointment_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some(doctor_id) = doctor_id else {
        return Err(DbError::NotFound("Consulta não encontrada".to_string()));
    };

    // Outro agendamento deste médico já ocupa o novo horário?
    let occupied: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM appointments
         WHERE doctor_id = ? AND appointment_date = ? AND appointment_time = ? AND id <> ?",
    )
    .bind(doctor_id)
    .bind(change.appointment_date)
    .bind(change.appointment_time)
    .bind(appointment_id)
    .fetch_one(&mut *tx)
    .await?;

    if occupied > 0 {
        return Err(DbError::Conflict(SLOT_TAKEN.to_string()));
    }

    let (notes_ciphertext, notes_nonce) = encrypt_notes(change.notes.as_deref(), key)?;

    sqlx::query(
        "UPDATE appointments
         SET appointment_date = ?, appointment_time = ?,
             notes_ciphertext = ?, notes_nonce = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(change.appointment_date)
    .bind(change.appointment_time)
    .bind(&notes_ciphertext)
    .bind(&notes_nonce)
    .bind(Utc::now())
    .bind(appointment_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    // Releitura com os dados do médico e do tipo para devolver ao cliente
    match get(pool, key, appointment_id).await? {
        Some(details) => Ok(UpdatedAppointment {
            appointment: Some(details),
            warning: None,
        }),
        None => Ok(UpdatedAppointment {
            appointment: None,
            warning: Some(
                "Agendamento atualizado, mas os dados completos não puderam ser recuperados"
                    .to_string(),
            ),
        }),
    }
}

/// Remove um agendamento, liberando o horário
pub async fn delete(pool: &SqlitePool, appointment_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM appointments WHERE id = ?")
        .bind(appointment_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound("Consulta não encontrada".to_string()));
    }

    Ok(())
}

/// Busca o registro cru de um agendamento (sem junções nem notas)
pub async fn find(
    pool: &SqlitePool,
    appointment_id: Uuid,
) -> Result<Option<Appointment>, DbError> {
    let appointment = sqlx::query_as::<_, Appointment>(
        "SELECT id, user_id, doctor_id, appointment_type_id, appointment_date,
                appointment_time, status, created_at, updated_at
         FROM appointments WHERE id = ?",
    )
    .bind(appointment_id)
    .fetch_optional(pool)
    .await?;

    Ok(appointment)
}

const DETAILS_QUERY: &str = "
    SELECT a.id, a.user_id, a.appointment_date, a.appointment_time, a.status,
           a.notes_ciphertext, a.notes_nonce, a.created_at, a.updated_at,
           d.name AS doctor_name, d.specialization, d.clinic,
           t.name AS appointment_type
    FROM appointments a
    JOIN doctors d ON d.id = a.doctor_id
    LEFT JOIN appointment_types t ON t.id = a.appointment_type_id";

fn details_from_row(
    row: &sqlx::sqlite::SqliteRow,
    key: &EncryptionKey,
) -> Result<AppointmentDetails, DbError> {
    let status: String = row.try_get("status")?;
    let notes = decrypt_notes(
        row.try_get("notes_ciphertext")?,
        row.try_get("notes_nonce")?,
        key,
    )?;

    Ok(AppointmentDetails {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        appointment_date: row.try_get("appointment_date")?,
        appointment_time: row.try_get("appointment_time")?,
        status: AppointmentStatus::from_str(&status)
            .map_err(DbError::InternalError)?,
        notes,
        doctor_name: row.try_get("doctor_name")?,
        specialization: row.try_get("specialization")?,
        clinic: row.try_get("clinic")?,
        appointment_type: row.try_get("appointment_type")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Visão detalhada de um agendamento, com notas descriptografadas
pub async fn get(
    pool: &SqlitePool,
    key: &EncryptionKey,
    appointment_id: Uuid,
) -> Result<Option<AppointmentDetails>, DbError> {
    let row = sqlx::query(&format!("{} WHERE a.id = ?", DETAILS_QUERY))
        .bind(appointment_id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| details_from_row(&row, key)).transpose()
}

/// Agendamentos de um usuário, ordenados por data e horário
pub async fn list_for_user(
    pool: &SqlitePool,
    key: &EncryptionKey,
    user_id: i64,
) -> Result<Vec<AppointmentDetails>, DbError> {
    let rows = sqlx::query(&format!(
        "{} WHERE a.user_id = ? ORDER BY a.appointment_date, a.appointment_time",
        DETAILS_QUERY
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(|row| details_from_row(row, key)).collect()
}
