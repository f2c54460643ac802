//! Horários de medicação e o registro de doses tomadas
//!
//! Marcar uma dose como tomada é o único ponto em que este módulo chama o
//! serviço de estoque: a dose registrada desconta `dose_quantity` do item
//! de estoque da medicação, quando ele existe.

use chrono::{NaiveDate, NaiveTime, Utc};
use common_db::error::DbError;
use common_db::models::MedicationSchedule;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{inventory, medications};

/// Resultado de marcar uma dose como tomada
#[derive(Debug, Serialize)]
pub struct DoseTakenOutcome {
    /// A dose foi registrada no histórico
    pub logged: bool,
    /// O estoque correspondente foi decrementado
    pub inventory_updated: bool,
}

/// Cria um horário de medicação
///
/// A medicação precisa existir e pertencer ao usuário.
pub async fn create_schedule(
    pool: &SqlitePool,
    user_id: i64,
    medication_id: Uuid,
    time_of_day: NaiveTime,
    dose_quantity: i64,
) -> Result<MedicationSchedule, DbError> {
    if medications::find_medication(pool, medication_id, user_id)
        .await?
        .is_none()
    {
        return Err(DbError::NotFound("Medicação não encontrada".to_string()));
    }

    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO medication_schedules
            (id, user_id, medication_id, time_of_day, dose_quantity, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(medication_id)
    .bind(time_of_day)
    .bind(dose_quantity)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(MedicationSchedule {
        id,
        user_id,
        medication_id,
        time_of_day,
        dose_quantity,
        is_active: true,
        created_at: now,
    })
}

/// Horários ativos do usuário
pub async fn list_schedules(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<MedicationSchedule>, DbError> {
    let schedules = sqlx::query_as::<_, MedicationSchedule>(
        "SELECT id, user_id, medication_id, time_of_day, dose_quantity, is_active, created_at
         FROM medication_schedules
         WHERE user_id = ? AND is_active = 1 ORDER BY time_of_day",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(schedules)
}

/// Marca a dose de um horário como tomada
///
/// Registra a dose no histórico e em seguida desconta o estoque. Usuário
/// sem item de estoque para a medicação ainda tem a dose registrada; nesse
/// caso `inventory_updated` volta `false`.
pub async fn mark_dose_taken(
    pool: &SqlitePool,
    schedule_id: Uuid,
    user_id: i64,
    taken_on: NaiveDate,
) -> Result<DoseTakenOutcome, DbError> {
    let schedule = sqlx::query_as::<_, MedicationSchedule>(
        "SELECT id, user_id, medication_id, time_of_day, dose_quantity, is_active, created_at
         FROM medication_schedules WHERE id = ? AND user_id = ? AND is_active = 1",
    )
    .bind(schedule_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(schedule) = schedule else {
        return Err(DbError::NotFound("Horário não encontrado".to_string()));
    };

    sqlx::query(
        "INSERT INTO schedule_logs (id, schedule_id, user_id, taken_on, taken_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(schedule.id)
    .bind(user_id)
    .bind(taken_on)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let inventory_updated = inventory::decrement_after_taken(
        pool,
        schedule.medication_id,
        user_id,
        schedule.dose_quantity,
    )
    .await?;

    Ok(DoseTakenOutcome {
        logged: true,
        inventory_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{self, NewInventoryItem};
    use crate::test_support::{seed_medication, setup};
    use anyhow::Result;

    fn eight_am() -> NaiveTime {
        NaiveTime::from_hms_opt(8, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 6).unwrap()
    }

    #[tokio::test]
    async fn test_taken_dose_decrements_inventory() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let medication = seed_medication(&pool, 1, "Levotiroxina").await?;
        let schedule = create_schedule(&pool, 1, medication, eight_am(), 2).await?;

        inventory::create_item(
            &pool,
            NewInventoryItem {
                user_id: 1,
                medication_id: Some(medication),
                medication_name: "Levotiroxina 75mcg".to_string(),
                current_stock: 10,
                low_stock_threshold: Some(3),
                unit: None,
                notes: None,
            },
        )
        .await?;

        let outcome = mark_dose_taken(&pool, schedule.id, 1, today()).await?;
        assert!(outcome.logged);
        assert!(outcome.inventory_updated);

        // Dose de 2 unidades: 10 - 2 = 8
        let items = inventory::list_items(&pool, 1).await?;
        assert_eq!(items[0].current_stock, 8);

        let logs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schedule_logs")
            .fetch_one(&pool)
            .await?;
        assert_eq!(logs, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_dose_without_inventory_is_still_logged() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let medication = seed_medication(&pool, 1, "Vitamina D").await?;
        let schedule = create_schedule(&pool, 1, medication, eight_am(), 1).await?;

        let outcome = mark_dose_taken(&pool, schedule.id, 1, today()).await?;
        assert!(outcome.logged);
        assert!(!outcome.inventory_updated);

        Ok(())
    }

    #[tokio::test]
    async fn test_schedule_requires_owned_medication() -> Result<()> {
        let (pool, _key, _guard) = setup().await?;
        let medication = seed_medication(&pool, 1, "Atenolol").await?;

        // Outro usuário não agenda medicação alheia
        let err = create_schedule(&pool, 2, medication, eight_am(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));

        // Nem um horário de quem não é dono marca dose
        let schedule = create_schedule(&pool, 1, medication, eight_am(), 1).await?;
        let err = mark_dose_taken(&pool, schedule.id, 2, today())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));

        Ok(())
    }
}
