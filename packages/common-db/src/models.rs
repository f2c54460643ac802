//! Modelos de dados compartilhados entre aplicações
//!
//! Este módulo define as estruturas de dados principais usadas pelo
//! backend do aplicativo companheiro de saúde

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::str::FromStr;
use uuid::Uuid;

fn column_decode_error(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: String::from(column),
        source: Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Valor inválido para {}: {}", column, value),
        )),
    }
}

/// Status possíveis de um agendamento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Agendamento ativo, horário reservado
    Scheduled,
    /// Consulta concluída
    Completed,
    /// Cancelado pelo usuário (o registro segue ocupando o horário)
    Canceled,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "canceled" => Ok(AppointmentStatus::Canceled),
            other => Err(format!("Status de agendamento inválido: {}", other)),
        }
    }
}

/// Nível de acesso de um familiar vinculado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Pode gerenciar dados do usuário vinculado
    Manage,
    /// Pode apenas visualizar
    View,
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevel::Manage => write!(f, "manage"),
            AccessLevel::View => write!(f, "view"),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manage" => Ok(AccessLevel::Manage),
            "view" => Ok(AccessLevel::View),
            other => Err(format!("Nível de acesso inválido: {}", other)),
        }
    }
}

/// Representa um agendamento de consulta
///
/// As notas clínicas ficam em colunas cifradas na tabela e são expostas
/// apenas pela visão detalhada ([`AppointmentDetails`]), já descriptografadas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    /// Identificador único da consulta
    pub id: Uuid,
    /// Identificador do usuário dono do agendamento
    pub user_id: i64,
    /// Médico da consulta
    pub doctor_id: Uuid,
    /// Tipo de consulta (primeira vez, retorno, etc.)
    pub appointment_type_id: Option<Uuid>,
    /// Data agendada
    pub appointment_date: NaiveDate,
    /// Horário agendado (precisão de minuto)
    pub appointment_time: NaiveTime,
    /// Status atual
    pub status: AppointmentStatus,
    /// Data e hora de criação do registro
    pub created_at: DateTime<Utc>,
    /// Data e hora da última atualização
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Appointment {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            doctor_id: row.try_get("doctor_id")?,
            appointment_type_id: row.try_get("appointment_type_id")?,
            appointment_date: row.try_get("appointment_date")?,
            appointment_time: row.try_get("appointment_time")?,
            status: AppointmentStatus::from_str(&status)
                .map_err(|_| column_decode_error("status", &status))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Visão detalhada de um agendamento para uso em APIs
///
/// Junta o nome do médico e do tipo de consulta e carrega as notas já
/// descriptografadas. Montada pela camada de acesso a dados.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub id: Uuid,
    pub user_id: i64,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    /// Notas clínicas descriptografadas
    pub notes: Option<String>,
    pub doctor_name: String,
    pub specialization: String,
    pub clinic: Option<String>,
    pub appointment_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Médico (entidade de referência, somente leitura)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub clinic: Option<String>,
    pub appointment_type_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Medicação acompanhada pelo usuário
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub dosage: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Horário programado de uma medicação
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MedicationSchedule {
    pub id: Uuid,
    pub user_id: i64,
    pub medication_id: Uuid,
    pub time_of_day: NaiveTime,
    /// Quantidade descontada do estoque a cada dose tomada
    pub dose_quantity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Item de estoque de medicação de um usuário
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub user_id: i64,
    pub medication_id: Option<Uuid>,
    pub medication_name: String,
    pub current_stock: i64,
    pub low_stock_threshold: i64,
    pub unit: String,
    pub notes: Option<String>,
    pub last_updated: DateTime<Utc>,
    /// Desativado em vez de removido, para preservar o histórico de notificações
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Notificação gerada quando o estoque cruza o limite mínimo
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InventoryNotification {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub user_id: i64,
    /// Preenchido na cópia enviada a um familiar vinculado
    pub family_member_id: Option<i64>,
    pub notification_type: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Vínculo de um familiar/cuidador com o usuário
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyMember {
    pub id: Uuid,
    pub user_id: i64,
    pub member_user_id: i64,
    pub member_name: String,
    pub access_level: AccessLevel,
    pub created_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for FamilyMember {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        let access_level: String = row.try_get("access_level")?;
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            member_user_id: row.try_get("member_user_id")?,
            member_name: row.try_get("member_name")?,
            access_level: AccessLevel::from_str(&access_level)
                .map_err(|_| column_decode_error("access_level", &access_level))?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Completed,
            AppointmentStatus::Canceled,
        ] {
            let parsed = AppointmentStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }

        assert!(AppointmentStatus::from_str("no_show").is_err());
    }

    #[test]
    fn test_access_level_round_trip() {
        for level in [AccessLevel::Manage, AccessLevel::View] {
            let parsed = AccessLevel::from_str(&level.to_string()).unwrap();
            assert_eq!(parsed, level);
        }

        assert!(AccessLevel::from_str("admin").is_err());
    }
}
