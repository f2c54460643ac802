//! Handlers HTTP do serviço
//!
//! Cada handler valida o corpo recebido, confere a propriedade do recurso
//! e delega para o módulo da entidade. Recursos de outros usuários
//! respondem 404, sem revelar que existem.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use common_db::models::{
    AccessLevel, Appointment, AppointmentDetails, Doctor, FamilyMember, InventoryItem,
    InventoryNotification, Medication, MedicationSchedule,
};

use crate::appointments::{self, AppointmentChange, NewAppointment, UpdatedAppointment};
use crate::auth::AuthUser;
use crate::doctors;
use crate::error::ApiError;
use crate::family;
use crate::inventory::{self, InventoryUpdate, NewInventoryItem};
use crate::medications;
use crate::schedules::{self, DoseTakenOutcome};
use crate::state::AppState;

fn validate_time_hhmm(value: &str) -> Result<(), ValidationError> {
    if NaiveTime::parse_from_str(value, "%H:%M").is_err() {
        return Err(ValidationError::new("hora_invalida"));
    }
    Ok(())
}

fn parse_time(value: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ApiError::Validation("Horário inválido, use o formato HH:mm".to_string()))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Agendamentos
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_type_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    #[validate(custom = "validate_time_hhmm")]
    pub appointment_time: String,
    #[validate(length(max = 500, message = "notas devem ter no máximo 500 caracteres"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAppointmentRequest {
    pub appointment_date: NaiveDate,
    #[validate(custom = "validate_time_hhmm")]
    pub appointment_time: String,
    #[validate(length(max = 500, message = "notas devem ter no máximo 500 caracteres"))]
    pub notes: Option<String>,
}

pub async fn book_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    request.validate()?;
    let appointment_time = parse_time(&request.appointment_time)?;

    let appointment = appointments::book(
        &state.pool,
        &state.key,
        NewAppointment {
            user_id: user.user_id,
            doctor_id: request.doctor_id,
            appointment_type_id: request.appointment_type_id,
            appointment_date: request.appointment_date,
            appointment_time,
            notes: request.notes,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<AppointmentDetails>>, ApiError> {
    let listed = appointments::list_for_user(&state.pool, &state.key, user.user_id).await?;
    Ok(Json(listed))
}

async fn owned_appointment(
    state: &AppState,
    user: AuthUser,
    appointment_id: Uuid,
) -> Result<Appointment, ApiError> {
    let appointment = appointments::find(&state.pool, appointment_id).await?;
    match appointment {
        Some(appointment) if appointment.user_id == user.user_id => Ok(appointment),
        _ => Err(ApiError::NotFound("Consulta não encontrada".to_string())),
    }
}

pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentDetails>, ApiError> {
    owned_appointment(&state, user, appointment_id).await?;

    let details = appointments::get(&state.pool, &state.key, appointment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Consulta não encontrada".to_string()))?;

    Ok(Json(details))
}

pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<UpdatedAppointment>, ApiError> {
    request.validate()?;
    let appointment_time = parse_time(&request.appointment_time)?;

    owned_appointment(&state, user, appointment_id).await?;

    let updated = appointments::update(
        &state.pool,
        &state.key,
        appointment_id,
        AppointmentChange {
            appointment_date: request.appointment_date,
            appointment_time,
            notes: request.notes,
        },
    )
    .await?;

    Ok(Json(updated))
}

pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    owned_appointment(&state, user, appointment_id).await?;
    appointments::delete(&state.pool, appointment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Médicos
// ---------------------------------------------------------------------------

pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    Ok(Json(doctors::list_doctors(&state.pool).await?))
}

pub async fn get_doctor(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Doctor>, ApiError> {
    let doctor = doctors::get_doctor(&state.pool, doctor_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Médico não encontrado".to_string()))?;

    Ok(Json(doctor))
}

// ---------------------------------------------------------------------------
// Medicações e horários
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMedicationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub dosage: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateScheduleRequest {
    pub medication_id: Uuid,
    #[validate(custom = "validate_time_hhmm")]
    pub time_of_day: String,
    #[validate(range(min = 1))]
    pub dose_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MarkDoseTakenRequest {
    /// Data da dose; quando ausente, a data corrente
    pub taken_on: Option<NaiveDate>,
}

pub async fn create_medication(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateMedicationRequest>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    request.validate()?;

    let medication = medications::create_medication(
        &state.pool,
        user.user_id,
        &request.name,
        request.dosage.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(medication)))
}

pub async fn list_medications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Medication>>, ApiError> {
    Ok(Json(
        medications::list_medications(&state.pool, user.user_id).await?,
    ))
}

pub async fn create_schedule(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<MedicationSchedule>), ApiError> {
    request.validate()?;
    let time_of_day = parse_time(&request.time_of_day)?;

    let schedule = schedules::create_schedule(
        &state.pool,
        user.user_id,
        request.medication_id,
        time_of_day,
        request.dose_quantity.unwrap_or(1),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn list_schedules(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<MedicationSchedule>>, ApiError> {
    Ok(Json(
        schedules::list_schedules(&state.pool, user.user_id).await?,
    ))
}

pub async fn mark_dose_taken(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<MarkDoseTakenRequest>,
) -> Result<Json<DoseTakenOutcome>, ApiError> {
    let taken_on = request.taken_on.unwrap_or_else(|| Utc::now().date_naive());

    let outcome =
        schedules::mark_dose_taken(&state.pool, schedule_id, user.user_id, taken_on).await?;

    Ok(Json(outcome))
}

// ---------------------------------------------------------------------------
// Estoque
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInventoryRequest {
    pub medication_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub medication_name: String,
    #[validate(range(min = 0))]
    pub current_stock: i64,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i64>,
    #[validate(length(max = 50))]
    pub unit: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInventoryRequest {
    #[validate(length(min = 1, max = 200))]
    pub medication_name: Option<String>,
    #[validate(range(min = 0))]
    pub current_stock: Option<i64>,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i64>,
    #[validate(length(max = 50))]
    pub unit: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuantityRequest {
    #[validate(range(min = 1))]
    pub quantity: i64,
}

pub async fn create_inventory_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<CreateInventoryRequest>,
) -> Result<(StatusCode, Json<InventoryItem>), ApiError> {
    request.validate()?;

    let item = inventory::create_item(
        &state.pool,
        NewInventoryItem {
            user_id: user.user_id,
            medication_id: request.medication_id,
            medication_name: request.medication_name,
            current_stock: request.current_stock,
            low_stock_threshold: request.low_stock_threshold,
            unit: request.unit,
            notes: request.notes,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_inventory(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    Ok(Json(inventory::list_items(&state.pool, user.user_id).await?))
}

pub async fn update_inventory_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(inventory_id): Path<Uuid>,
    Json(request): Json<UpdateInventoryRequest>,
) -> Result<Json<InventoryItem>, ApiError> {
    request.validate()?;

    let updated = inventory::apply_manual_update(
        &state.pool,
        inventory_id,
        user.user_id,
        InventoryUpdate {
            medication_name: request.medication_name,
            current_stock: request.current_stock,
            low_stock_threshold: request.low_stock_threshold,
            unit: request.unit,
            notes: request.notes,
        },
    )
    .await?;

    if !updated {
        return Err(ApiError::NotFound(
            "Item de estoque não encontrado".to_string(),
        ));
    }

    let item = inventory::get_item(&state.pool, inventory_id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Item de estoque não encontrado".to_string()))?;

    Ok(Json(item))
}

/// Retirada: o handler lê o estoque atual, calcula o valor final e grava
pub async fn take_from_inventory(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(inventory_id): Path<Uuid>,
    Json(request): Json<QuantityRequest>,
) -> Result<Json<InventoryItem>, ApiError> {
    request.validate()?;

    let item = inventory::get_item(&state.pool, inventory_id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Item de estoque não encontrado".to_string()))?;

    if request.quantity > item.current_stock {
        return Err(ApiError::Validation(
            "Estoque insuficiente para a quantidade solicitada".to_string(),
        ));
    }

    adjust_stock(&state, user, inventory_id, item.current_stock - request.quantity).await
}

/// Reposição: soma a quantidade recebida ao estoque atual
pub async fn restock_inventory(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(inventory_id): Path<Uuid>,
    Json(request): Json<QuantityRequest>,
) -> Result<Json<InventoryItem>, ApiError> {
    request.validate()?;

    let item = inventory::get_item(&state.pool, inventory_id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Item de estoque não encontrado".to_string()))?;

    adjust_stock(&state, user, inventory_id, item.current_stock + request.quantity).await
}

async fn adjust_stock(
    state: &AppState,
    user: AuthUser,
    inventory_id: Uuid,
    new_stock: i64,
) -> Result<Json<InventoryItem>, ApiError> {
    let updated = inventory::apply_manual_update(
        &state.pool,
        inventory_id,
        user.user_id,
        InventoryUpdate {
            current_stock: Some(new_stock),
            ..Default::default()
        },
    )
    .await?;

    if !updated {
        return Err(ApiError::NotFound(
            "Item de estoque não encontrado".to_string(),
        ));
    }

    let item = inventory::get_item(&state.pool, inventory_id, user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Item de estoque não encontrado".to_string()))?;

    Ok(Json(item))
}

pub async fn deactivate_inventory_item(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(inventory_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deactivated =
        inventory::deactivate_item(&state.pool, inventory_id, user.user_id).await?;

    if !deactivated {
        return Err(ApiError::NotFound(
            "Item de estoque não encontrado".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Notificações
// ---------------------------------------------------------------------------

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<InventoryNotification>>, ApiError> {
    Ok(Json(
        inventory::get_notifications(&state.pool, user.user_id).await?,
    ))
}

pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let marked =
        inventory::mark_notification_read(&state.pool, notification_id, user.user_id).await?;

    if !marked {
        return Err(ApiError::NotFound(
            "Notificação não encontrada".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Familiares
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct LinkFamilyMemberRequest {
    pub member_user_id: i64,
    #[validate(length(min = 1, max = 100))]
    pub member_name: String,
    pub access_level: AccessLevel,
}

pub async fn link_family_member(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(request): Json<LinkFamilyMemberRequest>,
) -> Result<(StatusCode, Json<FamilyMember>), ApiError> {
    request.validate()?;

    let member = family::link_member(
        &state.pool,
        user.user_id,
        request.member_user_id,
        &request.member_name,
        request.access_level,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn list_family_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<FamilyMember>>, ApiError> {
    Ok(Json(family::list_members(&state.pool, user.user_id).await?))
}
