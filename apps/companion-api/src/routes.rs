//! Montagem das rotas do serviço

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Constrói o roteador com todas as rotas da API
///
/// O middleware de autenticação (pacote externo) deve ser aplicado por cima
/// deste roteador; sem ele, toda rota autenticada responde 401.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/appointments",
            post(handlers::book_appointment).get(handlers::list_appointments),
        )
        .route(
            "/appointments/:id",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route("/doctors", get(handlers::list_doctors))
        .route("/doctors/:id", get(handlers::get_doctor))
        .route(
            "/medications",
            post(handlers::create_medication).get(handlers::list_medications),
        )
        .route(
            "/schedules",
            post(handlers::create_schedule).get(handlers::list_schedules),
        )
        .route("/schedules/:id/taken", post(handlers::mark_dose_taken))
        .route(
            "/inventory",
            post(handlers::create_inventory_item).get(handlers::list_inventory),
        )
        .route(
            "/inventory/:id",
            put(handlers::update_inventory_item).delete(handlers::deactivate_inventory_item),
        )
        .route("/inventory/:id/take", post(handlers::take_from_inventory))
        .route("/inventory/:id/restock", post(handlers::restock_inventory))
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/family",
            post(handlers::link_family_member).get(handlers::list_family_members),
        )
        .with_state(state)
}
