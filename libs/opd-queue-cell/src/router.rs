use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::services::SharedEngine;

pub fn opd_routes(engine: SharedEngine) -> Router {
    let token_routes = Router::new()
        .route("/tokens/request", post(handlers::request_token))
        .route("/tokens/cancel", post(handlers::cancel_token))
        .route("/tokens/emergency", post(handlers::emergency_token))
        .route("/tokens/{token_id}", get(handlers::get_token))
        .route("/tokens/{token_id}/complete", post(handlers::complete_token))
        .route("/tokens/{token_id}/no-show", post(handlers::mark_no_show))
        .route("/waiting-list", get(handlers::get_waiting_list));

    let schedule_routes = Router::new()
        .route("/slots/delay", post(handlers::add_delay))
        .route("/doctors", get(handlers::list_doctors).post(handlers::register_doctor))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor))
        .route("/status", get(handlers::get_status));

    Router::new()
        .route("/", get(handlers::api_index))
        .merge(token_routes)
        .merge(schedule_routes)
        .with_state(engine)
}
