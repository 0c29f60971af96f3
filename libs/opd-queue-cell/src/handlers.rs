use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use shared_models::error::AppError;

use crate::models::{
    AddDelayRequest, AllocateTokenRequest, AllocationOutcome, CancelTokenRequest,
    EmergencyTokenRequest, RegisterDoctorRequest,
};
use crate::services::SharedEngine;

pub async fn api_index() -> Json<Value> {
    Json(json!({
        "message": "OPD Token Allocation API is running",
        "endpoints": {
            "request_token": "POST /api/tokens/request",
            "cancel_token": "POST /api/tokens/cancel",
            "emergency_token": "POST /api/tokens/emergency",
            "get_token": "GET /api/tokens/{token_id}",
            "complete_token": "POST /api/tokens/{token_id}/complete",
            "no_show": "POST /api/tokens/{token_id}/no-show",
            "waiting_list": "GET /api/waiting-list",
            "add_delay": "POST /api/slots/delay",
            "doctors": "GET /api/doctors",
            "register_doctor": "POST /api/doctors",
            "doctor": "GET /api/doctors/{doctor_id}",
            "status": "GET /api/status",
            "health": "GET /health"
        }
    }))
}

// ==============================================================================
// TOKEN HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn request_token(
    State(engine): State<SharedEngine>,
    Json(request): Json<AllocateTokenRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    info!("Token request from patient {} for {} at {}", request.patient_id, request.doctor_id, request.slot_time);

    let outcome = engine.lock().await.allocate_token(request)?;

    match outcome {
        AllocationOutcome::Allocated { token, reassigned } => {
            let message = if reassigned {
                format!("Requested slot full. Allocated to {}", token.slot_time)
            } else {
                "Token allocated successfully".to_string()
            };
            Ok((StatusCode::OK, Json(json!({
                "success": true,
                "token": token,
                "alternative": reassigned,
                "message": message
            }))))
        }
        AllocationOutcome::Waitlisted { token, waiting_position, doctor_waiting_position } => {
            Ok((StatusCode::ACCEPTED, Json(json!({
                "success": false,
                "token": token,
                "error": "All slots full",
                "message": "Added to waiting list",
                "waiting_position": waiting_position,
                "doctor_waiting_position": doctor_waiting_position
            }))))
        }
    }
}

#[axum::debug_handler]
pub async fn cancel_token(
    State(engine): State<SharedEngine>,
    Json(request): Json<CancelTokenRequest>,
) -> Result<Json<Value>, AppError> {
    if request.token_id.trim().is_empty() {
        return Err(AppError::ValidationError("token_id is required".to_string()));
    }

    let outcome = engine.lock().await.cancel_token(&request.token_id, request.reason)?;

    Ok(Json(json!({
        "success": true,
        "message": "Token cancelled",
        "token": outcome.token,
        "reallocated": outcome.reallocated
    })))
}

#[axum::debug_handler]
pub async fn emergency_token(
    State(engine): State<SharedEngine>,
    Json(request): Json<EmergencyTokenRequest>,
) -> Result<Json<Value>, AppError> {
    info!("Emergency request from patient {} for {}", request.patient_id, request.doctor_id);

    let outcome = engine.lock().await.insert_emergency_token(request)?;
    let message = if outcome.displaced_patient_id.is_some() {
        "Emergency token inserted by moving lower priority patient"
    } else {
        "Emergency token inserted"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "token": outcome.token,
        "moved_patient": outcome.displaced_patient_id,
        "displaced_token": outcome.displaced_token
    })))
}

pub async fn get_token(
    State(engine): State<SharedEngine>,
    Path(token_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let token = engine.lock().await.get_token(&token_id)?;
    Ok(Json(json!({ "success": true, "token": token })))
}

pub async fn complete_token(
    State(engine): State<SharedEngine>,
    Path(token_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let outcome = engine.lock().await.complete_token(&token_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Consultation completed",
        "token": outcome.token,
        "reallocated": outcome.reallocated
    })))
}

pub async fn mark_no_show(
    State(engine): State<SharedEngine>,
    Path(token_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let outcome = engine.lock().await.mark_no_show(&token_id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Patient marked as no-show",
        "token": outcome.token,
        "reallocated": outcome.reallocated
    })))
}

pub async fn get_waiting_list(State(engine): State<SharedEngine>) -> Json<Value> {
    let waiting = engine.lock().await.waiting_list();
    Json(json!({
        "success": true,
        "total": waiting.len(),
        "tokens": waiting
    }))
}

// ==============================================================================
// SCHEDULE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn add_delay(
    State(engine): State<SharedEngine>,
    Json(request): Json<AddDelayRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = engine
        .lock()
        .await
        .add_delay(&request.doctor_id, &request.slot_time, request.delay_minutes)?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Delay of {} minutes added", outcome.delay_minutes),
        "affected_slots": outcome.affected_slots
    })))
}

pub async fn list_doctors(State(engine): State<SharedEngine>) -> Json<Value> {
    let doctors = engine.lock().await.list_doctors();
    Json(json!({ "success": true, "doctors": doctors }))
}

#[axum::debug_handler]
pub async fn register_doctor(
    State(engine): State<SharedEngine>,
    Json(request): Json<RegisterDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor = engine.lock().await.register_doctor(request)?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "doctor": doctor }))))
}

pub async fn get_doctor(
    State(engine): State<SharedEngine>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor = engine.lock().await.doctor_snapshot(&doctor_id)?;
    Ok(Json(json!({ "success": true, "doctor": doctor })))
}

pub async fn get_status(State(engine): State<SharedEngine>) -> Json<Value> {
    let status = engine.lock().await.status();
    Json(json!({ "success": true, "status": status }))
}
