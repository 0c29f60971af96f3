use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpdQueueError {
    #[error("Doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("Slot {slot_time} not found for doctor {doctor_id}")]
    SlotNotFound { doctor_id: String, slot_time: String },

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    #[error("Cannot insert emergency token into slot {slot_time} of doctor {doctor_id}: no occupant scores below {emergency_score}")]
    EmergencyPreemptionDenied {
        doctor_id: String,
        slot_time: String,
        emergency_score: i64,
    },

    #[error("Doctor already registered: {0}")]
    DuplicateDoctor(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid token status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<OpdQueueError> for AppError {
    fn from(error: OpdQueueError) -> Self {
        match error {
            OpdQueueError::DoctorNotFound(_)
            | OpdQueueError::SlotNotFound { .. }
            | OpdQueueError::TokenNotFound(_) => AppError::NotFound(error.to_string()),
            OpdQueueError::EmergencyPreemptionDenied { .. }
            | OpdQueueError::DuplicateDoctor(_)
            | OpdQueueError::InvalidStatusTransition { .. } => AppError::Conflict(error.to_string()),
            OpdQueueError::InvalidSchedule(_) => AppError::BadRequest(error.to_string()),
            OpdQueueError::ValidationError(_) => AppError::ValidationError(error.to_string()),
        }
    }
}
