use tracing::info;

use crate::error::OpdQueueError;
use crate::models::RegisterDoctorRequest;
use crate::services::allocator::AllocationEngine;

/// The three-doctor outpatient roster used for demos and default startup.
pub fn sample_doctors() -> Vec<RegisterDoctorRequest> {
    vec![
        RegisterDoctorRequest::new("DOC001", "Dr. Sharma (Cardiology)", "09:00", "13:00")
            .with_avg_consultation_time(12),
        RegisterDoctorRequest::new("DOC002", "Dr. Patel (General Medicine)", "10:00", "14:00")
            .with_avg_consultation_time(10),
        RegisterDoctorRequest::new("DOC003", "Dr. Kumar (Orthopedics)", "09:00", "12:00")
            .with_avg_consultation_time(15),
    ]
}

impl AllocationEngine {
    pub fn seed_sample_doctors(&mut self) -> Result<usize, OpdQueueError> {
        let roster = sample_doctors();
        let count = roster.len();
        for request in roster {
            self.register_doctor(request)?;
        }
        info!("Seeded {} sample doctors", count);
        Ok(count)
    }
}
