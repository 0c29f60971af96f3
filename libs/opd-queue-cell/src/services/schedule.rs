use chrono::{NaiveTime, Timelike};
use tracing::debug;

use crate::error::OpdQueueError;
use crate::models::{DoctorSchedule, RegisterDoctorRequest, Slot};

/// Parses an `HH:MM` label into minutes since midnight.
pub fn parse_time(label: &str) -> Result<u32, OpdQueueError> {
    let time = NaiveTime::parse_from_str(label.trim(), "%H:%M").map_err(|_| {
        OpdQueueError::InvalidSchedule(format!("'{}' is not a valid HH:MM time", label))
    })?;
    Ok(time.hour() * 60 + time.minute())
}

/// Formats minutes since midnight as `HH:MM`. Values past 24:00 are not wrapped,
/// so a delayed estimate late in the day reads e.g. `24:10`.
pub fn format_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Walks `[start, end)` in `duration` steps. The last slot may run past `end`
/// when the duration does not divide the interval; it is not clipped.
pub fn generate_slots(doctor_id: &str, start: u32, end: u32, duration: u32, capacity: u32) -> Vec<Slot> {
    if duration == 0 {
        return Vec::new();
    }

    let mut slots = Vec::new();
    let mut current = start;
    while current < end {
        slots.push(Slot::new(doctor_id, current, capacity));
        current = current.saturating_add(duration);
    }
    slots
}

impl DoctorSchedule {
    pub fn new(request: &RegisterDoctorRequest, default_capacity: u32) -> Result<Self, OpdQueueError> {
        request.validate()?;

        let start = parse_time(&request.start_time)?;
        let end = parse_time(&request.end_time)?;
        let capacity = request.capacity.unwrap_or(default_capacity);

        if request.slot_duration == 0 {
            return Err(OpdQueueError::InvalidSchedule("slot_duration must be at least 1 minute".to_string()));
        }
        if capacity == 0 {
            return Err(OpdQueueError::InvalidSchedule("slot capacity must be at least 1".to_string()));
        }

        let slots = generate_slots(&request.doctor_id, start, end, request.slot_duration, capacity);
        if slots.is_empty() {
            return Err(OpdQueueError::InvalidSchedule(format!(
                "working hours {}-{} produce no slots",
                request.start_time, request.end_time
            )));
        }

        debug!(
            "Generated {} slots of {} minutes for doctor {}",
            slots.len(),
            request.slot_duration,
            request.doctor_id
        );

        Ok(Self {
            doctor_id: request.doctor_id.clone(),
            name: request.name.clone(),
            start_time: format_time(start),
            end_time: format_time(end),
            slot_duration: request.slot_duration,
            avg_consultation_time: request.avg_consultation_time,
            slots,
        })
    }
}
