use opd_queue_cell::*;
use shared_utils::test_utils::{FixedClock, SequentialIdGenerator, TestConfig};

pub const DOCTOR_ID: &str = "DOC001";

/// Deterministic engine: ids `TKN-0001...`, clock from 2024-01-15 08:00 UTC.
pub fn test_engine() -> AllocationEngine {
    AllocationEngine::from_config(&TestConfig::default().to_app_config())
        .with_id_generator(SequentialIdGenerator::default())
        .with_clock(FixedClock::default())
}

/// One doctor working `start`-`end` in `slot_duration` minute slots of `capacity`.
pub fn engine_with_doctor(start: &str, end: &str, slot_duration: u32, capacity: u32) -> AllocationEngine {
    let mut engine = test_engine();
    engine
        .register_doctor(
            RegisterDoctorRequest::new(DOCTOR_ID, "Dr. Sharma (Cardiology)", start, end)
                .with_slot_duration(slot_duration)
                .with_avg_consultation_time(10)
                .with_capacity(capacity),
        )
        .expect("Failed to register test doctor");
    engine
}

pub fn token_request(patient: &str, slot_time: &str, source: TokenSource) -> AllocateTokenRequest {
    AllocateTokenRequest {
        patient_id: patient.to_string(),
        patient_name: format!("Patient {}", patient),
        doctor_id: DOCTOR_ID.to_string(),
        slot_time: slot_time.to_string(),
        source,
        priority_adjustment: 0,
    }
}

pub fn emergency_request(patient: &str, preferred_slot: Option<&str>) -> EmergencyTokenRequest {
    EmergencyTokenRequest {
        patient_id: patient.to_string(),
        patient_name: format!("Emergency {}", patient),
        doctor_id: DOCTOR_ID.to_string(),
        preferred_slot: preferred_slot.map(str::to_string),
    }
}

pub fn allocate(engine: &mut AllocationEngine, patient: &str, slot_time: &str, source: TokenSource) -> AllocationOutcome {
    engine
        .allocate_token(token_request(patient, slot_time, source))
        .expect("Allocation should not fail")
}

/// Allocates `count` tokens directly into `slot_time`, returning their ids.
pub fn fill_slot(engine: &mut AllocationEngine, slot_time: &str, count: usize, source: TokenSource) -> Vec<String> {
    (0..count)
        .map(|n| {
            let outcome = allocate(engine, &format!("{}-{}", slot_time, n), slot_time, source);
            assert!(outcome.is_allocated(), "slot {} should have room", slot_time);
            outcome.token().token_id.clone()
        })
        .collect()
}

pub fn slot_of<'a>(engine: &'a AllocationEngine, slot_time: &str) -> &'a Slot {
    engine
        .doctor(DOCTOR_ID)
        .and_then(|d| d.slot(slot_time))
        .expect("slot should exist")
}

/// Checks the structural invariants that must hold after every operation.
pub fn assert_engine_invariants(engine: &AllocationEngine) {
    for doctor in engine.doctors() {
        for slot in &doctor.slots {
            assert!(slot.allocated() <= slot.capacity, "slot {} over capacity", slot.slot_id);
            for (index, id) in slot.token_ids().iter().enumerate() {
                let token = engine.get_token(id).expect("slot member must be registered");
                assert_eq!(token.status, TokenStatus::Allocated);
                assert_eq!(token.doctor_id, slot.doctor_id);
                assert_eq!(token.slot_time, slot.slot_time);
                assert_eq!(token.token_number, Some(index as u32 + 1));
            }
        }
    }

    for token in engine.waiting_list() {
        assert_eq!(token.status, TokenStatus::Waiting);
        let in_any_slot = engine
            .doctors()
            .iter()
            .flat_map(|d| d.slots.iter())
            .any(|s| s.contains(&token.token_id));
        assert!(!in_any_slot, "waiting token {} is still in a slot", token.token_id);
    }

    for token in engine.tokens().filter(|t| t.status == TokenStatus::Allocated) {
        let memberships = engine
            .doctors()
            .iter()
            .flat_map(|d| d.slots.iter())
            .filter(|s| s.contains(&token.token_id))
            .count();
        assert_eq!(memberships, 1, "allocated token {} must sit in exactly one slot", token.token_id);
    }
}

mod cancellation_test;
mod status_test;
