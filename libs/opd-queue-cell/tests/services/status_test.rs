use opd_queue_cell::*;
use super::*;

#[test]
fn test_status_counts_every_registered_token() {
    let mut engine = engine_with_doctor("09:00", "10:00", 30, 1);
    let ids = fill_slot(&mut engine, "09:00", 1, TokenSource::Online);
    allocate(&mut engine, "P2", "09:30", TokenSource::Online);
    allocate(&mut engine, "P3", "09:30", TokenSource::Walkin);
    allocate(&mut engine, "P4", "09:30", TokenSource::Walkin);

    // cancel frees 09:00 and the first waiter takes it
    engine.cancel_token(&ids[0], None).unwrap();

    let status = engine.status();
    assert_eq!(status.total_doctors, 1);
    assert_eq!(status.total_tokens, 4);
    assert_eq!(status.waiting_list, 1);

    let doctor = &status.doctors[0];
    assert_eq!(doctor.allocated, 2);
    assert_eq!(doctor.capacity, 2);
    assert!((doctor.utilization - 100.0).abs() < f64::EPSILON);
}

#[test]
fn test_utilization_percentage() {
    let mut engine = engine_with_doctor("09:00", "13:00", 60, 6);
    fill_slot(&mut engine, "09:00", 6, TokenSource::Online);

    let summary = &engine.list_doctors()[0];
    assert_eq!(summary.capacity, 24);
    assert_eq!(summary.allocated, 6);
    assert!((summary.utilization - 25.0).abs() < 1e-9);
}

#[test]
fn test_doctor_snapshot_lists_slot_members() {
    let mut engine = engine_with_doctor("09:00", "11:00", 60, 2);
    fill_slot(&mut engine, "10:00", 2, TokenSource::Followup);
    engine.add_delay(DOCTOR_ID, "10:00", 5).unwrap();

    let snapshot = engine.doctor_snapshot(DOCTOR_ID).unwrap();
    assert_eq!(snapshot.slots.len(), 2);
    assert_eq!(snapshot.total_capacity, 4);

    let busy = &snapshot.slots[1];
    assert_eq!(busy.slot_id, "DOC001-10:00");
    assert_eq!(busy.available, 0);
    assert_eq!(busy.status, SlotStatus::Full);
    assert_eq!(busy.delay_minutes, 5);
    let estimates: Vec<Option<String>> = busy.tokens.iter().map(|t| t.estimated_time.clone()).collect();
    assert_eq!(estimates, vec![Some("10:05".to_string()), Some("10:15".to_string())]);

    assert!(engine.doctor_snapshot("DOC404").is_err());
}

#[test]
fn test_sample_roster_seeds_once() {
    let mut engine = test_engine();
    assert_eq!(engine.seed_sample_doctors().unwrap(), 3);
    assert!(engine.seed_sample_doctors().is_err());

    let ids: Vec<String> = engine.list_doctors().into_iter().map(|d| d.doctor_id).collect();
    assert_eq!(ids, vec!["DOC001", "DOC002", "DOC003"]);
    assert_eq!(engine.status().total_doctors, 3);
}

#[test]
fn test_empty_engine_status() {
    let engine = test_engine();
    let status = engine.status();

    assert_eq!(status.total_doctors, 0);
    assert_eq!(status.total_tokens, 0);
    assert_eq!(status.waiting_list, 0);
    assert!(status.doctors.is_empty());
}
