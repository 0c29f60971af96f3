use assert_matches::assert_matches;

use opd_queue_cell::*;
use super::*;

#[test]
fn test_two_slot_day_scenario() {
    let mut engine = engine_with_doctor("09:00", "10:00", 30, 1);
    let labels: Vec<String> = engine.doctor(DOCTOR_ID).unwrap().slots.iter().map(|s| s.slot_time.clone()).collect();
    assert_eq!(labels, vec!["09:00", "09:30"]);

    let first = allocate(&mut engine, "P1", "09:00", TokenSource::Online);
    let second = allocate(&mut engine, "P2", "09:30", TokenSource::Online);
    assert!(first.is_allocated() && second.is_allocated());

    let third = allocate(&mut engine, "P3", "09:00", TokenSource::Online);
    assert_matches!(&third, AllocationOutcome::Waitlisted { waiting_position: 1, .. });

    let outcome = engine.cancel_token(&first.token().token_id, None).unwrap();

    assert_eq!(outcome.token.status, TokenStatus::Cancelled);
    let reallocated = outcome.reallocated.expect("waiting token should take the freed slot");
    assert_eq!(reallocated.token_id, third.token().token_id);
    assert_eq!(reallocated.slot_time, "09:00");
    assert_eq!(reallocated.status, TokenStatus::Allocated);
    assert_eq!(reallocated.token_number, Some(1));
    assert!(engine.waiting_list().is_empty());
    assert_engine_invariants(&engine);
}

#[test]
fn test_cancel_records_reason_and_keeps_token() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 2);
    let ids = fill_slot(&mut engine, "09:00", 2, TokenSource::Walkin);

    let outcome = engine.cancel_token(&ids[0], Some("Rescheduled".to_string())).unwrap();

    assert_eq!(outcome.token.cancellation_reason.as_deref(), Some("Rescheduled"));
    assert!(outcome.token.cancelled_at.is_some());
    assert_eq!(outcome.token.token_number, None);
    assert!(outcome.reallocated.is_none());

    // remaining member renumbered from 2 to 1
    let remaining = engine.get_token(&ids[1]).unwrap();
    assert_eq!(remaining.token_number, Some(1));
    assert_eq!(remaining.estimated_time.as_deref(), Some("09:00"));

    assert_eq!(engine.tokens().count(), 2, "cancelled tokens stay registered");
    assert_engine_invariants(&engine);
}

#[test]
fn test_blank_reason_defaults() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 1);
    let ids = fill_slot(&mut engine, "09:00", 1, TokenSource::Online);

    let outcome = engine.cancel_token(&ids[0], Some("  ".to_string())).unwrap();
    assert_eq!(outcome.token.cancellation_reason.as_deref(), Some(DEFAULT_CANCELLATION_REASON));
}

#[test]
fn test_allocate_then_cancel_restores_slot_count() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 4);
    fill_slot(&mut engine, "09:00", 2, TokenSource::Online);
    let before = slot_of(&engine, "09:00").allocated();

    let outcome = allocate(&mut engine, "P9", "09:00", TokenSource::Online);
    engine.cancel_token(&outcome.token().token_id, None).unwrap();

    assert_eq!(slot_of(&engine, "09:00").allocated(), before);
}

#[test]
fn test_reallocation_picks_highest_priority() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 1);
    let ids = fill_slot(&mut engine, "09:00", 1, TokenSource::Online);

    let walkin = allocate(&mut engine, "W1", "09:00", TokenSource::Walkin);
    let followup = allocate(&mut engine, "F1", "09:00", TokenSource::Followup);
    let online = allocate(&mut engine, "O1", "09:00", TokenSource::Online);

    let outcome = engine.cancel_token(&ids[0], None).unwrap();

    assert_eq!(outcome.reallocated.unwrap().token_id, followup.token().token_id);
    let waiting: Vec<String> = engine.waiting_list().into_iter().map(|t| t.token_id).collect();
    assert_eq!(waiting, vec![walkin.token().token_id.clone(), online.token().token_id.clone()]);
    assert_engine_invariants(&engine);
}

#[test]
fn test_reallocation_tie_goes_to_earliest_waiter() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 1);
    let ids = fill_slot(&mut engine, "09:00", 1, TokenSource::Online);

    let early = allocate(&mut engine, "O1", "09:00", TokenSource::Online);
    allocate(&mut engine, "O2", "09:00", TokenSource::Online);

    let outcome = engine.cancel_token(&ids[0], None).unwrap();
    assert_eq!(outcome.reallocated.unwrap().token_id, early.token().token_id);
}

#[test]
fn test_reallocation_ignores_other_doctors() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 1);
    engine
        .register_doctor(RegisterDoctorRequest::new("DOC002", "Dr. Patel", "09:00", "10:00").with_capacity(1))
        .unwrap();

    let ids = fill_slot(&mut engine, "09:00", 1, TokenSource::Online);

    let mut other = token_request("Q1", "09:00", TokenSource::Followup);
    other.doctor_id = "DOC002".to_string();
    engine.allocate_token(other.clone()).unwrap();
    other.patient_id = "Q2".to_string();
    let outcome = engine.allocate_token(other).unwrap();
    assert!(!outcome.is_allocated());

    let released = engine.cancel_token(&ids[0], None).unwrap();

    assert!(released.reallocated.is_none());
    assert_eq!(engine.waiting_list().len(), 1);
    assert_eq!(slot_of(&engine, "09:00").allocated(), 0);
}

#[test]
fn test_cancel_waiting_token_leaves_list() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 1);
    fill_slot(&mut engine, "09:00", 1, TokenSource::Online);
    let waiting = allocate(&mut engine, "W1", "09:00", TokenSource::Walkin);

    let outcome = engine.cancel_token(&waiting.token().token_id, None).unwrap();

    assert_eq!(outcome.token.status, TokenStatus::Cancelled);
    assert!(outcome.reallocated.is_none());
    assert!(engine.waiting_list().is_empty());
    assert_eq!(slot_of(&engine, "09:00").allocated(), 1);
}

#[test]
fn test_cancel_twice_is_noop() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 1);
    let ids = fill_slot(&mut engine, "09:00", 1, TokenSource::Online);

    let first = engine.cancel_token(&ids[0], Some("Feeling better".to_string())).unwrap();
    let second = engine.cancel_token(&ids[0], Some("Other".to_string())).unwrap();

    assert_eq!(first.token, second.token);
    assert_eq!(second.token.cancellation_reason.as_deref(), Some("Feeling better"));
}

#[test]
fn test_unknown_token_rejected() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 1);

    assert_matches!(engine.cancel_token("TKN-9999", None), Err(OpdQueueError::TokenNotFound(_)));
    assert_matches!(engine.complete_token("TKN-9999"), Err(OpdQueueError::TokenNotFound(_)));
    assert_matches!(engine.get_token("TKN-9999"), Err(OpdQueueError::TokenNotFound(_)));
}

#[test]
fn test_complete_and_no_show_free_capacity() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 2);
    let ids = fill_slot(&mut engine, "09:00", 2, TokenSource::Online);
    let waiting = allocate(&mut engine, "W1", "09:00", TokenSource::Walkin);

    let completed = engine.complete_token(&ids[0]).unwrap();
    assert_eq!(completed.token.status, TokenStatus::Completed);
    assert!(completed.token.completed_at.is_some());
    assert_eq!(completed.reallocated.unwrap().token_id, waiting.token().token_id);

    let no_show = engine.mark_no_show(&ids[1]).unwrap();
    assert_eq!(no_show.token.status, TokenStatus::NoShow);
    assert!(no_show.token.no_show_at.is_some());
    assert!(no_show.reallocated.is_none());

    assert_eq!(slot_of(&engine, "09:00").allocated(), 1);
    assert_engine_invariants(&engine);
}

#[test]
fn test_complete_requires_allocated_token() {
    let mut engine = engine_with_doctor("09:00", "10:00", 60, 1);
    let ids = fill_slot(&mut engine, "09:00", 1, TokenSource::Online);
    let waiting = allocate(&mut engine, "W1", "09:00", TokenSource::Walkin);

    assert_matches!(
        engine.complete_token(&waiting.token().token_id),
        Err(OpdQueueError::InvalidStatusTransition { from, to }) if from == "waiting" && to == "completed"
    );

    engine.complete_token(&ids[0]).unwrap();
    assert_matches!(engine.mark_no_show(&ids[0]), Err(OpdQueueError::InvalidStatusTransition { .. }));
}
