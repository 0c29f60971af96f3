use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OpdQueueError;

/// Manual adjustment applied to every token admitted through the emergency path.
pub const EMERGENCY_PRIORITY_ADJUSTMENT: i64 = 5;

pub const DEFAULT_CANCELLATION_REASON: &str = "No reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    Online,
    Walkin,
    Followup,
    Priority,
}

impl TokenSource {
    pub fn base_priority(&self) -> i64 {
        match self {
            TokenSource::Priority => 1000,
            TokenSource::Followup => 500,
            TokenSource::Online => 100,
            TokenSource::Walkin => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Online => "online",
            TokenSource::Walkin => "walkin",
            TokenSource::Followup => "followup",
            TokenSource::Priority => "priority",
        }
    }

    /// Saturates at the `i64` bounds so an extreme adjustment still orders correctly.
    pub fn priority_score(&self, adjustment: i64) -> i64 {
        self.base_priority().saturating_add(adjustment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Allocated,
    Waiting,
    Cancelled,
    Completed,
    NoShow,
}

impl TokenStatus {
    pub fn can_transition_to(&self, target: &TokenStatus) -> bool {
        use TokenStatus::*;
        match (self, target) {
            (Allocated, Cancelled) => true,
            (Allocated, Completed) => true,
            (Allocated, NoShow) => true,
            (Allocated, Waiting) => true,
            (Waiting, Allocated) => true,
            (Waiting, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Allocated => "allocated",
            TokenStatus::Waiting => "waiting",
            TokenStatus::Cancelled => "cancelled",
            TokenStatus::Completed => "completed",
            TokenStatus::NoShow => "no_show",
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    Full,
    Delayed,
}

/// One patient's claim on one consultation.
///
/// The registry keeps every token ever created; cancellation, completion and
/// no-show are status changes, never removals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: String,
    /// 1-based position inside the current slot. `None` while waiting or after release.
    pub token_number: Option<u32>,
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_id: String,
    pub slot_time: String,
    pub source: TokenSource,
    pub priority: i64,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub no_show_at: Option<DateTime<Utc>>,
    /// Display approximation only, recomputed on every slot change.
    pub estimated_time: Option<String>,
}

impl Token {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token_id: String,
        patient_id: &str,
        patient_name: &str,
        doctor_id: &str,
        slot_time: &str,
        source: TokenSource,
        priority_adjustment: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token_id,
            token_number: None,
            patient_id: patient_id.to_string(),
            patient_name: patient_name.to_string(),
            doctor_id: doctor_id.to_string(),
            slot_time: slot_time.to_string(),
            source,
            priority: source.priority_score(priority_adjustment),
            status: TokenStatus::Allocated,
            created_at,
            cancellation_reason: None,
            cancelled_at: None,
            completed_at: None,
            no_show_at: None,
            estimated_time: None,
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.source == TokenSource::Priority
    }

    pub(crate) fn cancel(&mut self, reason: String, at: DateTime<Utc>) {
        self.status = TokenStatus::Cancelled;
        self.cancellation_reason = Some(reason);
        self.cancelled_at = Some(at);
        self.detach();
    }

    pub(crate) fn complete(&mut self, at: DateTime<Utc>) {
        self.status = TokenStatus::Completed;
        self.completed_at = Some(at);
        self.detach();
    }

    pub(crate) fn mark_no_show(&mut self, at: DateTime<Utc>) {
        self.status = TokenStatus::NoShow;
        self.no_show_at = Some(at);
        self.detach();
    }

    pub(crate) fn demote_to_waiting(&mut self) {
        self.status = TokenStatus::Waiting;
        self.detach();
    }

    fn detach(&mut self) {
        self.token_number = None;
        self.estimated_time = None;
    }
}

/// Fixed-capacity time bucket belonging to one doctor.
///
/// Members are always tokens in the `allocated` state: a token leaves the
/// slot on any other transition, so the member count is the allocated count.
#[derive(Debug, Clone)]
pub struct Slot {
    pub slot_id: String,
    pub doctor_id: String,
    pub slot_time: String,
    pub start_minutes: u32,
    pub capacity: u32,
    pub delay_minutes: u32,
    token_ids: Vec<String>,
}

impl Slot {
    pub fn new(doctor_id: &str, start_minutes: u32, capacity: u32) -> Self {
        let slot_time = crate::services::schedule::format_time(start_minutes);
        Self {
            slot_id: format!("{}-{}", doctor_id, slot_time),
            doctor_id: doctor_id.to_string(),
            slot_time,
            start_minutes,
            capacity,
            delay_minutes: 0,
            token_ids: Vec::new(),
        }
    }

    pub fn allocated(&self) -> u32 {
        self.token_ids.len() as u32
    }

    pub fn available(&self) -> i64 {
        self.capacity as i64 - self.allocated() as i64
    }

    pub fn has_capacity(&self) -> bool {
        self.available() > 0
    }

    pub fn is_full(&self) -> bool {
        !self.has_capacity()
    }

    pub fn status(&self) -> SlotStatus {
        if self.is_full() {
            SlotStatus::Full
        } else if self.delay_minutes > 0 {
            SlotStatus::Delayed
        } else {
            SlotStatus::Available
        }
    }

    /// Member token ids in arrival order.
    pub fn token_ids(&self) -> &[String] {
        &self.token_ids
    }

    pub fn contains(&self, token_id: &str) -> bool {
        self.token_ids.iter().any(|id| id == token_id)
    }

    // Capacity is checked by the engine before every push.
    pub(crate) fn push_token(&mut self, token_id: String) {
        debug_assert!(self.has_capacity(), "slot {} over capacity", self.slot_id);
        self.token_ids.push(token_id);
    }

    pub(crate) fn remove_token(&mut self, token_id: &str) -> bool {
        match self.token_ids.iter().position(|id| id == token_id) {
            Some(index) => {
                self.token_ids.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn add_delay(&mut self, minutes: u32) {
        self.delay_minutes = self.delay_minutes.saturating_add(minutes);
    }
}

/// A doctor's identity plus the slots generated once from their working hours.
#[derive(Debug, Clone)]
pub struct DoctorSchedule {
    pub doctor_id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub slot_duration: u32,
    pub avg_consultation_time: u32,
    pub slots: Vec<Slot>,
}

impl DoctorSchedule {
    /// Linear scan by exact label match.
    pub fn slot_index(&self, slot_time: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.slot_time == slot_time)
    }

    pub fn slot(&self, slot_time: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.slot_time == slot_time)
    }

    pub fn allocated_tokens(&self) -> u32 {
        self.slots.iter().map(Slot::allocated).sum()
    }

    pub fn total_capacity(&self) -> u32 {
        self.slots.iter().fold(0u32, |total, s| total.saturating_add(s.capacity))
    }

    pub fn utilization(&self) -> f64 {
        let total = self.total_capacity();
        if total == 0 {
            return 0.0;
        }
        self.allocated_tokens() as f64 / total as f64 * 100.0
    }

    pub fn summary(&self) -> DoctorSummary {
        DoctorSummary {
            doctor_id: self.doctor_id.clone(),
            name: self.name.clone(),
            allocated: self.allocated_tokens(),
            capacity: self.total_capacity(),
            utilization: self.utilization(),
        }
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

fn default_start_time() -> String {
    "09:00".to_string()
}

fn default_end_time() -> String {
    "13:00".to_string()
}

fn default_slot_duration() -> u32 {
    60
}

fn default_avg_consultation_time() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDoctorRequest {
    pub doctor_id: String,
    pub name: String,
    #[serde(default = "default_start_time")]
    pub start_time: String,
    #[serde(default = "default_end_time")]
    pub end_time: String,
    #[serde(default = "default_slot_duration")]
    pub slot_duration: u32,
    #[serde(default = "default_avg_consultation_time")]
    pub avg_consultation_time: u32,
    /// Falls back to the engine's configured default when absent.
    pub capacity: Option<u32>,
}

impl RegisterDoctorRequest {
    pub fn new(doctor_id: &str, name: &str, start_time: &str, end_time: &str) -> Self {
        Self {
            doctor_id: doctor_id.to_string(),
            name: name.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            slot_duration: default_slot_duration(),
            avg_consultation_time: default_avg_consultation_time(),
            capacity: None,
        }
    }

    pub fn with_slot_duration(mut self, minutes: u32) -> Self {
        self.slot_duration = minutes;
        self
    }

    pub fn with_avg_consultation_time(mut self, minutes: u32) -> Self {
        self.avg_consultation_time = minutes;
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn validate(&self) -> Result<(), OpdQueueError> {
        require("doctor_id", &self.doctor_id)?;
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocateTokenRequest {
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_id: String,
    pub slot_time: String,
    pub source: TokenSource,
    #[serde(default, alias = "priority")]
    pub priority_adjustment: i64,
}

impl AllocateTokenRequest {
    pub fn validate(&self) -> Result<(), OpdQueueError> {
        require("patient_id", &self.patient_id)?;
        require("patient_name", &self.patient_name)?;
        require("doctor_id", &self.doctor_id)?;
        require("slot_time", &self.slot_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTokenRequest {
    pub token_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyTokenRequest {
    pub patient_id: String,
    pub patient_name: String,
    pub doctor_id: String,
    pub preferred_slot: Option<String>,
}

impl EmergencyTokenRequest {
    pub fn validate(&self) -> Result<(), OpdQueueError> {
        require("patient_id", &self.patient_id)?;
        require("patient_name", &self.patient_name)?;
        require("doctor_id", &self.doctor_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDelayRequest {
    pub doctor_id: String,
    pub slot_time: String,
    pub delay_minutes: u32,
}

fn require(field: &str, value: &str) -> Result<(), OpdQueueError> {
    if value.trim().is_empty() {
        return Err(OpdQueueError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

// ==============================================================================
// OUTCOMES AND SNAPSHOTS
// ==============================================================================

/// Result of an ordinary allocation. Waitlisting is a recorded outcome, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AllocationOutcome {
    Allocated {
        token: Token,
        /// The requested slot was full and the token landed elsewhere.
        reassigned: bool,
    },
    Waitlisted {
        token: Token,
        /// Length of the global waiting list after the append.
        waiting_position: usize,
        /// Rank among waiting tokens of the same doctor.
        doctor_waiting_position: usize,
    },
}

impl AllocationOutcome {
    pub fn token(&self) -> &Token {
        match self {
            AllocationOutcome::Allocated { token, .. } => token,
            AllocationOutcome::Waitlisted { token, .. } => token,
        }
    }

    pub fn is_allocated(&self) -> bool {
        matches!(self, AllocationOutcome::Allocated { .. })
    }
}

/// Outcome of cancel, complete and no-show: the released token and whoever took its place.
#[derive(Debug, Clone, Serialize)]
pub struct TokenReleaseOutcome {
    pub token: Token,
    pub reallocated: Option<Token>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyOutcome {
    pub token: Token,
    pub displaced_patient_id: Option<String>,
    pub displaced_token: Option<Token>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelayOutcome {
    pub doctor_id: String,
    pub slot_time: String,
    pub delay_minutes: u32,
    pub affected_slots: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub slot_id: String,
    pub doctor_id: String,
    pub slot_time: String,
    pub capacity: u32,
    pub allocated: u32,
    pub available: i64,
    pub status: SlotStatus,
    pub delay_minutes: u32,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSnapshot {
    pub doctor_id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub slot_duration: u32,
    pub avg_consultation_time: u32,
    pub total_capacity: u32,
    pub allocated: u32,
    pub utilization: f64,
    pub slots: Vec<SlotSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub doctor_id: String,
    pub name: String,
    pub allocated: u32,
    pub capacity: u32,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub total_doctors: usize,
    pub total_tokens: usize,
    pub waiting_list: usize,
    pub doctors: Vec<DoctorSummary>,
}
