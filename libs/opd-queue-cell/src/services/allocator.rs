use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use shared_config::{AppConfig, DEFAULT_SLOT_CAPACITY};
use shared_utils::{Clock, IdGenerator, SystemClock, UuidIdGenerator};

use crate::error::OpdQueueError;
use crate::models::{
    AllocateTokenRequest, AllocationOutcome, DelayOutcome, DoctorSchedule, DoctorSnapshot,
    DoctorSummary, EmergencyOutcome, EmergencyTokenRequest, EngineStatus, RegisterDoctorRequest,
    Slot, SlotSnapshot, Token, TokenReleaseOutcome, TokenSource, TokenStatus,
    DEFAULT_CANCELLATION_REASON, EMERGENCY_PRIORITY_ADJUSTMENT,
};
use crate::services::schedule::format_time;

/// The engine is synchronous; callers on a concurrent boundary share it behind one lock.
pub type SharedEngine = Arc<Mutex<AllocationEngine>>;

/// Owns every doctor schedule, the registry of all tokens ever created and the
/// single waiting list shared by all doctors. All mutation goes through here.
///
/// Doctor and slot lookups are linear scans over small ordered vectors.
pub struct AllocationEngine {
    doctors: Vec<DoctorSchedule>,
    tokens: HashMap<String, Token>,
    registration_order: Vec<String>,
    waiting_list: Vec<String>,
    default_slot_capacity: u32,
    ids: Box<dyn IdGenerator>,
    clock: Box<dyn Clock>,
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AllocationEngine {
    pub fn new() -> Self {
        Self {
            doctors: Vec::new(),
            tokens: HashMap::new(),
            registration_order: Vec::new(),
            waiting_list: Vec::new(),
            default_slot_capacity: DEFAULT_SLOT_CAPACITY,
            ids: Box::new(UuidIdGenerator),
            clock: Box::new(SystemClock),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new().with_default_capacity(config.default_slot_capacity)
    }

    pub fn with_default_capacity(mut self, capacity: u32) -> Self {
        self.default_slot_capacity = capacity;
        self
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    // ==========================================================================
    // REGISTRATION AND LOOKUP
    // ==========================================================================

    pub fn register_doctor(&mut self, request: RegisterDoctorRequest) -> Result<DoctorSnapshot, OpdQueueError> {
        if self.doctors.iter().any(|d| d.doctor_id == request.doctor_id) {
            return Err(OpdQueueError::DuplicateDoctor(request.doctor_id));
        }

        let schedule = DoctorSchedule::new(&request, self.default_slot_capacity)?;
        info!(
            "Registered doctor {} ({}) with {} slots, total capacity {}",
            schedule.doctor_id,
            schedule.name,
            schedule.slots.len(),
            schedule.total_capacity()
        );

        let snapshot = self.snapshot_doctor(&schedule);
        self.doctors.push(schedule);
        Ok(snapshot)
    }

    pub fn doctor(&self, doctor_id: &str) -> Option<&DoctorSchedule> {
        self.doctors.iter().find(|d| d.doctor_id == doctor_id)
    }

    pub fn doctors(&self) -> &[DoctorSchedule] {
        &self.doctors
    }

    fn doctor_index(&self, doctor_id: &str) -> Result<usize, OpdQueueError> {
        self.doctors
            .iter()
            .position(|d| d.doctor_id == doctor_id)
            .ok_or_else(|| OpdQueueError::DoctorNotFound(doctor_id.to_string()))
    }

    fn slot_index(&self, doctor_idx: usize, slot_time: &str) -> Result<usize, OpdQueueError> {
        let schedule = &self.doctors[doctor_idx];
        schedule.slot_index(slot_time).ok_or_else(|| OpdQueueError::SlotNotFound {
            doctor_id: schedule.doctor_id.clone(),
            slot_time: slot_time.to_string(),
        })
    }

    pub fn get_token(&self, token_id: &str) -> Result<Token, OpdQueueError> {
        self.tokens
            .get(token_id)
            .cloned()
            .ok_or_else(|| OpdQueueError::TokenNotFound(token_id.to_string()))
    }

    /// Every token ever created, in creation order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.registration_order.iter().filter_map(|id| self.tokens.get(id))
    }

    pub fn waiting_list(&self) -> Vec<Token> {
        self.waiting_list
            .iter()
            .filter_map(|id| self.tokens.get(id).cloned())
            .collect()
    }

    fn register_token(&mut self, token: Token) -> String {
        let token_id = token.token_id.clone();
        self.registration_order.push(token_id.clone());
        self.tokens.insert(token_id.clone(), token);
        token_id
    }

    fn new_token(
        &self,
        patient_id: &str,
        patient_name: &str,
        doctor_id: &str,
        slot_time: &str,
        source: TokenSource,
        priority_adjustment: i64,
    ) -> Token {
        Token::new(
            self.ids.next_id(),
            patient_id,
            patient_name,
            doctor_id,
            slot_time,
            source,
            priority_adjustment,
            self.clock.now(),
        )
    }

    // ==========================================================================
    // ALLOCATION
    // ==========================================================================

    /// Direct allocation, then alternative-slot search, then the waiting list.
    pub fn allocate_token(&mut self, request: AllocateTokenRequest) -> Result<AllocationOutcome, OpdQueueError> {
        request.validate()?;
        let doctor_idx = self.doctor_index(&request.doctor_id)?;
        let requested_idx = self.slot_index(doctor_idx, &request.slot_time)?;

        let mut token = self.new_token(
            &request.patient_id,
            &request.patient_name,
            &request.doctor_id,
            &request.slot_time,
            request.source,
            request.priority_adjustment,
        );

        let schedule = &self.doctors[doctor_idx];
        let target = if schedule.slots[requested_idx].has_capacity() {
            Some((requested_idx, false))
        } else {
            find_alternative_slot(&schedule.slots, requested_idx).map(|idx| (idx, true))
        };

        match target {
            Some((slot_idx, reassigned)) => {
                let token_id = self.register_token(token);
                admit_token(&mut self.doctors[doctor_idx], slot_idx, &token_id, &mut self.tokens);
                let token = self.get_token(&token_id)?;

                if reassigned {
                    info!(
                        "Slot {} of {} full, token {} reassigned to {}",
                        request.slot_time, request.doctor_id, token.token_id, token.slot_time
                    );
                } else {
                    info!(
                        "Token {} allocated to {} at {} as #{}",
                        token.token_id,
                        token.doctor_id,
                        token.slot_time,
                        token.token_number.unwrap_or_default()
                    );
                }

                Ok(AllocationOutcome::Allocated { token, reassigned })
            }
            None => {
                token.status = TokenStatus::Waiting;
                let token_id = self.register_token(token);
                self.waiting_list.push(token_id.clone());

                let waiting_position = self.waiting_list.len();
                let doctor_waiting_position = self.doctor_waiting_count(&request.doctor_id);
                warn!(
                    "All slots of {} full, token {} waitlisted at position {}",
                    request.doctor_id, token_id, waiting_position
                );

                Ok(AllocationOutcome::Waitlisted {
                    token: self.get_token(&token_id)?,
                    waiting_position,
                    doctor_waiting_position,
                })
            }
        }
    }

    fn doctor_waiting_count(&self, doctor_id: &str) -> usize {
        self.waiting_list
            .iter()
            .filter_map(|id| self.tokens.get(id))
            .filter(|t| t.doctor_id == doctor_id)
            .count()
    }

    // ==========================================================================
    // RELEASE: CANCEL, COMPLETE, NO-SHOW
    // ==========================================================================

    /// Cancels a token and offers the freed capacity to the waiting list.
    ///
    /// A waiting token is simply dropped from the waiting list. Tokens already
    /// cancelled, completed or marked no-show are returned unchanged.
    pub fn cancel_token(&mut self, token_id: &str, reason: Option<String>) -> Result<TokenReleaseOutcome, OpdQueueError> {
        let token = self.get_token(token_id)?;
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());
        let now = self.clock.now();
        let status = token.status;

        match status {
            TokenStatus::Allocated => {
                let (doctor_idx, slot_idx) = self.release_from_slot(&token)?;
                if let Some(t) = self.tokens.get_mut(token_id) {
                    t.cancel(reason.clone(), now);
                }
                info!("Token {} cancelled: {}", token_id, reason);

                let reallocated = self.reallocate_from_waiting_list(doctor_idx, slot_idx);
                Ok(TokenReleaseOutcome {
                    token: self.get_token(token_id)?,
                    reallocated,
                })
            }
            TokenStatus::Waiting => {
                self.waiting_list.retain(|id| id != token_id);
                if let Some(t) = self.tokens.get_mut(token_id) {
                    t.cancel(reason.clone(), now);
                }
                info!("Waiting token {} cancelled: {}", token_id, reason);

                Ok(TokenReleaseOutcome {
                    token: self.get_token(token_id)?,
                    reallocated: None,
                })
            }
            _ => {
                debug!("Token {} already {}, cancellation is a no-op", token_id, status);
                Ok(TokenReleaseOutcome { token, reallocated: None })
            }
        }
    }

    pub fn complete_token(&mut self, token_id: &str) -> Result<TokenReleaseOutcome, OpdQueueError> {
        self.finish_token(token_id, TokenStatus::Completed)
    }

    pub fn mark_no_show(&mut self, token_id: &str) -> Result<TokenReleaseOutcome, OpdQueueError> {
        self.finish_token(token_id, TokenStatus::NoShow)
    }

    fn finish_token(&mut self, token_id: &str, target: TokenStatus) -> Result<TokenReleaseOutcome, OpdQueueError> {
        let token = self.get_token(token_id)?;
        if !token.status.can_transition_to(&target) {
            return Err(OpdQueueError::InvalidStatusTransition {
                from: token.status.to_string(),
                to: target.to_string(),
            });
        }

        let (doctor_idx, slot_idx) = self.release_from_slot(&token)?;
        let now = self.clock.now();
        if let Some(t) = self.tokens.get_mut(token_id) {
            match target {
                TokenStatus::Completed => t.complete(now),
                _ => t.mark_no_show(now),
            }
        }
        info!("Token {} of {} marked {}", token_id, token.doctor_id, target);

        let reallocated = self.reallocate_from_waiting_list(doctor_idx, slot_idx);
        Ok(TokenReleaseOutcome {
            token: self.get_token(token_id)?,
            reallocated,
        })
    }

    /// Removes an allocated token from the slot named by its doctor id and label.
    fn release_from_slot(&mut self, token: &Token) -> Result<(usize, usize), OpdQueueError> {
        let doctor_idx = self.doctor_index(&token.doctor_id)?;
        let slot_idx = self.slot_index(doctor_idx, &token.slot_time)?;

        let schedule = &mut self.doctors[doctor_idx];
        if schedule.slots[slot_idx].remove_token(&token.token_id) {
            refresh_slot(schedule, slot_idx, &mut self.tokens);
        } else {
            warn!(
                "Token {} was not a member of slot {} of {}",
                token.token_id, token.slot_time, token.doctor_id
            );
        }
        Ok((doctor_idx, slot_idx))
    }

    /// Admits the highest-priority waiting token of this doctor into the slot.
    /// Ties go to whoever joined the waiting list first.
    fn reallocate_from_waiting_list(&mut self, doctor_idx: usize, slot_idx: usize) -> Option<Token> {
        let schedule = &mut self.doctors[doctor_idx];
        if !schedule.slots[slot_idx].has_capacity() {
            return None;
        }

        let mut best: Option<(usize, i64)> = None;
        for (position, id) in self.waiting_list.iter().enumerate() {
            let Some(candidate) = self.tokens.get(id) else {
                continue;
            };
            if candidate.doctor_id != schedule.doctor_id {
                continue;
            }
            if best.map_or(true, |(_, score)| candidate.priority > score) {
                best = Some((position, candidate.priority));
            }
        }

        let (position, _) = best?;
        let token_id = self.waiting_list.remove(position);
        admit_token(schedule, slot_idx, &token_id, &mut self.tokens);

        let token = self.tokens.get(&token_id).cloned();
        if let Some(t) = &token {
            info!(
                "Reallocated waiting token {} ({}) into {} of {}",
                t.token_id, t.patient_name, t.slot_time, t.doctor_id
            );
        }
        token
    }

    // ==========================================================================
    // EMERGENCY
    // ==========================================================================

    /// Inserts a top-priority token, preempting the lowest-priority occupant
    /// of the target slot when the doctor has no free capacity anywhere.
    ///
    /// A preferred label matching none of the doctor's slots counts as no preference.
    pub fn insert_emergency_token(&mut self, request: EmergencyTokenRequest) -> Result<EmergencyOutcome, OpdQueueError> {
        request.validate()?;
        let doctor_idx = self.doctor_index(&request.doctor_id)?;

        let schedule = &self.doctors[doctor_idx];
        let preferred_idx = request
            .preferred_slot
            .as_deref()
            .and_then(|label| schedule.slot_index(label));
        if let (Some(label), None) = (&request.preferred_slot, preferred_idx) {
            debug!("Preferred slot {} unknown for {}, ignoring preference", label, request.doctor_id);
        }

        let open_slot = preferred_idx
            .filter(|&idx| schedule.slots[idx].has_capacity())
            .or_else(|| schedule.slots.iter().position(Slot::has_capacity));

        if let Some(slot_idx) = open_slot {
            let slot_time = schedule.slots[slot_idx].slot_time.clone();
            let token = self.new_token(
                &request.patient_id,
                &request.patient_name,
                &request.doctor_id,
                &slot_time,
                TokenSource::Priority,
                EMERGENCY_PRIORITY_ADJUSTMENT,
            );
            let token_id = self.register_token(token);
            admit_token(&mut self.doctors[doctor_idx], slot_idx, &token_id, &mut self.tokens);
            info!("Emergency token {} inserted into {} of {}", token_id, slot_time, request.doctor_id);

            return Ok(EmergencyOutcome {
                token: self.get_token(&token_id)?,
                displaced_patient_id: None,
                displaced_token: None,
            });
        }

        self.force_insert_emergency(doctor_idx, preferred_idx.unwrap_or(0), &request)
    }

    fn force_insert_emergency(
        &mut self,
        doctor_idx: usize,
        target_idx: usize,
        request: &EmergencyTokenRequest,
    ) -> Result<EmergencyOutcome, OpdQueueError> {
        let emergency_score = TokenSource::Priority.priority_score(EMERGENCY_PRIORITY_ADJUSTMENT);
        let target_label = self.doctors[doctor_idx].slots[target_idx].slot_time.clone();

        let victim = lowest_priority_occupant(&self.doctors[doctor_idx].slots[target_idx], &self.tokens)
            .filter(|(_, score)| emergency_score > *score);
        let Some((victim_id, victim_score)) = victim else {
            warn!(
                "Emergency preemption denied in {} of {}: no occupant below {}",
                target_label, request.doctor_id, emergency_score
            );
            return Err(OpdQueueError::EmergencyPreemptionDenied {
                doctor_id: request.doctor_id.clone(),
                slot_time: target_label,
                emergency_score,
            });
        };

        let token = self.new_token(
            &request.patient_id,
            &request.patient_name,
            &request.doctor_id,
            &target_label,
            TokenSource::Priority,
            EMERGENCY_PRIORITY_ADJUSTMENT,
        );

        let schedule = &mut self.doctors[doctor_idx];
        schedule.slots[target_idx].remove_token(&victim_id);
        refresh_slot(schedule, target_idx, &mut self.tokens);

        match find_alternative_slot(&schedule.slots, target_idx) {
            Some(relocated_idx) => {
                admit_token(schedule, relocated_idx, &victim_id, &mut self.tokens);
                info!(
                    "Displaced token {} (score {}) relocated to {}",
                    victim_id, victim_score, schedule.slots[relocated_idx].slot_time
                );
            }
            None => {
                if let Some(t) = self.tokens.get_mut(&victim_id) {
                    t.demote_to_waiting();
                }
                self.waiting_list.push(victim_id.clone());
                warn!(
                    "Displaced token {} (score {}) moved to waiting list at position {}",
                    victim_id,
                    victim_score,
                    self.waiting_list.len()
                );
            }
        }

        let token_id = self.register_token(token);
        admit_token(&mut self.doctors[doctor_idx], target_idx, &token_id, &mut self.tokens);
        info!(
            "Emergency token {} inserted into {} of {} by displacing {}",
            token_id, target_label, request.doctor_id, victim_id
        );

        let displaced = self.get_token(&victim_id)?;
        Ok(EmergencyOutcome {
            token: self.get_token(&token_id)?,
            displaced_patient_id: Some(displaced.patient_id.clone()),
            displaced_token: Some(displaced),
        })
    }

    // ==========================================================================
    // DELAY
    // ==========================================================================

    /// Adds `minutes` to the named slot and every later slot of the doctor.
    pub fn add_delay(&mut self, doctor_id: &str, slot_time: &str, minutes: u32) -> Result<DelayOutcome, OpdQueueError> {
        let doctor_idx = self.doctor_index(doctor_id)?;
        let start_idx = self.slot_index(doctor_idx, slot_time)?;

        let schedule = &mut self.doctors[doctor_idx];
        for slot in &mut schedule.slots[start_idx..] {
            slot.add_delay(minutes);
        }
        for slot_idx in 0..schedule.slots.len() {
            refresh_slot(schedule, slot_idx, &mut self.tokens);
        }

        let affected_slots = schedule.slots.len() - start_idx;
        info!(
            "Delay of {} minutes added at {} for {}, {} slots affected",
            minutes, slot_time, doctor_id, affected_slots
        );

        Ok(DelayOutcome {
            doctor_id: doctor_id.to_string(),
            slot_time: slot_time.to_string(),
            delay_minutes: minutes,
            affected_slots,
        })
    }

    // ==========================================================================
    // VIEWS
    // ==========================================================================

    pub fn list_doctors(&self) -> Vec<DoctorSummary> {
        self.doctors.iter().map(DoctorSchedule::summary).collect()
    }

    pub fn doctor_snapshot(&self, doctor_id: &str) -> Result<DoctorSnapshot, OpdQueueError> {
        let doctor_idx = self.doctor_index(doctor_id)?;
        Ok(self.snapshot_doctor(&self.doctors[doctor_idx]))
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            total_doctors: self.doctors.len(),
            total_tokens: self.tokens.len(),
            waiting_list: self.waiting_list.len(),
            doctors: self.list_doctors(),
        }
    }

    fn snapshot_doctor(&self, schedule: &DoctorSchedule) -> DoctorSnapshot {
        DoctorSnapshot {
            doctor_id: schedule.doctor_id.clone(),
            name: schedule.name.clone(),
            start_time: schedule.start_time.clone(),
            end_time: schedule.end_time.clone(),
            slot_duration: schedule.slot_duration,
            avg_consultation_time: schedule.avg_consultation_time,
            total_capacity: schedule.total_capacity(),
            allocated: schedule.allocated_tokens(),
            utilization: schedule.utilization(),
            slots: schedule.slots.iter().map(|s| self.snapshot_slot(s)).collect(),
        }
    }

    fn snapshot_slot(&self, slot: &Slot) -> SlotSnapshot {
        SlotSnapshot {
            slot_id: slot.slot_id.clone(),
            doctor_id: slot.doctor_id.clone(),
            slot_time: slot.slot_time.clone(),
            capacity: slot.capacity,
            allocated: slot.allocated(),
            available: slot.available(),
            status: slot.status(),
            delay_minutes: slot.delay_minutes,
            tokens: slot
                .token_ids()
                .iter()
                .filter_map(|id| self.tokens.get(id).cloned())
                .collect(),
        }
    }
}

/// First slot with capacity strictly after `anchor`, else strictly before it
/// scanning backwards. Forward always wins regardless of distance.
pub fn find_alternative_slot(slots: &[Slot], anchor: usize) -> Option<usize> {
    let forward = (anchor + 1..slots.len()).find(|&idx| slots[idx].has_capacity());
    forward.or_else(|| (0..anchor.min(slots.len())).rev().find(|&idx| slots[idx].has_capacity()))
}

/// Lowest-scoring member of the slot. Among equal scores the latest arrival loses.
fn lowest_priority_occupant(slot: &Slot, tokens: &HashMap<String, Token>) -> Option<(String, i64)> {
    let mut lowest: Option<(String, i64)> = None;
    for id in slot.token_ids() {
        let Some(token) = tokens.get(id) else {
            continue;
        };
        if lowest.as_ref().map_or(true, |(_, score)| token.priority <= *score) {
            lowest = Some((id.clone(), token.priority));
        }
    }
    lowest
}

/// The single point where tokens enter a slot. Callers check capacity first.
fn admit_token(schedule: &mut DoctorSchedule, slot_idx: usize, token_id: &str, tokens: &mut HashMap<String, Token>) {
    let slot = &mut schedule.slots[slot_idx];
    slot.push_token(token_id.to_string());
    if let Some(token) = tokens.get_mut(token_id) {
        token.status = TokenStatus::Allocated;
        token.slot_time = slot.slot_time.clone();
    }
    refresh_slot(schedule, slot_idx, tokens);
}

fn refresh_slot(schedule: &DoctorSchedule, slot_idx: usize, tokens: &mut HashMap<String, Token>) {
    let slot = &schedule.slots[slot_idx];
    renumber_tokens(slot, tokens);
    recompute_estimated_times(slot, schedule.avg_consultation_time, tokens);
}

fn renumber_tokens(slot: &Slot, tokens: &mut HashMap<String, Token>) {
    for (index, id) in slot.token_ids().iter().enumerate() {
        if let Some(token) = tokens.get_mut(id) {
            token.token_number = Some(index as u32 + 1);
        }
    }
}

// slot start + position * average consultation + accumulated delay
fn recompute_estimated_times(slot: &Slot, avg_consultation_time: u32, tokens: &mut HashMap<String, Token>) {
    for (index, id) in slot.token_ids().iter().enumerate() {
        if let Some(token) = tokens.get_mut(id) {
            let minutes = slot
                .start_minutes
                .saturating_add((index as u32).saturating_mul(avg_consultation_time))
                .saturating_add(slot.delay_minutes);
            token.estimated_time = Some(format_time(minutes));
        }
    }
}
