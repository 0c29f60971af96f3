use rand::{
    rngs::StdRng,
    seq::SliceRandom,
    Rng, SeedableRng,
};
use tracing::{debug, info};

use opd_queue_cell::{
    AllocateTokenRequest, AllocationEngine, AllocationOutcome, EmergencyTokenRequest, OpdQueueError,
    TokenSource, TokenStatus,
};
use shared_config::AppConfig;

const FIRST_NAMES: [&str; 10] = [
    "Amit", "Priya", "Rahul", "Sneha", "Vikram", "Anita", "Rajesh", "Kavya", "Suresh", "Deepa",
];
const LAST_NAMES: [&str; 10] = [
    "Sharma", "Patel", "Kumar", "Singh", "Reddy", "Gupta", "Mehta", "Joshi", "Verma", "Rao",
];
const CANCELLATION_REASONS: [&str; 4] = [
    "Patient unavailable",
    "Rescheduled",
    "Emergency at home",
    "Feeling better",
];
const DELAY_CHOICES: [u32; 4] = [10, 15, 20, 30];

pub const ONLINE_BOOKINGS: usize = 20;
pub const WALK_INS: usize = 15;
pub const FOLLOW_UPS: usize = 10;
pub const CANCELLATIONS: usize = 7;
pub const EMERGENCIES: usize = 4;
pub const DELAYS: usize = 3;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SimulationStats {
    pub total_requests: usize,
    pub successful_allocations: usize,
    pub waitlisted: usize,
    pub cancellations: usize,
    pub reallocations: usize,
    pub emergencies: usize,
    pub displaced: usize,
    pub emergencies_denied: usize,
    pub delays: usize,
}

impl SimulationStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_allocations as f64 / self.total_requests as f64 * 100.0
    }
}

/// Doctor id, display name and slot labels, captured once after seeding.
struct DoctorRef {
    doctor_id: String,
    short_name: String,
    slot_times: Vec<String>,
}

pub struct Simulation {
    engine: AllocationEngine,
    rng: StdRng,
    stats: SimulationStats,
}

impl Simulation {
    pub fn new(config: &AppConfig) -> Self {
        let rng = match config.simulation_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            engine: AllocationEngine::from_config(config),
            rng,
            stats: SimulationStats::default(),
        }
    }

    pub fn engine(&self) -> &AllocationEngine {
        &self.engine
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn run(&mut self) -> Result<(), OpdQueueError> {
        let doctors = self.setup_doctors()?;

        self.simulate_bookings(&doctors, TokenSource::Online, ONLINE_BOOKINGS)?;
        self.simulate_bookings(&doctors, TokenSource::Walkin, WALK_INS)?;
        self.simulate_bookings(&doctors, TokenSource::Followup, FOLLOW_UPS)?;
        self.simulate_cancellations(CANCELLATIONS)?;
        self.simulate_emergencies(&doctors, EMERGENCIES)?;
        self.simulate_delays(&doctors, DELAYS)?;

        info!("Simulation finished: {:?}", self.stats);
        Ok(())
    }

    fn setup_doctors(&mut self) -> Result<Vec<DoctorRef>, OpdQueueError> {
        println!("\n--- Setting up doctors ---");
        self.engine.seed_sample_doctors()?;

        let doctors = self
            .engine
            .doctors()
            .iter()
            .map(|d| {
                println!("  + {} - slots: {}, capacity: {}", d.name, d.slots.len(), d.total_capacity());
                DoctorRef {
                    doctor_id: d.doctor_id.clone(),
                    short_name: d.name.split('(').next().unwrap_or(d.name.as_str()).trim().to_string(),
                    slot_times: d.slots.iter().map(|s| s.slot_time.clone()).collect(),
                }
            })
            .collect();
        Ok(doctors)
    }

    fn random_patient(&mut self) -> (String, String) {
        let first = FIRST_NAMES.choose(&mut self.rng).copied().unwrap_or("Amit");
        let last = LAST_NAMES.choose(&mut self.rng).copied().unwrap_or("Sharma");
        let id = format!("PAT{:04}", self.rng.gen_range(0..10_000));
        (id, format!("{} {}", first, last))
    }

    /// Picks a doctor and one of their slot labels at random.
    fn random_target<'a>(&mut self, doctors: &'a [DoctorRef]) -> Option<(&'a DoctorRef, String)> {
        let doctor = doctors.choose(&mut self.rng)?;
        let slot_time = doctor.slot_times.choose(&mut self.rng)?.clone();
        Some((doctor, slot_time))
    }

    fn simulate_bookings(&mut self, doctors: &[DoctorRef], source: TokenSource, count: usize) -> Result<(), OpdQueueError> {
        println!("\n--- Simulating {} {} bookings ---", count, source.as_str());

        for _ in 0..count {
            let Some((doctor, slot_time)) = self.random_target(doctors) else {
                break;
            };
            let (patient_id, patient_name) = self.random_patient();
            // follow-ups carry days since the last visit as their adjustment
            let priority_adjustment = match source {
                TokenSource::Followup => self.rng.gen_range(0..10),
                _ => 0,
            };

            let outcome = self.engine.allocate_token(AllocateTokenRequest {
                patient_id,
                patient_name: patient_name.clone(),
                doctor_id: doctor.doctor_id.clone(),
                slot_time: slot_time.clone(),
                source,
                priority_adjustment,
            })?;

            self.stats.total_requests += 1;
            match outcome {
                AllocationOutcome::Allocated { token, reassigned } => {
                    self.stats.successful_allocations += 1;
                    let note = if reassigned { format!(" (moved from {})", slot_time) } else { String::new() };
                    println!(
                        "  ok   {} - {} - {} - token #{}{}",
                        patient_name,
                        doctor.short_name,
                        token.slot_time,
                        token.token_number.unwrap_or_default(),
                        note
                    );
                }
                AllocationOutcome::Waitlisted { waiting_position, .. } => {
                    self.stats.waitlisted += 1;
                    println!("  wait {} - {} - waiting list #{}", patient_name, doctor.short_name, waiting_position);
                }
            }
        }
        Ok(())
    }

    fn simulate_cancellations(&mut self, count: usize) -> Result<(), OpdQueueError> {
        println!("\n--- Simulating cancellations ---");

        let allocated: Vec<String> = self
            .engine
            .tokens()
            .filter(|t| t.status == TokenStatus::Allocated)
            .map(|t| t.token_id.clone())
            .collect();
        if allocated.is_empty() {
            println!("  no allocated tokens to cancel");
            return Ok(());
        }

        let picked: Vec<String> = allocated.choose_multiple(&mut self.rng, count).cloned().collect();
        for token_id in picked {
            let reason = CANCELLATION_REASONS.choose(&mut self.rng).copied().unwrap_or("Rescheduled");
            let outcome = self.engine.cancel_token(&token_id, Some(reason.to_string()))?;

            self.stats.cancellations += 1;
            println!(
                "  x    {} - {} - reason: {}",
                outcome.token.patient_name, outcome.token.slot_time, reason
            );
            if let Some(reallocated) = outcome.reallocated {
                self.stats.reallocations += 1;
                println!("       -> reallocated from waiting list: {}", reallocated.patient_name);
            }
        }
        Ok(())
    }

    fn simulate_emergencies(&mut self, doctors: &[DoctorRef], count: usize) -> Result<(), OpdQueueError> {
        println!("\n--- Simulating emergency insertions ---");

        for _ in 0..count {
            let Some((doctor, preferred_slot)) = self.random_target(doctors) else {
                break;
            };
            let (patient_id, patient_name) = self.random_patient();
            self.stats.emergencies += 1;

            let result = self.engine.insert_emergency_token(EmergencyTokenRequest {
                patient_id,
                patient_name: patient_name.clone(),
                doctor_id: doctor.doctor_id.clone(),
                preferred_slot: Some(preferred_slot),
            });

            match result {
                Ok(outcome) => {
                    println!("  !!   EMERGENCY {} - {} - {}", patient_name, doctor.short_name, outcome.token.slot_time);
                    if let Some(moved) = outcome.displaced_patient_id {
                        self.stats.displaced += 1;
                        println!("       -> moved lower priority patient {}", moved);
                    }
                }
                Err(e @ OpdQueueError::EmergencyPreemptionDenied { .. }) => {
                    self.stats.emergencies_denied += 1;
                    debug!("{}", e);
                    println!("  !!   EMERGENCY {} - {} - denied, slot holds only emergencies", patient_name, doctor.short_name);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn simulate_delays(&mut self, doctors: &[DoctorRef], count: usize) -> Result<(), OpdQueueError> {
        println!("\n--- Simulating delays ---");

        for _ in 0..count {
            let Some((doctor, slot_time)) = self.random_target(doctors) else {
                break;
            };
            let minutes = DELAY_CHOICES.choose(&mut self.rng).copied().unwrap_or(10);

            let outcome = self.engine.add_delay(&doctor.doctor_id, &slot_time, minutes)?;
            self.stats.delays += 1;
            println!(
                "  +    {} - {} - {} mins - affects {} slots",
                doctor.short_name, slot_time, minutes, outcome.affected_slots
            );
        }
        Ok(())
    }
}
