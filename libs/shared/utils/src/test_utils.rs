use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

use shared_config::AppConfig;

use crate::clock::Clock;
use crate::ids::IdGenerator;

pub struct TestConfig {
    pub default_slot_capacity: u32,
    pub seed_sample_doctors: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            default_slot_capacity: 6,
            seed_sample_doctors: false,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            default_slot_capacity: self.default_slot_capacity,
            seed_sample_doctors: self.seed_sample_doctors,
            simulation_seed: Some(42),
        }
    }
}

/// Hands out `{prefix}-0001`, `{prefix}-0002`, ... in call order.
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new("TKN")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{:04}", self.prefix, n)
    }
}

/// Clock that starts at a fixed instant and advances one second per reading.
pub struct FixedClock {
    start: DateTime<Utc>,
    ticks: AtomicU64,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            ticks: AtomicU64::new(0),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::seconds(tick as i64)
    }
}
