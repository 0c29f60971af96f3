use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_SLOT_CAPACITY: u32 = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub default_slot_capacity: u32,
    pub seed_sample_doctors: bool,
    pub simulation_seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            default_slot_capacity: DEFAULT_SLOT_CAPACITY,
            seed_sample_doctors: true,
            simulation_seed: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            host: env::var("OPD_HOST")
                .unwrap_or_else(|_| {
                    warn!("OPD_HOST not set, using {}", defaults.host);
                    defaults.host.clone()
                }),
            port: parse_var("OPD_PORT", defaults.port),
            default_slot_capacity: parse_var("OPD_SLOT_CAPACITY", defaults.default_slot_capacity),
            seed_sample_doctors: parse_var("OPD_SEED_SAMPLE_DOCTORS", defaults.seed_sample_doctors),
            simulation_seed: env::var("SIMULATION_SEED")
                .ok()
                .and_then(|raw| match raw.parse() {
                    Ok(seed) => Some(seed),
                    Err(_) => {
                        warn!("SIMULATION_SEED '{}' is not a valid u64, ignoring", raw);
                        None
                    }
                }),
        };

        if !config.is_valid() {
            warn!("OPD_SLOT_CAPACITY must be at least 1 - doctor registration without an explicit capacity will fail");
        }

        config
    }

    pub fn is_valid(&self) -> bool {
        self.default_slot_capacity > 0
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {}", name, default);
            default
        }
    }
}
