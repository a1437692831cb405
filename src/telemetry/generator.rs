//! Time-of-day aware synthetic telemetry generator.
//!
//! Produces one reading per floor per tick. Occupancy follows office hours,
//! temperature tracks occupancy, humidity is drawn from tiered buckets and
//! power is derived from the other two. Each metric carries low-probability
//! overrides so every alert tier shows up in a normal run.

use chrono::{DateTime, Local, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{round_to, FloorHistory, FloorId, FloorReading};

const TEMPERATURE_MIN: f64 = 18.0;
const TEMPERATURE_MAX: f64 = 32.0;

const POWER_BASE: f64 = 60.0;
const POWER_PER_PERSON: f64 = 0.8;
const POWER_PER_DEGREE: f64 = 3.0;
const POWER_SPIKE_PROBABILITY: f64 = 0.12;
const POWER_SPIKE_FACTOR: f64 = 1.3;

struct FloorState {
    current: FloorReading,
    history: FloorHistory,
}

/// Owns the per-floor state and bounded history. Single writer: callers must
/// serialize `generate` calls.
pub struct TelemetryGenerator {
    rng: StdRng,
    building_name: String,
    history_cap: usize,
    floors: Vec<FloorState>,
}

impl TelemetryGenerator {
    /// Build a generator seeded with `floor_count` floors. A fixed `seed`
    /// makes the sample stream reproducible.
    pub fn new(
        floor_count: u32,
        building_name: impl Into<String>,
        history_cap: usize,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut generator = Self {
            rng,
            building_name: building_name.into(),
            history_cap,
            floors: Vec::new(),
        };
        generator.initialize(floor_count);
        generator
    }

    /// Reset to `floor_count` floors, each with an initial reading and an
    /// empty history.
    pub fn initialize(&mut self, floor_count: u32) {
        let now = Utc::now();
        let hour = local_hour(now);
        self.floors = (1..=floor_count)
            .map(|floor_id| FloorState {
                current: self.sample(floor_id, hour, now),
                history: FloorHistory::with_capacity(self.history_cap),
            })
            .collect();
        debug!(floors = floor_count, building = %self.building_name, "telemetry initialized");
    }

    /// Sample every floor at the current instant.
    pub fn generate(&mut self) -> Vec<FloorReading> {
        self.generate_at(Utc::now())
    }

    /// Sample every floor at `now`, append to history and return the new
    /// readings ordered by floor id.
    pub fn generate_at(&mut self, now: DateTime<Utc>) -> Vec<FloorReading> {
        let hour = local_hour(now);
        let mut readings = Vec::with_capacity(self.floors.len());
        for idx in 0..self.floors.len() {
            let floor_id = self.floors[idx].current.floor_id;
            let reading = self.sample(floor_id, hour, now);
            let state = &mut self.floors[idx];
            state.history.push(reading.clone());
            state.current = reading.clone();
            readings.push(reading);
        }
        readings
    }

    /// Latest reading per floor.
    pub fn current_data(&self) -> Vec<FloorReading> {
        self.floors.iter().map(|f| f.current.clone()).collect()
    }

    /// Most recent `limit` readings for a floor, chronological. Unknown floors
    /// and a zero limit yield nothing.
    pub fn floor_history(&self, floor_id: FloorId, limit: usize) -> Vec<FloorReading> {
        if limit == 0 {
            return Vec::new();
        }
        self.floor(floor_id)
            .map(|f| f.history.recent(limit))
            .unwrap_or_default()
    }

    pub fn history_len(&self, floor_id: FloorId) -> usize {
        self.floor(floor_id).map(|f| f.history.len()).unwrap_or(0)
    }

    pub fn floor_count(&self) -> usize {
        self.floors.len()
    }

    pub fn building_name(&self) -> &str {
        &self.building_name
    }

    /// Drop every floor's history, keeping the current readings.
    pub fn clear_history(&mut self) {
        for floor in &mut self.floors {
            floor.history.clear();
        }
    }

    fn floor(&self, floor_id: FloorId) -> Option<&FloorState> {
        self.floors.iter().find(|f| f.current.floor_id == floor_id)
    }

    fn sample(&mut self, floor_id: FloorId, hour: u32, now: DateTime<Utc>) -> FloorReading {
        let occupancy = sample_occupancy(&mut self.rng, hour);
        let temperature = sample_temperature(&mut self.rng, occupancy);
        let humidity = sample_humidity(&mut self.rng);
        let power_consumption = sample_power(&mut self.rng, occupancy, temperature);
        FloorReading {
            floor_id,
            name: format!("Floor {}", floor_id),
            occupancy,
            temperature,
            humidity,
            power_consumption,
            timestamp: now,
        }
    }
}

fn local_hour(now: DateTime<Utc>) -> u32 {
    now.with_timezone(&Local).hour()
}

/// Office-hours occupancy with a daytime critical override.
pub(crate) fn sample_occupancy<R: Rng>(rng: &mut R, hour: u32) -> u32 {
    let mut occupancy = match hour {
        9..=12 => 60.0 + rng.gen::<f64>() * 35.0,
        13..=14 => 30.0 + rng.gen::<f64>() * 25.0,
        15..=18 => 50.0 + rng.gen::<f64>() * 40.0,
        h if h >= 19 || h <= 6 => 5.0 + rng.gen::<f64>() * 20.0,
        _ => 20.0 + rng.gen::<f64>() * 35.0,
    };

    if rng.gen::<f64>() < 0.15 && (9..=18).contains(&hour) {
        occupancy = 90.0 + rng.gen::<f64>() * 10.0;
    }

    occupancy.round().max(0.0) as u32
}

/// Base temperature plus occupancy heat, with critical/warning/info
/// overrides drawn in that order.
pub(crate) fn sample_temperature<R: Rng>(rng: &mut R, occupancy: u32) -> f64 {
    let base = 20.0 + rng.gen::<f64>() * 4.0;
    let occupancy_effect = (occupancy as f64 / 100.0) * 3.0;
    let mut temperature = base + occupancy_effect;

    if rng.gen::<f64>() < 0.10 {
        temperature = 29.5 + rng.gen::<f64>() * 2.5;
    } else if rng.gen::<f64>() < 0.08 {
        temperature = 28.0 + rng.gen::<f64>() * 1.4;
    } else if rng.gen::<f64>() < 0.12 {
        temperature = 26.0 + rng.gen::<f64>() * 1.9;
    }

    round_to(temperature.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX), 1)
}

/// Eight bands from a single draw; 56% lands in the 30-70% comfort band.
pub(crate) fn sample_humidity<R: Rng>(rng: &mut R) -> u32 {
    let r = rng.gen::<f64>();
    let spread = rng.gen::<f64>();
    let humidity = if r < 0.08 {
        81.0 + spread * 4.0
    } else if r < 0.15 {
        76.0 + spread * 4.0
    } else if r < 0.25 {
        71.0 + spread * 4.0
    } else if r < 0.30 {
        15.0 + spread * 5.0
    } else if r < 0.36 {
        20.0 + spread * 2.0
    } else if r < 0.44 {
        22.0 + spread * 3.0
    } else {
        30.0 + spread * 40.0
    };
    humidity.round() as u32
}

pub(crate) fn sample_power<R: Rng>(rng: &mut R, occupancy: u32, temperature: f64) -> f64 {
    let mut power =
        POWER_BASE + occupancy as f64 * POWER_PER_PERSON + temperature * POWER_PER_DEGREE;
    if rng.gen::<f64>() < POWER_SPIKE_PROBABILITY {
        power *= POWER_SPIKE_FACTOR;
    }
    round_to(power.max(0.0), 2)
}
