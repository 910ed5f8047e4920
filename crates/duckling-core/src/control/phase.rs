//! Reference motion phase generator

use std::f64::consts::TAU;

use crate::neural::PHASE_DIM;
use crate::{Error, Result};

/// Base frequency factor when walking normally
pub const DEFAULT_FREQUENCY_FACTOR: f64 = 1.0;

/// Base frequency factor while the sprint button is held
pub const SPRINT_FREQUENCY_FACTOR: f64 = 1.3;

/// Offset change applied per d-pad press
pub const OFFSET_STEP: f64 = 0.05;

/// Cyclic gait phase
///
/// The counter is real-valued so fractional frequency factors advance it
/// smoothly; it always stays in `[0, steps_in_period)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseGenerator {
    counter: f64,
    steps_in_period: f64,
    frequency_factor: f64,
    frequency_offset: f64,
}

impl PhaseGenerator {
    /// Create a generator for a period of `steps_in_period` ticks
    pub fn new(steps_in_period: usize, frequency_offset: f64) -> Result<Self> {
        if steps_in_period == 0 {
            return Err(Error::Config("phase period must be at least one step".into()));
        }
        if !frequency_offset.is_finite() {
            return Err(Error::Config(format!(
                "phase frequency offset must be finite, got {}",
                frequency_offset
            )));
        }
        Ok(Self {
            counter: 0.0,
            steps_in_period: steps_in_period as f64,
            frequency_factor: DEFAULT_FREQUENCY_FACTOR,
            frequency_offset,
        })
    }

    /// Advance one tick and return the new phase features
    pub fn advance(&mut self) -> [f64; PHASE_DIM] {
        let step = self.frequency_factor + self.frequency_offset;
        let mut counter = (self.counter + step).rem_euclid(self.steps_in_period);
        // rem_euclid can round up to the modulus for tiny negative inputs
        if counter >= self.steps_in_period {
            counter = 0.0;
        }
        self.counter = counter;
        self.features()
    }

    /// `(cos, sin)` of the current phase angle
    pub fn features(&self) -> [f64; PHASE_DIM] {
        let angle = self.counter / self.steps_in_period * TAU;
        [angle.cos(), angle.sin()]
    }

    pub fn counter(&self) -> f64 {
        self.counter
    }

    pub fn steps_in_period(&self) -> f64 {
        self.steps_in_period
    }

    pub fn frequency_factor(&self) -> f64 {
        self.frequency_factor
    }

    /// Switch the base factor between normal and sprint cadence
    pub fn set_sprint(&mut self, sprint: bool) {
        self.frequency_factor = if sprint {
            SPRINT_FREQUENCY_FACTOR
        } else {
            DEFAULT_FREQUENCY_FACTOR
        };
    }

    pub fn frequency_offset(&self) -> f64 {
        self.frequency_offset
    }

    /// Shift the runtime frequency offset
    pub fn nudge_offset(&mut self, delta: f64) {
        self.frequency_offset += delta;
        tracing::info!(
            "Phase frequency factor offset {:.3}",
            self.frequency_offset
        );
    }

    /// Effective per-tick increment
    pub fn effective_frequency(&self) -> f64 {
        self.frequency_factor + self.frequency_offset
    }
}
