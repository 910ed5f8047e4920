//! Digital filters for actuator command smoothing
//!
//! [`LowPassFilter`] is a scalar first-order filter; [`ActionFilter`] runs
//! one of them per joint over successive motor target vectors.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::{Error, Result};

/// Trait for digital filters
pub trait Filter: Send + Sync {
    /// Update the filter with a new value and return the filtered output
    fn update(&mut self, value: f64) -> f64;

    /// Reset the filter state
    fn reset(&mut self);

    /// Get the current filtered value without updating
    fn value(&self) -> f64;
}

/// First-order low-pass filter (exponential moving average)
///
/// Smooths high-frequency noise while allowing low-frequency signals through.
/// The first sample seeds the state, so a cold filter never ramps up from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowPassFilter {
    /// Weight of the newest sample (0-1). Lower = more smoothing.
    alpha: f64,
    /// Current filtered value
    value: f64,
    /// Whether the filter has been initialized
    initialized: bool,
}

impl LowPassFilter {
    /// Create a new low-pass filter with the given alpha coefficient
    ///
    /// # Panics
    /// Panics if alpha is not in range [0, 1]
    pub fn new(alpha: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&alpha),
            "Alpha must be between 0 and 1"
        );
        Self {
            alpha,
            value: 0.0,
            initialized: false,
        }
    }

    /// Create a low-pass filter from an RC cutoff frequency and sample rate
    pub fn from_cutoff(cutoff_hz: f64, sample_rate_hz: f64) -> Self {
        let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz);
        Self::from_time_constant(rc, sample_rate_hz)
    }

    /// Create a low-pass filter from a time constant (seconds) and sample rate
    ///
    /// `alpha = dt / (tau + dt)`.
    pub fn from_time_constant(tau: f64, sample_rate_hz: f64) -> Self {
        let dt = 1.0 / sample_rate_hz;
        Self::new(dt / (tau + dt))
    }

    /// Get the alpha coefficient
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Whether at least one sample has been seen
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Filter for LowPassFilter {
    fn update(&mut self, value: f64) -> f64 {
        if !self.initialized {
            self.value = value;
            self.initialized = true;
        } else {
            self.value = self.alpha * value + (1.0 - self.alpha) * self.value;
        }
        self.value
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.initialized = false;
    }

    fn value(&self) -> f64 {
        self.value
    }
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self::new(0.1)
    }
}

/// Number of raw samples retained by [`ActionFilter`]
const RECENT_SAMPLES: usize = 8;

/// Causal low-pass filter over multi-joint action samples
///
/// The time constant is `1 / cutoff_hz`, giving a new-sample weight of
/// `(1/f) / (1/f + 1/fc)` at control frequency `f`. A short ring of the most
/// recent unfiltered samples is kept alongside the per-joint states.
#[derive(Debug, Clone)]
pub struct ActionFilter {
    joints: Vec<LowPassFilter>,
    recent: VecDeque<Vec<f64>>,
    filtered: Vec<f64>,
    control_freq: f64,
    cutoff_hz: f64,
}

impl ActionFilter {
    /// Create a filter for `num_joints` channels
    pub fn new(num_joints: usize, control_freq: f64, cutoff_hz: f64) -> Result<Self> {
        if control_freq <= 0.0 || !control_freq.is_finite() {
            return Err(Error::Config(format!(
                "action filter control frequency must be positive, got {}",
                control_freq
            )));
        }
        if cutoff_hz <= 0.0 || !cutoff_hz.is_finite() {
            return Err(Error::Config(format!(
                "action filter cutoff frequency must be positive, got {}",
                cutoff_hz
            )));
        }
        let prototype = LowPassFilter::from_time_constant(1.0 / cutoff_hz, control_freq);
        Ok(Self {
            joints: vec![prototype; num_joints],
            recent: VecDeque::with_capacity(RECENT_SAMPLES),
            filtered: Vec::with_capacity(num_joints),
            control_freq,
            cutoff_hz,
        })
    }

    /// Append one multi-joint sample
    pub fn push(&mut self, sample: &[f64]) -> Result<()> {
        if sample.len() != self.joints.len() {
            return Err(Error::ObservationLength {
                component: "filter_sample",
                expected: self.joints.len(),
                actual: sample.len(),
            });
        }

        if self.recent.len() == RECENT_SAMPLES {
            self.recent.pop_front();
        }
        self.recent.push_back(sample.to_vec());

        self.filtered.clear();
        self.filtered.extend(
            self.joints
                .iter_mut()
                .zip(sample)
                .map(|(filter, &value)| filter.update(value)),
        );
        Ok(())
    }

    /// Current filtered estimate, `None` until the first sample arrives
    pub fn filtered_action(&self) -> Option<&[f64]> {
        if self.recent.is_empty() {
            None
        } else {
            Some(&self.filtered)
        }
    }

    /// Most recent unfiltered samples, oldest first
    pub fn recent_samples(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.recent.iter().map(Vec::as_slice)
    }

    /// Weight given to each new sample
    pub fn alpha(&self) -> f64 {
        self.joints.first().map(LowPassFilter::alpha).unwrap_or(1.0)
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn control_freq(&self) -> f64 {
        self.control_freq
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }
}
