//! Periodic reference motion
//!
//! The resource is a JSON object keyed by the commanded velocity
//! (`"dx_dy_dtheta"`, e.g. `"0.1_0.0_-0.2"`). Each entry fits one gait cycle
//! with a polynomial per output dimension, evaluated over the normalized
//! phase `index / steps_in_period`.
//!
//! The controller only needs [`ReferenceMotion::steps_in_period`]; the
//! reference pose itself is available for tools and tests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{Error, Result};

/// One fitted gait cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEntry {
    /// Cycle duration (s)
    pub period: f64,
    /// Sample rate the cycle was fitted at
    pub fps: f64,
    #[serde(default)]
    pub startend_double_support_ratio: f64,
    /// One polynomial per dimension, highest degree first
    pub coefficients: Vec<Vec<f64>>,
}

impl MotionEntry {
    fn steps(&self) -> Result<usize> {
        let steps = (self.period * self.fps).round();
        if !steps.is_finite() || steps < 1.0 {
            return Err(Error::Resource(format!(
                "reference motion period {} at {} fps has no steps",
                self.period, self.fps
            )));
        }
        Ok(steps as usize)
    }
}

/// A velocity key and its entry
#[derive(Debug, Clone, PartialEq)]
struct KeyedEntry {
    velocity: [f64; 3],
    entry: MotionEntry,
}

/// Loaded reference motion, immutable after construction
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMotion {
    entries: Vec<KeyedEntry>,
    steps_in_period: usize,
    dims: usize,
}

impl ReferenceMotion {
    /// Load from a JSON file
    ///
    /// A missing file, an empty map, a zero period, disagreeing periods or
    /// ragged coefficient sets are all fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ResourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let raw: BTreeMap<String, MotionEntry> = serde_json::from_str(&content)
            .map_err(|e| Error::Resource(format!("{}: {}", path.display(), e)))?;
        let motion = Self::from_entries(raw)?;
        tracing::info!(
            "Loaded reference motion {} ({} entries, {} steps per period)",
            path.display(),
            motion.len(),
            motion.steps_in_period
        );
        Ok(motion)
    }

    /// Build from keyed entries
    pub fn from_entries(entries: impl IntoIterator<Item = (String, MotionEntry)>) -> Result<Self> {
        let mut keyed = Vec::new();
        let mut steps_in_period = None;
        let mut dims = None;

        for (key, entry) in entries {
            let velocity = parse_key(&key)?;
            let steps = entry.steps()?;
            match steps_in_period {
                None => steps_in_period = Some(steps),
                Some(expected) if expected != steps => {
                    return Err(Error::Resource(format!(
                        "entry '{}' has {} steps per period, expected {}",
                        key, steps, expected
                    )))
                }
                Some(_) => {}
            }
            match dims {
                None => dims = Some(entry.coefficients.len()),
                Some(expected) if expected != entry.coefficients.len() => {
                    return Err(Error::Resource(format!(
                        "entry '{}' has {} dimensions, expected {}",
                        key,
                        entry.coefficients.len(),
                        expected
                    )))
                }
                Some(_) => {}
            }
            keyed.push(KeyedEntry { velocity, entry });
        }

        let (Some(steps_in_period), Some(dims)) = (steps_in_period, dims) else {
            return Err(Error::Resource("reference motion has no entries".into()));
        };
        Ok(Self {
            entries: keyed,
            steps_in_period,
            dims,
        })
    }

    /// A single flat cycle of `steps_in_period` steps with no dimensions
    ///
    /// Used when only the phase period matters.
    pub fn with_period(steps_in_period: usize) -> Result<Self> {
        if steps_in_period == 0 {
            return Err(Error::Config("steps_in_period must be positive".into()));
        }
        Ok(Self {
            entries: vec![KeyedEntry {
                velocity: [0.0; 3],
                entry: MotionEntry {
                    period: steps_in_period as f64,
                    fps: 1.0,
                    startend_double_support_ratio: 0.0,
                    coefficients: Vec::new(),
                },
            }],
            steps_in_period,
            dims: 0,
        })
    }

    /// Gait cycle length in control steps
    pub fn steps_in_period(&self) -> usize {
        self.steps_in_period
    }

    /// Dimensions of the reference pose
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry whose key is closest to `(dx, dy, dtheta)`
    pub fn nearest(&self, velocity: [f64; 3]) -> &MotionEntry {
        let distance = |key: &[f64; 3]| {
            key.iter()
                .zip(&velocity)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
        };
        let mut best = &self.entries[0];
        for candidate in &self.entries[1..] {
            if distance(&candidate.velocity) < distance(&best.velocity) {
                best = candidate;
            }
        }
        &best.entry
    }

    /// Reference pose for `velocity` at phase step `index`
    ///
    /// `index` wraps around the period.
    pub fn pose(&self, velocity: [f64; 3], index: f64) -> Vec<f64> {
        let period = self.steps_in_period as f64;
        let t = index.rem_euclid(period) / period;
        self.nearest(velocity)
            .coefficients
            .iter()
            .map(|poly| horner(poly, t))
            .collect()
    }
}

fn parse_key(key: &str) -> Result<[f64; 3]> {
    let parts: Vec<&str> = key.split('_').collect();
    if parts.len() != 3 {
        return Err(Error::Resource(format!(
            "reference motion key '{}' is not dx_dy_dtheta",
            key
        )));
    }
    let mut velocity = [0.0; 3];
    for (slot, part) in velocity.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|_| Error::Resource(format!("bad number '{}' in key '{}'", part, key)))?;
    }
    Ok(velocity)
}

fn horner(coefficients: &[f64], t: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, c| acc * t + c)
}
