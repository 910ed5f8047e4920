//! Math utilities: per-joint low-pass filtering and input scaling
//!
//! Rotations for IMU correction use nalgebra directly; see
//! [`crate::hardware::ImuCorrection`].

mod filter;

pub use filter::{ActionFilter, Filter, LowPassFilter};

/// Scale a normalized input in [-1, 1] by an asymmetric range
///
/// Positive inputs are scaled by `|high|`, negative ones by `|low|`, so a
/// stick at full deflection reaches exactly the range bound on either side.
#[inline]
pub fn scale_asymmetric(value: f64, low: f64, high: f64) -> f64 {
    if value >= 0.0 {
        value * high.abs()
    } else {
        value * low.abs()
    }
}
