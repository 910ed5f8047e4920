//! Inertial readings and mounting correction

use nalgebra::{Rotation3, Vector3};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::Imu;

/// One IMU sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImuReading {
    /// Angular velocity (rad/s), body frame
    pub angular_velocity: [f64; 3],
    /// Linear acceleration (m/s²), body frame
    pub linear_acceleration: [f64; 3],
}

impl ImuReading {
    pub fn new(angular_velocity: [f64; 3], linear_acceleration: [f64; 3]) -> Self {
        Self {
            angular_velocity,
            linear_acceleration,
        }
    }

    /// A robot standing still and level
    pub fn level() -> Self {
        Self::new([0.0; 3], [0.0, 0.0, 9.81])
    }
}

/// Fixed rotation applied to every IMU sample
///
/// Compensates a user pitch bias and an upside-down mounted board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuCorrection {
    rotation: Rotation3<f64>,
}

impl ImuCorrection {
    /// No correction
    pub fn identity() -> Self {
        Self {
            rotation: Rotation3::identity(),
        }
    }

    /// Build from a pitch bias in degrees and the mounting orientation
    pub fn new(pitch_bias_deg: f64, upside_down: bool) -> Self {
        let mount = if upside_down {
            Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI)
        } else {
            Rotation3::identity()
        };
        let bias = Rotation3::from_axis_angle(&Vector3::y_axis(), pitch_bias_deg.to_radians());
        Self {
            rotation: bias * mount,
        }
    }

    /// Rotate both vectors of a reading into the corrected body frame
    pub fn apply(&self, reading: ImuReading) -> ImuReading {
        let gyro = self.rotation * Vector3::from(reading.angular_velocity);
        let accel = self.rotation * Vector3::from(reading.linear_acceleration);
        ImuReading {
            angular_velocity: gyro.into(),
            linear_acceleration: accel.into(),
        }
    }
}

impl Default for ImuCorrection {
    fn default() -> Self {
        Self::identity()
    }
}

/// An IMU returning a settable reading, for tests and dry runs
#[derive(Debug, Default)]
pub struct StaticImu {
    reading: RwLock<Option<ImuReading>>,
}

impl StaticImu {
    pub fn new(reading: ImuReading) -> Self {
        Self {
            reading: RwLock::new(Some(reading)),
        }
    }

    /// Replace the reading; `None` simulates a stale sensor
    pub fn set_reading(&self, reading: Option<ImuReading>) {
        *self.reading.write() = reading;
    }
}

impl Imu for StaticImu {
    fn read(&self) -> Option<ImuReading> {
        *self.reading.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_correction() {
        let reading = ImuReading::new([0.1, 0.2, 0.3], [1.0, 2.0, 3.0]);
        assert_eq!(ImuCorrection::identity().apply(reading), reading);
        assert_eq!(ImuCorrection::new(0.0, false).apply(reading), reading);
    }

    #[test]
    fn test_upside_down_flips_y_and_z() {
        let corrected = ImuCorrection::new(0.0, true).apply(ImuReading::level());
        assert_relative_eq!(corrected.linear_acceleration[2], -9.81, epsilon = 1e-9);
        assert_relative_eq!(corrected.linear_acceleration[0], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pitch_bias_tilts_gravity() {
        let corrected = ImuCorrection::new(90.0, false).apply(ImuReading::level());
        // Rotating +z by +90° about y lands on +x
        assert_relative_eq!(corrected.linear_acceleration[0], 9.81, epsilon = 1e-9);
        assert_relative_eq!(corrected.linear_acceleration[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_static_imu() {
        let imu = StaticImu::new(ImuReading::level());
        assert!(imu.read().is_some());
        imu.set_reading(None);
        assert!(imu.read().is_none());
    }
}
