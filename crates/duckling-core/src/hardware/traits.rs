//! Hardware abstraction traits
//!
//! Defines the capabilities the control loop needs from the servo bus, the
//! inertial sensor and the foot contact sensor, so that the same loop runs on
//! the robot or against simulated parts.

use crate::Result;

use super::ImuReading;

/// A named joint position target, in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTarget<'a> {
    pub name: &'a str,
    pub position: f64,
}

impl<'a> JointTarget<'a> {
    pub fn new(name: &'a str, position: f64) -> Self {
        Self { name, position }
    }
}

/// Trait for the servo bus (position-controlled joints)
///
/// Reads return `None` when the bus momentarily fails to answer. Callers
/// treat that as a transient condition and skip the tick.
pub trait HardwareInterface: Send + Sync {
    /// Present joint positions (radians), excluding the joints named in `ignore`
    fn get_positions(&self, ignore: &[String]) -> Option<Vec<f64>>;

    /// Present joint velocities (rad/s), excluding the joints named in `ignore`
    fn get_velocities(&self, ignore: &[String]) -> Option<Vec<f64>>;

    /// Write position targets to the named joints
    fn set_targets(&self, targets: &[JointTarget<'_>]) -> Result<()>;

    /// Set per-joint position and derivative gains
    fn set_gains(&self, kp: &[f64], kd: &[f64]) -> Result<()>;

    /// Enable torque on every joint
    fn enable_torque(&self) -> Result<()>;

    /// Disable torque on every joint
    fn disable_torque(&self) -> Result<()>;

    /// Get the hardware name/type
    fn name(&self) -> &str;
}

/// Trait for the inertial measurement unit
pub trait Imu: Send + Sync {
    /// Latest reading, or `None` if no fresh sample is available
    fn read(&self) -> Option<ImuReading>;
}

/// Trait for the foot contact sensor
pub trait ContactSensor: Send + Sync {
    /// One value per foot (1.0 in contact, 0.0 otherwise), or `None` if unavailable
    fn read(&self) -> Option<Vec<f64>>;

    /// Number of contact channels
    fn num_contacts(&self) -> usize;

    /// Release the sensor at shutdown
    fn stop(&self) {}
}
