//! Hardware abstraction for the servo bus and body sensors
//!
//! The servo bus driver, IMU sampling and foot contact switches are external
//! collaborators. This module defines the interfaces the control loop depends
//! on, the robot's joint layout, and simulated implementations used by tests
//! and dry runs.

mod calibration;
mod imu;
mod joints;
mod sim;
mod traits;

pub use calibration::CalibratedHardware;
pub use imu::{ImuCorrection, ImuReading, StaticImu};
pub use joints::{JointLayout, COMMAND_HEAD_RANGE};
pub use sim::{SimulatedHardware, StaticContacts};
pub use traits::{ContactSensor, HardwareInterface, Imu, JointTarget};

/// Joint indices for the duck layout
pub mod joint_idx {
    // Left leg
    pub const LEFT_HIP_YAW: usize = 0;
    pub const LEFT_HIP_ROLL: usize = 1;
    pub const LEFT_HIP_PITCH: usize = 2;
    pub const LEFT_KNEE: usize = 3;
    pub const LEFT_ANKLE: usize = 4;

    // Head
    pub const NECK_PITCH: usize = 5;
    pub const HEAD_PITCH: usize = 6;
    pub const HEAD_YAW: usize = 7;
    pub const HEAD_ROLL: usize = 8;

    // Right leg
    pub const RIGHT_HIP_YAW: usize = 9;
    pub const RIGHT_HIP_ROLL: usize = 10;
    pub const RIGHT_HIP_PITCH: usize = 11;
    pub const RIGHT_KNEE: usize = 12;
    pub const RIGHT_ANKLE: usize = 13;

    pub const NUM_DOFS: usize = 14;
}

/// Controlled joint names, in bus order
pub const JOINT_NAMES: [&str; joint_idx::NUM_DOFS] = [
    "left_hip_yaw",
    "left_hip_roll",
    "left_hip_pitch",
    "left_knee",
    "left_ankle",
    "neck_pitch",
    "head_pitch",
    "head_yaw",
    "head_roll",
    "right_hip_yaw",
    "right_hip_roll",
    "right_hip_pitch",
    "right_knee",
    "right_ankle",
];

/// Decorative joints present on the bus but excluded from the policy
pub const IGNORED_JOINTS: [&str; 2] = ["left_antenna", "right_antenna"];

/// Standing pose in radians, matching [`JOINT_NAMES`]
pub const INIT_POSE: [f64; joint_idx::NUM_DOFS] = [
    0.002, 0.053, -0.63, 1.368, -0.784, // left leg
    0.0, 0.0, 0.0, 0.0, // head
    -0.003, -0.065, 0.635, 1.379, -0.796, // right leg
];

/// Number of foot contact switches
pub const NUM_FOOT_CONTACTS: usize = 2;
