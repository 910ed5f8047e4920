//! duckling-core: real-time policy control core for a small bipedal robot
//!
//! Runs a fixed-rate loop that reads proprioceptive and inertial sensors,
//! assembles an observation vector, queries a learned policy and turns its
//! output into filtered joint position targets.
//!
//! # Modules
//!
//! - [`math`] - Low-pass filters for per-joint signals
//! - [`hardware`] - Servo bus, IMU and contact sensor interfaces, joint layout
//! - [`neural`] - Observation layout and assembly, action history, policies
//! - [`control`] - Phase generator, target composition, tick timing, walk controller
//! - [`command`] - Teleoperation command sources and the latest-wins mailbox
//! - [`peripherals`] - Optional expressive capabilities (eyes, projector, speaker, antennas)
//! - [`reference_motion`] - Periodic reference motion resource
//! - [`recording`] - Observation recording and replay
//! - [`config`] - Robot and runtime configuration
//!
//! # Architecture
//!
//! ```text
//! Command Source ─┐
//! IMU ────────────┤
//! Servo bus ──────┼──► Observation ──► Policy ──► History / Filter ──► Targets ──► Servo bus
//! Contacts ───────┤
//! Phase ──────────┘
//! ```

#![warn(unused_must_use)]

pub mod command;
pub mod config;
pub mod control;
pub mod hardware;
pub mod math;
pub mod neural;
pub mod peripherals;
pub mod recording;
pub mod reference_motion;

// Re-exports for convenience
pub use command::{CommandFrame, CommandSource, Mailbox};
pub use config::{PidGains, RobotConfig, RuntimeConfig};
pub use control::{ControlState, PhaseGenerator, TargetComposer, TickOutcome, WalkController};
pub use hardware::{ContactSensor, HardwareInterface, Imu, ImuReading, JointLayout};
pub use math::{ActionFilter, Filter, LowPassFilter};
pub use neural::{ActionHistory, Observation, ObservationAssembler, ObservationLayout, Policy};
pub use peripherals::{PeripheralKind, PeripheralSet};
pub use reference_motion::ReferenceMotion;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for duckling-core
///
/// Configuration errors are fatal and must stop the process before any
/// actuator command is issued. Hardware, inference and peripheral errors
/// are scoped to a single tick or a single optional feature.
#[derive(Debug, thiserror::Error)]
#[must_use = "errors must be handled or explicitly ignored with let _ = ..."]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration parameter.
    /// Handle by: fixing the configuration, the process must not proceed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A sub-vector of the observation has the wrong length.
    /// Handle by: checking the joint layout against the hardware and model.
    #[error("Observation component '{component}' has length {actual}, expected {expected}")]
    ObservationLength {
        component: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A required resource file (model, reference motion, replay) is missing.
    #[error("Resource not found: {}", path.display())]
    ResourceNotFound { path: std::path::PathBuf },

    /// A resource file exists but could not be interpreted.
    #[error("Invalid resource: {0}")]
    Resource(String),

    /// Servo bus or sensor level failure.
    /// Handle by: skipping the tick, the hardware state is untouched.
    #[error("Hardware error: {0}")]
    Hardware(String),

    /// Policy inference failed.
    /// Handle by: holding the previous motor targets for this tick.
    #[error("Inference error: {0}")]
    Inference(String),

    /// An optional expressive peripheral failed.
    /// Handle by: disabling that peripheral for the rest of the run.
    #[error("Peripheral error: {0}")]
    Peripheral(String),

    /// Command input device failure.
    #[error("Command source error: {0}")]
    Command(String),

    /// Communication channel was closed unexpectedly.
    #[error("Channel closed")]
    ChannelClosed,

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error must abort the run rather than skip a tick
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::ObservationLength { .. }
                | Error::ResourceNotFound { .. }
                | Error::Resource(_)
        )
    }
}

/// Result type alias for duckling-core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Config("bad".into()).is_fatal());
        assert!(Error::ObservationLength {
            component: "joint_velocity",
            expected: 14,
            actual: 12
        }
        .is_fatal());
        assert!(!Error::Hardware("timeout".into()).is_fatal());
        assert!(!Error::Inference("nan".into()).is_fatal());
        assert!(!Error::Peripheral("eyes".into()).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::ObservationLength {
            component: "gyro",
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Observation component 'gyro' has length 2, expected 3"
        );
    }
}
