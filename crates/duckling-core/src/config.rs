//! Robot and runtime configuration
//!
//! [`RobotConfig`] describes one physical robot and is read from a JSON file
//! kept on the robot. [`RuntimeConfig`] holds the options of a single run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::control::period_from_rate;
use crate::{Error, Result};

/// Which expressive peripherals this robot carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionFeatures {
    pub eyes: bool,
    pub projector: bool,
    pub speaker: bool,
    pub antennas: bool,
}

/// Per-robot settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Start the loop in the paused state
    pub start_paused: bool,
    /// The IMU board is mounted upside down
    pub imu_upside_down: bool,
    /// Initial phase frequency factor offset
    pub phase_frequency_factor_offset: f64,
    pub expression_features: ExpressionFeatures,
    /// Calibration offsets (rad) added to the standing pose, by joint name
    pub joints_offsets: HashMap<String, f64>,
}

impl RobotConfig {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ResourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: RobotConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        if !config.phase_frequency_factor_offset.is_finite() {
            return Err(Error::Config(
                "phase_frequency_factor_offset must be finite".into(),
            ));
        }
        Ok(config)
    }

    /// Load from a JSON file, using defaults if the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Err(Error::ResourceNotFound { .. }) => {
                tracing::warn!("Robot config {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }
}

/// PID gains applied to every servo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

impl PidGains {
    pub const fn new(p: f64, i: f64, d: f64) -> Self {
        Self { p, i, d }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(30.0, 0.0, 0.0)
    }
}

/// Options of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Servo bus serial port
    pub serial_port: String,
    /// Control loop rate (Hz)
    pub control_freq: f64,
    pub pid: PidGains,
    /// Kp for head joints
    pub head_kp: f64,
    /// Action to target-offset scale
    pub action_scale: f64,
    /// IMU pitch bias (deg)
    pub pitch_bias_deg: f64,
    /// Read teleoperation commands
    pub commands_enabled: bool,
    /// Command device polling rate (Hz)
    pub command_freq: f64,
    /// Write per-tick observations here on shutdown
    pub record_path: Option<PathBuf>,
    /// Feed recorded observations to the policy instead of live ones
    pub replay_path: Option<PathBuf>,
    /// Action filter cutoff (Hz); no filter when unset
    pub cutoff_frequency: Option<f64>,
    /// Motor velocity limit (rad/s); no clamp when unset
    pub velocity_clamp: Option<f64>,
    /// Time before filtered targets are trusted
    pub filter_warmup: Duration,
    /// Wait after enabling torque, before the first tick
    pub startup_settle: Duration,
    /// Sleep per tick while paused
    pub pause_poll_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyACM0".into(),
            control_freq: 50.0,
            pid: PidGains::default(),
            head_kp: 8.0,
            action_scale: 0.25,
            pitch_bias_deg: 0.0,
            commands_enabled: false,
            command_freq: 20.0,
            record_path: None,
            replay_path: None,
            cutoff_frequency: None,
            velocity_clamp: None,
            filter_warmup: Duration::from_secs(1),
            startup_settle: Duration::from_secs(2),
            pause_poll_interval: Duration::from_millis(100),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serial_port(mut self, port: impl Into<String>) -> Self {
        self.serial_port = port.into();
        self
    }

    pub fn with_control_freq(mut self, hz: f64) -> Self {
        self.control_freq = hz;
        self
    }

    pub fn with_pid(mut self, pid: PidGains) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_head_kp(mut self, kp: f64) -> Self {
        self.head_kp = kp;
        self
    }

    pub fn with_action_scale(mut self, scale: f64) -> Self {
        self.action_scale = scale;
        self
    }

    pub fn with_pitch_bias(mut self, deg: f64) -> Self {
        self.pitch_bias_deg = deg;
        self
    }

    pub fn with_commands(mut self, enabled: bool) -> Self {
        self.commands_enabled = enabled;
        self
    }

    pub fn with_command_freq(mut self, hz: f64) -> Self {
        self.command_freq = hz;
        self
    }

    pub fn with_record_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    pub fn with_replay_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.replay_path = Some(path.into());
        self
    }

    pub fn with_cutoff_frequency(mut self, hz: f64) -> Self {
        self.cutoff_frequency = Some(hz);
        self
    }

    /// Enable the motor velocity clamp
    pub fn with_velocity_clamp(mut self, max_velocity: f64) -> Self {
        self.velocity_clamp = Some(max_velocity);
        self
    }

    pub fn with_filter_warmup(mut self, warmup: Duration) -> Self {
        self.filter_warmup = warmup;
        self
    }

    pub fn with_startup_settle(mut self, settle: Duration) -> Self {
        self.startup_settle = settle;
        self
    }

    pub fn with_pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }

    /// Control period
    pub fn period(&self) -> Result<Duration> {
        period_from_rate("control_freq", self.control_freq)
    }

    /// Check every option; any failure is fatal
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value > 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be positive, got {}", name, value)))
            }
        }
        fn non_negative(name: &str, value: f64) -> Result<()> {
            if value >= 0.0 && value.is_finite() {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must not be negative, got {}", name, value)))
            }
        }

        period_from_rate("control_freq", self.control_freq)?;
        period_from_rate("command_freq", self.command_freq)?;
        non_negative("action_scale", self.action_scale)?;
        non_negative("pid.p", self.pid.p)?;
        non_negative("pid.i", self.pid.i)?;
        non_negative("pid.d", self.pid.d)?;
        non_negative("head_kp", self.head_kp)?;
        if !self.pitch_bias_deg.is_finite() {
            return Err(Error::Config("pitch_bias_deg must be finite".into()));
        }
        if let Some(cutoff) = self.cutoff_frequency {
            positive("cutoff_frequency", cutoff)?;
        }
        if let Some(max_velocity) = self.velocity_clamp {
            positive("velocity_clamp", max_velocity)?;
        }
        Ok(())
    }
}
