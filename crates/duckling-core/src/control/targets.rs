//! Motor target composition
//!
//! Turns one policy action into joint position targets:
//!
//! 1. `init_pose + action * action_scale`
//! 2. optional velocity clamp around the previous targets
//! 3. optional low-pass filter, trusted once the warm-up has elapsed
//! 4. the result is kept as `prev_motor_targets`
//! 5. head joints get the teleoperation head command added on top

use std::ops::Range;
use std::time::Duration;

use crate::hardware::{JointLayout, COMMAND_HEAD_RANGE};
use crate::math::ActionFilter;
use crate::neural::COMMAND_DIM;
use crate::{Error, Result};

/// Servo speed limit (rad/s)
pub const MAX_MOTOR_VELOCITY: f64 = 5.24;

/// Limits how far a target may move from the previous one in a single tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityClamp {
    max_velocity: f64,
    dt: f64,
}

impl VelocityClamp {
    /// Clamp to `max_velocity` rad/s at `control_freq` ticks per second
    pub fn new(max_velocity: f64, control_freq: f64) -> Result<Self> {
        if max_velocity <= 0.0 || !max_velocity.is_finite() {
            return Err(Error::Config(format!(
                "max motor velocity must be positive, got {}",
                max_velocity
            )));
        }
        if control_freq <= 0.0 || !control_freq.is_finite() {
            return Err(Error::Config(format!(
                "control frequency must be positive, got {}",
                control_freq
            )));
        }
        Ok(Self {
            max_velocity,
            dt: 1.0 / control_freq,
        })
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    /// Largest per-tick change allowed
    pub fn max_step(&self) -> f64 {
        self.max_velocity * self.dt
    }

    /// Clamp each target into `previous ± max_step`
    pub fn apply(&self, targets: &mut [f64], previous: &[f64]) {
        let step = self.max_step();
        for (target, &prev) in targets.iter_mut().zip(previous) {
            *target = target.clamp(prev - step, prev + step);
        }
    }
}

/// Per-tick action → motor target pipeline
#[derive(Debug, Clone)]
pub struct TargetComposer {
    init_pose: Vec<f64>,
    action_scale: f64,
    head: Range<usize>,
    clamp: Option<VelocityClamp>,
    filter: Option<ActionFilter>,
    warmup: Duration,
    motor_targets: Vec<f64>,
    prev_motor_targets: Vec<f64>,
}

impl TargetComposer {
    /// Create a composer starting at the layout's standing pose
    pub fn new(layout: &JointLayout, action_scale: f64) -> Self {
        let init_pose = layout.init_pose().to_vec();
        Self {
            motor_targets: init_pose.clone(),
            prev_motor_targets: init_pose.clone(),
            init_pose,
            action_scale,
            head: layout.head_range(),
            clamp: None,
            filter: None,
            warmup: Duration::ZERO,
        }
    }

    /// Filter raw targets, substituting the filtered value after `warmup`
    pub fn with_filter(mut self, filter: ActionFilter, warmup: Duration) -> Result<Self> {
        if filter.num_joints() != self.init_pose.len() {
            return Err(Error::Config(format!(
                "action filter has {} channels for {} joints",
                filter.num_joints(),
                self.init_pose.len()
            )));
        }
        self.filter = Some(filter);
        self.warmup = warmup;
        Ok(self)
    }

    /// Enable the velocity clamp stage
    pub fn with_velocity_clamp(mut self, clamp: VelocityClamp) -> Self {
        self.clamp = Some(clamp);
        self
    }

    /// Targets most recently produced, head overlay included
    pub fn motor_targets(&self) -> &[f64] {
        &self.motor_targets
    }

    /// Targets before the head overlay, as of the last composition
    pub fn prev_motor_targets(&self) -> &[f64] {
        &self.prev_motor_targets
    }

    pub fn filter(&self) -> Option<&ActionFilter> {
        self.filter.as_ref()
    }

    pub fn velocity_clamp(&self) -> Option<&VelocityClamp> {
        self.clamp.as_ref()
    }

    /// Compose targets for one action
    ///
    /// `elapsed` is the time since the run started and gates the filter
    /// warm-up.
    pub fn compose(
        &mut self,
        action: &[f64],
        command: &[f64; COMMAND_DIM],
        elapsed: Duration,
    ) -> Result<&[f64]> {
        if action.len() != self.init_pose.len() {
            return Err(Error::ObservationLength {
                component: "action",
                expected: self.init_pose.len(),
                actual: action.len(),
            });
        }

        let mut targets: Vec<f64> = self
            .init_pose
            .iter()
            .zip(action)
            .map(|(init, a)| init + a * self.action_scale)
            .collect();

        if let Some(clamp) = &self.clamp {
            clamp.apply(&mut targets, &self.prev_motor_targets);
        }

        if let Some(filter) = &mut self.filter {
            filter.push(&targets)?;
            if elapsed > self.warmup {
                if let Some(filtered) = filter.filtered_action() {
                    targets.copy_from_slice(filtered);
                }
            }
        }

        self.prev_motor_targets.copy_from_slice(&targets);

        if !self.head.is_empty() {
            for (target, offset) in targets[self.head.clone()]
                .iter_mut()
                .zip(&command[COMMAND_HEAD_RANGE])
            {
                *target += offset;
            }
        }

        self.motor_targets = targets;
        Ok(&self.motor_targets)
    }
}
