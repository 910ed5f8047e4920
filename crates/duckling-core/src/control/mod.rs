//! Control primitives and the walk controller
//!
//! - [`PhaseGenerator`] - cyclic gait phase with a live-tunable frequency
//! - [`TargetComposer`] - action → motor target pipeline (scale, clamp, filter, head overlay)
//! - [`ControlStateMachine`] - RUNNING / PAUSED / SHUTTING_DOWN
//! - [`TickTimer`] / [`TickStats`] - period enforcement and timing statistics
//! - [`WalkController`] - the fixed-rate loop tying everything together

mod phase;
mod state_machine;
mod targets;
mod timing;
mod walk;

pub use phase::{PhaseGenerator, DEFAULT_FREQUENCY_FACTOR, OFFSET_STEP, SPRINT_FREQUENCY_FACTOR};
pub use state_machine::{ControlEvent, ControlState, ControlStateMachine, Transition};
pub use targets::{TargetComposer, VelocityClamp, MAX_MOTOR_VELOCITY};
pub use timing::{period_from_rate, TickStats, TickTimer, TickTiming};
pub use walk::{TickOutcome, WalkController, WalkControllerBuilder};
