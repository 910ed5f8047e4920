//! Run state of the control loop
//!
//! Transitions are table driven: each [`Transition`] names a source state,
//! the event that fires it and the target state. Events with no matching
//! transition leave the state unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlState {
    Running,
    Paused,
    /// Terminal: peripherals are stopped and the loop exits
    ShuttingDown,
}

impl ControlState {
    pub fn is_terminal(self) -> bool {
        self == ControlState::ShuttingDown
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlState::Running => "RUNNING",
            ControlState::Paused => "PAUSED",
            ControlState::ShuttingDown => "SHUTTING_DOWN",
        };
        f.write_str(name)
    }
}

/// Inputs that can change the control state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlEvent {
    /// Pause button edge
    TogglePause,
    /// Operator requested stop
    Interrupt,
}

/// A transition between states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Source state
    pub from: ControlState,
    /// Event that triggers this transition
    pub event: ControlEvent,
    /// Target state
    pub to: ControlState,
}

impl Transition {
    /// Create a transition triggered by an event
    pub const fn on_event(from: ControlState, event: ControlEvent, to: ControlState) -> Self {
        Self { from, event, to }
    }
}

const TRANSITIONS: [Transition; 4] = [
    Transition::on_event(ControlState::Running, ControlEvent::TogglePause, ControlState::Paused),
    Transition::on_event(ControlState::Paused, ControlEvent::TogglePause, ControlState::Running),
    Transition::on_event(ControlState::Running, ControlEvent::Interrupt, ControlState::ShuttingDown),
    Transition::on_event(ControlState::Paused, ControlEvent::Interrupt, ControlState::ShuttingDown),
];

/// The loop's pause / shutdown state machine
#[derive(Debug, Clone)]
pub struct ControlStateMachine {
    current: ControlState,
    last_transition: Option<Transition>,
}

impl ControlStateMachine {
    /// Start paused or running
    pub fn new(start_paused: bool) -> Self {
        Self {
            current: if start_paused {
                ControlState::Paused
            } else {
                ControlState::Running
            },
            last_transition: None,
        }
    }

    /// Get the current state
    pub fn current(&self) -> ControlState {
        self.current
    }

    pub fn is_running(&self) -> bool {
        self.current == ControlState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.current == ControlState::Paused
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn last_transition(&self) -> Option<&Transition> {
        self.last_transition.as_ref()
    }

    /// Apply an event, returning the transition taken if any
    pub fn handle(&mut self, event: ControlEvent) -> Option<Transition> {
        let transition = TRANSITIONS
            .iter()
            .find(|t| t.from == self.current && t.event == event)
            .copied()?;

        self.current = transition.to;
        self.last_transition = Some(transition);
        tracing::debug!("State transition: {} -> {}", transition.from, transition.to);
        Some(transition)
    }
}

impl Default for ControlStateMachine {
    fn default() -> Self {
        Self::new(false)
    }
}
