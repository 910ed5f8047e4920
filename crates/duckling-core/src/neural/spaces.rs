//! Observation layout definition
//!
//! Describes the ordered sub-vectors that make up one observation. The
//! layout is fixed for the lifetime of a run.

use serde::Serialize;
use std::ops::Range;

/// Length of the teleoperation command vector
pub const COMMAND_DIM: usize = 7;

/// Length of the phase feature pair (cos, sin)
pub const PHASE_DIM: usize = 2;

/// A named, fixed-length slice of the observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationComponent {
    pub name: &'static str,
    pub size: usize,
}

impl ObservationComponent {
    pub const fn new(name: &'static str, size: usize) -> Self {
        Self { name, size }
    }
}

/// Ordered list of observation components
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationLayout {
    components: Vec<ObservationComponent>,
    total_dim: usize,
}

impl ObservationLayout {
    /// Create a layout from components
    pub fn new(components: Vec<ObservationComponent>) -> Self {
        let total_dim = components.iter().map(|c| c.size).sum();
        Self {
            components,
            total_dim,
        }
    }

    /// Walking policy layout for `num_joints` joints and `num_contacts` feet
    pub fn duck(num_joints: usize, num_contacts: usize) -> Self {
        Self::new(vec![
            ObservationComponent::new("gyro", 3),
            ObservationComponent::new("accelerometer", 3),
            ObservationComponent::new("command", COMMAND_DIM),
            ObservationComponent::new("joint_position", num_joints),
            ObservationComponent::new("joint_velocity", num_joints),
            ObservationComponent::new("last_action", num_joints),
            ObservationComponent::new("last_last_action", num_joints),
            ObservationComponent::new("last_last_last_action", num_joints),
            ObservationComponent::new("motor_targets", num_joints),
            ObservationComponent::new("feet_contacts", num_contacts),
            ObservationComponent::new("phase", PHASE_DIM),
        ])
    }

    /// Total observation dimension
    pub fn total_dim(&self) -> usize {
        self.total_dim
    }

    pub fn components(&self) -> &[ObservationComponent] {
        &self.components
    }

    /// Get a component by name
    pub fn component(&self, name: &str) -> Option<&ObservationComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Index range of a component inside the flat observation
    pub fn range_of(&self, name: &str) -> Option<Range<usize>> {
        let mut offset = 0;
        for component in &self.components {
            if component.name == name {
                return Some(offset..offset + component.size);
            }
            offset += component.size;
        }
        None
    }
}
