//! Policy actions and the short action history fed back as observation

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of past actions kept in the history
pub const HISTORY_DEPTH: usize = 3;

/// One policy output: a value per controlled joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Vec<f64>);

impl Action {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(num_joints: usize) -> Self {
        Self(vec![0.0; num_joints])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for Action {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// The last three actions, most recent first
///
/// Starts as zero vectors and shifts once per successful inference.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionHistory {
    slots: [Action; HISTORY_DEPTH],
    num_joints: usize,
}

impl ActionHistory {
    pub fn new(num_joints: usize) -> Self {
        Self {
            slots: std::array::from_fn(|_| Action::zeros(num_joints)),
            num_joints,
        }
    }

    /// Shift the history (`t-3 ← t-2`, `t-2 ← t-1`) and store `action` as `t-1`
    pub fn push(&mut self, action: Action) -> Result<()> {
        if action.len() != self.num_joints {
            return Err(Error::ObservationLength {
                component: "action",
                expected: self.num_joints,
                actual: action.len(),
            });
        }
        self.slots.rotate_right(1);
        self.slots[0] = action;
        Ok(())
    }

    /// Action `steps_back` ticks ago, 1-based (`get(1)` is the latest)
    pub fn get(&self, steps_back: usize) -> Option<&Action> {
        steps_back
            .checked_sub(1)
            .and_then(|idx| self.slots.get(idx))
    }

    /// Most recent action
    pub fn last(&self) -> &Action {
        &self.slots[0]
    }

    /// Actions from most recent to oldest
    pub fn iter(&self) -> impl Iterator<Item = &Action> + '_ {
        self.slots.iter()
    }

    pub fn num_joints(&self) -> usize {
        self.num_joints
    }
}
