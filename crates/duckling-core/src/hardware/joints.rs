//! Joint layout: names, ignore set, head range and standing pose

use std::ops::Range;

use crate::{Error, Result};

use super::{JointTarget, IGNORED_JOINTS, INIT_POSE, JOINT_NAMES};

/// Entries of the 7-element command vector overlaid onto the head joints
///
/// Commands 3..7 are neck pitch, head pitch, head yaw and head roll.
pub const COMMAND_HEAD_RANGE: Range<usize> = 3..7;

/// Ordered set of policy-controlled joints
///
/// The order is the order of every per-joint vector in the crate: positions,
/// velocities, actions and motor targets.
#[derive(Debug, Clone, PartialEq)]
pub struct JointLayout {
    names: Vec<String>,
    ignored: Vec<String>,
    head: Range<usize>,
    init_pose: Vec<f64>,
}

impl JointLayout {
    /// The 14-joint duck layout with decorative antennas ignored
    pub fn duck() -> Self {
        Self {
            names: JOINT_NAMES.iter().map(|n| n.to_string()).collect(),
            ignored: IGNORED_JOINTS.iter().map(|n| n.to_string()).collect(),
            head: 5..9,
            init_pose: INIT_POSE.to_vec(),
        }
    }

    /// Build an arbitrary layout
    ///
    /// `head` must have the same length as [`COMMAND_HEAD_RANGE`] or be empty.
    pub fn custom<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        init_pose: Vec<f64>,
        head: Range<usize>,
    ) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::Config("joint layout has no joints".into()));
        }
        if init_pose.len() != names.len() {
            return Err(Error::Config(format!(
                "initial pose has {} entries for {} joints",
                init_pose.len(),
                names.len()
            )));
        }
        if head.end > names.len() {
            return Err(Error::Config(format!(
                "head range {:?} exceeds {} joints",
                head,
                names.len()
            )));
        }
        if !head.is_empty() && head.len() != COMMAND_HEAD_RANGE.len() {
            return Err(Error::Config(format!(
                "head range {:?} must cover {} joints",
                head,
                COMMAND_HEAD_RANGE.len()
            )));
        }
        Ok(Self {
            names,
            ignored: Vec::new(),
            head,
            init_pose,
        })
    }

    /// Set the joints present on the bus but excluded from control
    pub fn with_ignored<S: Into<String>>(mut self, ignored: impl IntoIterator<Item = S>) -> Self {
        self.ignored = ignored.into_iter().map(Into::into).collect();
        self
    }

    /// Number of controlled joints
    pub fn num_joints(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Joints excluded from reads and from the policy
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// Indices of the head joints inside every per-joint vector
    pub fn head_range(&self) -> Range<usize> {
        self.head.clone()
    }

    /// Standing pose in radians
    pub fn init_pose(&self) -> &[f64] {
        &self.init_pose
    }

    /// Get joint index by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Pair each target with its joint name
    pub fn targets<'a>(&'a self, positions: &[f64]) -> Vec<JointTarget<'a>> {
        self.names
            .iter()
            .zip(positions)
            .map(|(name, &position)| JointTarget::new(name, position))
            .collect()
    }
}

impl Default for JointLayout {
    fn default() -> Self {
        Self::duck()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::joint_idx;

    #[test]
    fn test_duck_layout() {
        let layout = JointLayout::duck();
        assert_eq!(layout.num_joints(), joint_idx::NUM_DOFS);
        assert_eq!(layout.head_range(), joint_idx::NECK_PITCH..joint_idx::RIGHT_HIP_YAW);
        assert_eq!(layout.index_of("head_yaw"), Some(joint_idx::HEAD_YAW));
        assert_eq!(layout.index_of("left_antenna"), None);
        assert_eq!(layout.ignored().len(), 2);
    }

    #[test]
    fn test_custom_layout_validation() {
        assert!(JointLayout::custom(["a", "b"], vec![0.0], 0..0).is_err());
        assert!(JointLayout::custom(["a", "b"], vec![0.0, 0.0], 0..4).is_err());
        assert!(JointLayout::custom(["a", "b", "c", "d"], vec![0.0; 4], 0..2).is_err());
        assert!(JointLayout::custom(["a", "b", "c", "d"], vec![0.0; 4], 0..4).is_ok());
        assert!(JointLayout::custom(Vec::<String>::new(), vec![], 0..0).is_err());
    }

    #[test]
    fn test_targets_follow_layout_order() {
        let layout = JointLayout::custom(["a", "b"], vec![0.0, 0.0], 0..0).unwrap();
        let targets = layout.targets(&[1.0, 2.0]);
        assert_eq!(targets[0], JointTarget::new("a", 1.0));
        assert_eq!(targets[1], JointTarget::new("b", 2.0));
    }
}
