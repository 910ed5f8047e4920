//! Per-joint calibration offsets applied at the servo bus boundary
//!
//! Positions read from the bus have the offset subtracted and targets written
//! to it have the offset added, so everything above the bus (observations,
//! motor targets, the standing pose) lives in the calibrated frame.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{Error, Result};

use super::{HardwareInterface, JointLayout, JointTarget};

/// A servo bus seen through calibration offsets
pub struct CalibratedHardware {
    inner: Arc<dyn HardwareInterface>,
    /// Offsets of the controlled joints, in layout order
    read_offsets: Vec<f64>,
    /// Offsets of every known joint, ignored ones included
    write_offsets: HashMap<String, f64>,
}

impl CalibratedHardware {
    /// Wrap `inner` with `offsets` keyed by joint name
    ///
    /// Names that are neither controlled nor ignored in `layout` are a
    /// configuration error.
    pub fn new(
        inner: Arc<dyn HardwareInterface>,
        layout: &JointLayout,
        offsets: &HashMap<String, f64>,
    ) -> Result<Self> {
        let mut read_offsets = vec![0.0; layout.num_joints()];
        for (name, &offset) in offsets {
            if !offset.is_finite() {
                return Err(Error::Config(format!(
                    "offset for joint '{}' is not finite",
                    name
                )));
            }
            match layout.index_of(name) {
                Some(idx) => read_offsets[idx] = offset,
                None if layout.ignored().contains(name) => {}
                None => {
                    return Err(Error::Config(format!(
                        "offset for unknown joint '{}'",
                        name
                    )))
                }
            }
        }
        Ok(Self {
            inner,
            read_offsets,
            write_offsets: offsets.clone(),
        })
    }

    /// Wrap `inner` only when some offset is non-zero
    pub fn wrap(
        inner: Arc<dyn HardwareInterface>,
        layout: &JointLayout,
        offsets: &HashMap<String, f64>,
    ) -> Result<Arc<dyn HardwareInterface>> {
        let calibrated = Self::new(inner, layout, offsets)?;
        if calibrated.write_offsets.values().all(|o| *o == 0.0) {
            return Ok(calibrated.inner);
        }
        tracing::info!("Applying {} joint offsets", calibrated.write_offsets.len());
        Ok(Arc::new(calibrated))
    }

    pub fn offset(&self, name: &str) -> f64 {
        self.write_offsets.get(name).copied().unwrap_or(0.0)
    }
}

impl HardwareInterface for CalibratedHardware {
    fn get_positions(&self, ignore: &[String]) -> Option<Vec<f64>> {
        let mut positions = self.inner.get_positions(ignore)?;
        // A wrong-length read is passed through for the observation check
        if positions.len() == self.read_offsets.len() {
            for (position, offset) in positions.iter_mut().zip(&self.read_offsets) {
                *position -= offset;
            }
        }
        Some(positions)
    }

    fn get_velocities(&self, ignore: &[String]) -> Option<Vec<f64>> {
        self.inner.get_velocities(ignore)
    }

    fn set_targets(&self, targets: &[JointTarget<'_>]) -> Result<()> {
        let shifted: Vec<JointTarget<'_>> = targets
            .iter()
            .map(|t| JointTarget::new(t.name, t.position + self.offset(t.name)))
            .collect();
        self.inner.set_targets(&shifted)
    }

    fn set_gains(&self, kp: &[f64], kd: &[f64]) -> Result<()> {
        self.inner.set_gains(kp, kd)
    }

    fn enable_torque(&self) -> Result<()> {
        self.inner.enable_torque()
    }

    fn disable_torque(&self) -> Result<()> {
        self.inner.disable_torque()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{joint_idx, SimulatedHardware, INIT_POSE};
    use approx::assert_relative_eq;

    fn knee_offset(offset: f64) -> HashMap<String, f64> {
        let mut offsets = HashMap::new();
        offsets.insert("left_knee".to_string(), offset);
        offsets
    }

    #[test]
    fn test_offsets_shift_reads_and_writes() {
        let layout = JointLayout::duck();
        let sim = SimulatedHardware::new(&layout, 50.0);
        let hw = CalibratedHardware::new(Arc::new(sim.clone()), &layout, &knee_offset(0.1)).unwrap();

        hw.set_targets(&layout.targets(layout.init_pose())).unwrap();
        let written = sim.last_write().unwrap();
        assert_relative_eq!(
            written[joint_idx::LEFT_KNEE],
            INIT_POSE[joint_idx::LEFT_KNEE] + 0.1,
            epsilon = 1e-12
        );
        assert_relative_eq!(written[0], INIT_POSE[0], epsilon = 1e-12);

        let raw = sim.get_positions(layout.ignored()).unwrap();
        let calibrated = hw.get_positions(layout.ignored()).unwrap();
        assert_relative_eq!(
            calibrated[joint_idx::LEFT_KNEE],
            raw[joint_idx::LEFT_KNEE] - 0.1,
            epsilon = 1e-12
        );
        assert_relative_eq!(calibrated[0], raw[0], epsilon = 1e-12);
    }

    #[test]
    fn test_ignored_joint_offsets_accepted() {
        let layout = JointLayout::duck();
        let mut offsets = HashMap::new();
        offsets.insert("left_antenna".to_string(), 0.3);
        let hw = CalibratedHardware::new(
            Arc::new(SimulatedHardware::new(&layout, 50.0)),
            &layout,
            &offsets,
        )
        .unwrap();
        assert_relative_eq!(hw.offset("left_antenna"), 0.3);
        assert_relative_eq!(hw.offset("left_knee"), 0.0);
    }

    #[test]
    fn test_unknown_joint_rejected() {
        let layout = JointLayout::duck();
        let mut offsets = knee_offset(0.1);
        offsets.insert("tail".to_string(), 0.1);
        let result =
            CalibratedHardware::new(Arc::new(SimulatedHardware::new(&layout, 50.0)), &layout, &offsets);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_offsets_not_wrapped() {
        let layout = JointLayout::duck();
        let inner: Arc<dyn HardwareInterface> = Arc::new(SimulatedHardware::new(&layout, 50.0));
        let plain = CalibratedHardware::wrap(Arc::clone(&inner), &layout, &knee_offset(0.0)).unwrap();
        assert!(Arc::ptr_eq(&plain, &inner));
        let shifted = CalibratedHardware::wrap(Arc::clone(&inner), &layout, &knee_offset(0.1)).unwrap();
        assert!(!Arc::ptr_eq(&shifted, &inner));
    }
}
