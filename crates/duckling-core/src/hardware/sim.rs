//! Simulated servo bus and contact sensor
//!
//! Provides a simple PD joint model for testing control code and for dry runs
//! without a robot attached.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::{Error, Result};

use super::{ContactSensor, HardwareInterface, JointLayout, JointTarget};

/// Physics substeps integrated per target write
const SUBSTEPS: usize = 4;

#[derive(Debug, Clone)]
struct SimState {
    names: Vec<String>,
    positions: Vec<f64>,
    velocities: Vec<f64>,
    targets: Vec<f64>,
    kp: Vec<f64>,
    kd: Vec<f64>,
    torque_enabled: bool,
    available: bool,
    writes: u64,
    last_write: Option<Vec<f64>>,
}

/// A simulated servo bus
///
/// Cloning yields another handle to the same bus, so tests can keep a handle
/// while the controller owns one.
#[derive(Debug, Clone)]
pub struct SimulatedHardware {
    state: Arc<RwLock<SimState>>,
    dt: f64,
}

impl SimulatedHardware {
    /// Create a bus holding the layout's joints (ignored ones included) at
    /// the standing pose, integrating `1 / control_freq` seconds per write
    pub fn new(layout: &JointLayout, control_freq: f64) -> Self {
        let mut names = layout.names().to_vec();
        names.extend(layout.ignored().iter().cloned());

        let mut positions = layout.init_pose().to_vec();
        positions.resize(names.len(), 0.0);
        let n = names.len();

        Self {
            state: Arc::new(RwLock::new(SimState {
                names,
                targets: positions.clone(),
                positions,
                velocities: vec![0.0; n],
                kp: vec![20.0; n],
                kd: vec![0.5; n],
                torque_enabled: false,
                available: true,
                writes: 0,
                last_write: None,
            })),
            dt: 1.0 / control_freq,
        }
    }

    /// Simulate the bus failing (`false`) or recovering (`true`)
    pub fn set_available(&self, available: bool) {
        self.state.write().available = available;
    }

    pub fn is_torque_enabled(&self) -> bool {
        self.state.read().torque_enabled
    }

    /// Number of target writes received
    pub fn write_count(&self) -> u64 {
        self.state.read().writes
    }

    /// Positions of the most recent target write, in bus order
    pub fn last_write(&self) -> Option<Vec<f64>> {
        self.state.read().last_write.clone()
    }

    /// Current gains, in bus order
    pub fn gains(&self) -> (Vec<f64>, Vec<f64>) {
        let state = self.state.read();
        (state.kp.clone(), state.kd.clone())
    }

    /// Overwrite the present joint positions, in bus order
    pub fn set_positions(&self, positions: &[f64]) {
        let mut state = self.state.write();
        for (p, &v) in state.positions.iter_mut().zip(positions) {
            *p = v;
        }
    }

    fn filtered(state: &SimState, values: &[f64], ignore: &[String]) -> Vec<f64> {
        state
            .names
            .iter()
            .zip(values)
            .filter(|(name, _)| !ignore.contains(name))
            .map(|(_, &v)| v)
            .collect()
    }

    fn physics_step(state: &mut SimState, dt: f64) {
        if !state.torque_enabled {
            return;
        }
        let h = dt / SUBSTEPS as f64;
        for _ in 0..SUBSTEPS {
            for i in 0..state.positions.len() {
                let error = state.targets[i] - state.positions[i];
                let accel = state.kp[i] * error - state.kd[i] * state.velocities[i];
                state.velocities[i] = (state.velocities[i] + accel * h).clamp(-20.0, 20.0);
                state.positions[i] += state.velocities[i] * h;
            }
        }
    }
}

impl HardwareInterface for SimulatedHardware {
    fn get_positions(&self, ignore: &[String]) -> Option<Vec<f64>> {
        let state = self.state.read();
        if !state.available {
            return None;
        }
        Some(Self::filtered(&state, &state.positions, ignore))
    }

    fn get_velocities(&self, ignore: &[String]) -> Option<Vec<f64>> {
        let state = self.state.read();
        if !state.available {
            return None;
        }
        Some(Self::filtered(&state, &state.velocities, ignore))
    }

    fn set_targets(&self, targets: &[JointTarget<'_>]) -> Result<()> {
        let mut state = self.state.write();
        if !state.available {
            return Err(Error::Hardware("simulated bus unavailable".into()));
        }
        for target in targets {
            let idx = state
                .names
                .iter()
                .position(|n| n == target.name)
                .ok_or_else(|| Error::Hardware(format!("unknown joint '{}'", target.name)))?;
            state.targets[idx] = target.position;
        }
        state.writes += 1;
        state.last_write = Some(targets.iter().map(|t| t.position).collect());
        Self::physics_step(&mut state, self.dt);
        Ok(())
    }

    fn set_gains(&self, kp: &[f64], kd: &[f64]) -> Result<()> {
        let mut state = self.state.write();
        if kp.len() > state.names.len() || kd.len() > state.names.len() {
            return Err(Error::Hardware(format!(
                "gain vectors longer than the {} joints on the bus",
                state.names.len()
            )));
        }
        state.kp[..kp.len()].copy_from_slice(kp);
        state.kd[..kd.len()].copy_from_slice(kd);
        Ok(())
    }

    fn enable_torque(&self) -> Result<()> {
        self.state.write().torque_enabled = true;
        Ok(())
    }

    fn disable_torque(&self) -> Result<()> {
        self.state.write().torque_enabled = false;
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// A contact sensor returning settable readings
#[derive(Debug)]
pub struct StaticContacts {
    values: RwLock<Option<Vec<f64>>>,
    num_contacts: usize,
}

impl StaticContacts {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            num_contacts: values.len(),
            values: RwLock::new(Some(values)),
        }
    }

    /// Replace the readings; `None` simulates an unavailable sensor
    pub fn set_values(&self, values: Option<Vec<f64>>) {
        *self.values.write() = values;
    }
}

impl ContactSensor for StaticContacts {
    fn read(&self) -> Option<Vec<f64>> {
        self.values.read().clone()
    }

    fn num_contacts(&self) -> usize {
        self.num_contacts
    }

    fn stop(&self) {
        tracing::debug!("Contact sensor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> JointLayout {
        JointLayout::duck()
    }

    #[test]
    fn test_ignored_joints_are_filtered() {
        let layout = layout();
        let hw = SimulatedHardware::new(&layout, 50.0);
        let all = hw.get_positions(&[]).unwrap();
        let controlled = hw.get_positions(layout.ignored()).unwrap();
        assert_eq!(all.len(), layout.num_joints() + 2);
        assert_eq!(controlled.len(), layout.num_joints());
        assert_eq!(controlled, layout.init_pose());
    }

    #[test]
    fn test_unavailable_bus() {
        let hw = SimulatedHardware::new(&layout(), 50.0);
        hw.set_available(false);
        assert!(hw.get_positions(&[]).is_none());
        assert!(hw.get_velocities(&[]).is_none());
        assert!(hw.set_targets(&[JointTarget::new("left_knee", 1.0)]).is_err());
        hw.set_available(true);
        assert!(hw.get_positions(&[]).is_some());
    }

    #[test]
    fn test_moves_toward_target_with_torque() {
        let layout = layout();
        let hw = SimulatedHardware::new(&layout, 50.0);
        hw.enable_torque().unwrap();

        let start = hw.get_positions(layout.ignored()).unwrap()[0];
        for _ in 0..200 {
            hw.set_targets(&[JointTarget::new("left_hip_yaw", 0.5)]).unwrap();
        }
        let end = hw.get_positions(layout.ignored()).unwrap()[0];
        assert!(end > start + 0.3);
        assert_eq!(hw.write_count(), 200);
    }

    #[test]
    fn test_no_motion_without_torque() {
        let layout = layout();
        let hw = SimulatedHardware::new(&layout, 50.0);
        hw.set_targets(&[JointTarget::new("left_hip_yaw", 0.5)]).unwrap();
        assert_eq!(hw.get_positions(layout.ignored()).unwrap(), layout.init_pose());
    }

    #[test]
    fn test_unknown_joint_rejected() {
        let hw = SimulatedHardware::new(&layout(), 50.0);
        assert!(hw.set_targets(&[JointTarget::new("tail", 0.1)]).is_err());
    }

    #[test]
    fn test_static_contacts() {
        let contacts = StaticContacts::new(vec![1.0, 0.0]);
        assert_eq!(contacts.num_contacts(), 2);
        assert_eq!(contacts.read(), Some(vec![1.0, 0.0]));
        contacts.set_values(None);
        assert!(contacts.read().is_none());
    }
}
