//! Observation assembly
//!
//! Concatenates the latest sensor readings and loop state into the flat
//! vector the policy consumes, in the order given by an [`ObservationLayout`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hardware::ImuReading;
use crate::{Error, Result};

use super::{ActionHistory, ObservationLayout, COMMAND_DIM, PHASE_DIM};

/// Scale applied to joint velocities before they enter the observation
pub const VELOCITY_SCALE: f64 = 0.05;

/// A fixed-length observation vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(Vec<f64>);

impl Observation {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
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

impl From<Vec<f64>> for Observation {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Upstream source that had no fresh value this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    Imu,
    JointPositions,
    JointVelocities,
    Contacts,
}

impl fmt::Display for SensorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorSource::Imu => "imu",
            SensorSource::JointPositions => "joint positions",
            SensorSource::JointVelocities => "joint velocities",
            SensorSource::Contacts => "foot contacts",
        };
        f.write_str(name)
    }
}

/// Result of a successful assembly attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// A complete observation
    Ready(Observation),
    /// A source was temporarily unavailable; skip this tick
    NotReady(SensorSource),
}

/// Everything one observation is built from
#[derive(Debug, Clone, Copy)]
pub struct ObservationInputs<'a> {
    pub imu: Option<ImuReading>,
    pub positions: Option<&'a [f64]>,
    pub velocities: Option<&'a [f64]>,
    pub command: &'a [f64; COMMAND_DIM],
    pub history: &'a ActionHistory,
    pub motor_targets: &'a [f64],
    pub contacts: Option<&'a [f64]>,
    pub phase: [f64; PHASE_DIM],
}

/// Builds observations for a fixed layout
#[derive(Debug, Clone)]
pub struct ObservationAssembler {
    layout: ObservationLayout,
    init_pose: Vec<f64>,
    velocity_scale: f64,
}

impl ObservationAssembler {
    /// Create an assembler; joint-sized components are checked against
    /// `init_pose` at assembly time
    pub fn new(layout: ObservationLayout, init_pose: Vec<f64>) -> Self {
        Self {
            layout,
            init_pose,
            velocity_scale: VELOCITY_SCALE,
        }
    }

    /// Override the joint velocity scale
    pub fn with_velocity_scale(mut self, scale: f64) -> Self {
        self.velocity_scale = scale;
        self
    }

    pub fn layout(&self) -> &ObservationLayout {
        &self.layout
    }

    /// Observation length
    pub fn dim(&self) -> usize {
        self.layout.total_dim()
    }

    /// Assemble one observation
    ///
    /// Returns [`Assembled::NotReady`] if a sensor has no fresh value and an
    /// [`Error::ObservationLength`] if any input has the wrong length.
    pub fn assemble(&self, inputs: &ObservationInputs<'_>) -> Result<Assembled> {
        let Some(imu) = inputs.imu else {
            return Ok(Assembled::NotReady(SensorSource::Imu));
        };
        let Some(positions) = inputs.positions else {
            return Ok(Assembled::NotReady(SensorSource::JointPositions));
        };
        let Some(velocities) = inputs.velocities else {
            return Ok(Assembled::NotReady(SensorSource::JointVelocities));
        };
        let Some(contacts) = inputs.contacts else {
            return Ok(Assembled::NotReady(SensorSource::Contacts));
        };

        let mut obs = Vec::with_capacity(self.layout.total_dim());
        for component in self.layout.components() {
            let start = obs.len();
            match component.name {
                "gyro" => obs.extend_from_slice(&imu.angular_velocity),
                "accelerometer" => obs.extend_from_slice(&imu.linear_acceleration),
                "command" => obs.extend_from_slice(inputs.command),
                "joint_position" => {
                    check_len("joint_position", self.init_pose.len(), positions.len())?;
                    obs.extend(positions.iter().zip(&self.init_pose).map(|(p, init)| p - init));
                }
                "joint_velocity" => {
                    check_len("joint_velocity", self.init_pose.len(), velocities.len())?;
                    obs.extend(velocities.iter().map(|v| v * self.velocity_scale));
                }
                "last_action" => obs.extend_from_slice(history_slot(inputs.history, 1)?),
                "last_last_action" => obs.extend_from_slice(history_slot(inputs.history, 2)?),
                "last_last_last_action" => obs.extend_from_slice(history_slot(inputs.history, 3)?),
                "motor_targets" => obs.extend_from_slice(inputs.motor_targets),
                "feet_contacts" => obs.extend_from_slice(contacts),
                "phase" => obs.extend_from_slice(&inputs.phase),
                other => {
                    return Err(Error::Config(format!(
                        "unknown observation component '{}'",
                        other
                    )))
                }
            }
            check_len(component.name, component.size, obs.len() - start)?;
        }

        Ok(Assembled::Ready(Observation(obs)))
    }
}

fn check_len(component: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ObservationLength {
            component,
            expected,
            actual,
        })
    }
}

fn history_slot(history: &ActionHistory, steps_back: usize) -> Result<&[f64]> {
    history
        .get(steps_back)
        .map(|a| a.as_slice())
        .ok_or_else(|| Error::Config(format!("action history has no entry {} ticks back", steps_back)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::Action;
    use approx::assert_relative_eq;

    const N: usize = 4;

    struct Fixture {
        positions: Vec<f64>,
        velocities: Vec<f64>,
        command: [f64; COMMAND_DIM],
        history: ActionHistory,
        targets: Vec<f64>,
        contacts: Vec<f64>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                positions: vec![1.0; N],
                velocities: vec![2.0; N],
                command: [0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                history: ActionHistory::new(N),
                targets: vec![0.5; N],
                contacts: vec![1.0, 0.0],
            }
        }

        fn inputs(&self) -> ObservationInputs<'_> {
            ObservationInputs {
                imu: Some(ImuReading::new([0.1, 0.2, 0.3], [0.0, 0.0, 9.81])),
                positions: Some(&self.positions),
                velocities: Some(&self.velocities),
                command: &self.command,
                history: &self.history,
                motor_targets: &self.targets,
                contacts: Some(&self.contacts),
                phase: [1.0, 0.0],
            }
        }
    }

    fn assembler() -> ObservationAssembler {
        ObservationAssembler::new(ObservationLayout::duck(N, 2), vec![0.25; N])
    }

    fn ready(assembled: Assembled) -> Observation {
        match assembled {
            Assembled::Ready(obs) => obs,
            Assembled::NotReady(source) => panic!("not ready: {}", source),
        }
    }

    #[test]
    fn test_assemble_layout_order() {
        let assembler = assembler();
        let mut fixture = Fixture::new();
        fixture.history.push(Action::new(vec![9.0; N])).unwrap();

        let obs = ready(assembler.assemble(&fixture.inputs()).unwrap());
        let layout = assembler.layout();
        assert_eq!(obs.len(), layout.total_dim());

        let slice = |name: &str| &obs.as_slice()[layout.range_of(name).unwrap()];
        assert_eq!(slice("gyro"), &[0.1, 0.2, 0.3]);
        assert_eq!(slice("command")[0], 0.1);
        assert_relative_eq!(slice("joint_position")[0], 0.75);
        assert_relative_eq!(slice("joint_velocity")[0], 0.1);
        assert_eq!(slice("last_action"), &[9.0; N]);
        assert_eq!(slice("last_last_action"), &[0.0; N]);
        assert_eq!(slice("motor_targets"), &[0.5; N]);
        assert_eq!(slice("feet_contacts"), &[1.0, 0.0]);
        assert_eq!(slice("phase"), &[1.0, 0.0]);
    }

    #[test]
    fn test_not_ready_when_source_missing() {
        let assembler = assembler();
        let fixture = Fixture::new();

        let mut inputs = fixture.inputs();
        inputs.velocities = None;
        assert_eq!(
            assembler.assemble(&inputs).unwrap(),
            Assembled::NotReady(SensorSource::JointVelocities)
        );

        let mut inputs = fixture.inputs();
        inputs.imu = None;
        assert_eq!(
            assembler.assemble(&inputs).unwrap(),
            Assembled::NotReady(SensorSource::Imu)
        );
    }

    #[test]
    fn test_wrong_velocity_length_is_fatal() {
        let assembler = assembler();
        let mut fixture = Fixture::new();
        fixture.velocities = vec![0.0; N + 1];

        let err = assembler.assemble(&fixture.inputs()).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            Error::ObservationLength {
                component: "joint_velocity",
                expected: N,
                actual
            } if actual == N + 1
        ));
    }

    #[test]
    fn test_wrong_contact_count_is_fatal() {
        let assembler = assembler();
        let mut fixture = Fixture::new();
        fixture.contacts = vec![1.0];
        assert!(assembler.assemble(&fixture.inputs()).is_err());
    }

    #[test]
    fn test_dimension_is_constant() {
        let assembler = assembler();
        let mut fixture = Fixture::new();
        for i in 0..10 {
            fixture.history.push(Action::new(vec![i as f64; N])).unwrap();
            let obs = ready(assembler.assemble(&fixture.inputs()).unwrap());
            assert_eq!(obs.len(), assembler.dim());
        }
    }
}
