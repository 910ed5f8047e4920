//! The walk controller: a fixed-rate policy loop
//!
//! Each tick reads the latest command, applies button effects, assembles an
//! observation, advances the gait phase, runs the policy and writes filtered
//! motor targets to the servo bus. Ticks that cannot complete are skipped
//! without touching the history or the targets.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use duckling_core::config::RuntimeConfig;
//! use duckling_core::control::WalkController;
//! use duckling_core::hardware::{ImuReading, JointLayout, SimulatedHardware, StaticContacts, StaticImu};
//! use duckling_core::neural::ZeroPolicy;
//! use duckling_core::reference_motion::ReferenceMotion;
//!
//! let config = RuntimeConfig::default();
//! let layout = JointLayout::duck();
//! let mut controller = WalkController::builder(config.clone())
//!     .hardware(Arc::new(SimulatedHardware::new(&layout, config.control_freq)))
//!     .imu(Arc::new(StaticImu::new(ImuReading::level())))
//!     .contacts(Arc::new(StaticContacts::new(vec![1.0, 1.0])))
//!     .policy(Box::new(ZeroPolicy::new(layout.num_joints())))
//!     .reference_motion(ReferenceMotion::with_period(27)?)
//!     .layout(layout)
//!     .build()?;
//!
//! let interrupt = AtomicBool::new(false);
//! controller.startup()?;
//! let stats = controller.run(&interrupt)?;
//! println!("{} ticks", stats.iterations);
//! # Ok::<(), duckling_core::Error>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::command::{Button, CommandFrame, CommandSource};
use crate::config::{RobotConfig, RuntimeConfig};
use crate::hardware::{
    CalibratedHardware, ContactSensor, HardwareInterface, Imu, ImuCorrection, JointLayout,
};
use crate::math::ActionFilter;
use crate::neural::{
    Action, ActionHistory, Assembled, Observation, ObservationAssembler, ObservationInputs,
    ObservationLayout, Policy, SensorSource, COMMAND_DIM,
};
use crate::peripherals::{PeripheralAction, PeripheralKind, PeripheralSet};
use crate::recording::{ObservationRecorder, ObservationReplay};
use crate::reference_motion::ReferenceMotion;
use crate::{Error, Result};

use super::{
    ControlEvent, ControlState, ControlStateMachine, PhaseGenerator, TargetComposer, TickStats,
    TickTimer, VelocityClamp, OFFSET_STEP,
};

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Paused: nothing read, nothing written
    Paused,
    /// A sensor had no fresh value; nothing changed
    Skipped(SensorSource),
    /// The policy failed or returned a wrong-length action; targets held
    InferenceFailed,
    /// Targets were composed but the servo bus rejected the write
    WriteFailed,
    /// New targets were written
    Actuated,
    /// The replayed recording is exhausted
    ReplayFinished,
    /// The loop has been asked to stop
    ShuttingDown,
}

/// Assembles a [`WalkController`] and checks every part against the others
pub struct WalkControllerBuilder {
    config: RuntimeConfig,
    robot: RobotConfig,
    layout: JointLayout,
    hardware: Option<Arc<dyn HardwareInterface>>,
    imu: Option<Arc<dyn Imu>>,
    contacts: Option<Arc<dyn ContactSensor>>,
    policy: Option<Box<dyn Policy>>,
    commands: Option<Box<dyn CommandSource>>,
    peripherals: PeripheralSet,
    reference_motion: Option<ReferenceMotion>,
}

impl WalkControllerBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            robot: RobotConfig::default(),
            layout: JointLayout::duck(),
            hardware: None,
            imu: None,
            contacts: None,
            policy: None,
            commands: None,
            peripherals: PeripheralSet::empty(),
            reference_motion: None,
        }
    }

    pub fn robot_config(mut self, robot: RobotConfig) -> Self {
        self.robot = robot;
        self
    }

    /// Joint layout (default: the duck)
    pub fn layout(mut self, layout: JointLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn hardware(mut self, hardware: Arc<dyn HardwareInterface>) -> Self {
        self.hardware = Some(hardware);
        self
    }

    pub fn imu(mut self, imu: Arc<dyn Imu>) -> Self {
        self.imu = Some(imu);
        self
    }

    pub fn contacts(mut self, contacts: Arc<dyn ContactSensor>) -> Self {
        self.contacts = Some(contacts);
        self
    }

    pub fn policy(mut self, policy: Box<dyn Policy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Teleoperation source, read only when commands are enabled
    pub fn command_source(mut self, source: Box<dyn CommandSource>) -> Self {
        self.commands = Some(source);
        self
    }

    pub fn peripherals(mut self, peripherals: PeripheralSet) -> Self {
        self.peripherals = peripherals;
        self
    }

    pub fn reference_motion(mut self, motion: ReferenceMotion) -> Self {
        self.reference_motion = Some(motion);
        self
    }

    /// Validate and build
    ///
    /// Every error returned here is fatal; no actuator command has been
    /// issued yet.
    pub fn build(self) -> Result<WalkController> {
        let config = self.config;
        config.validate()?;

        let hwi = self.hardware.ok_or_else(|| missing("hardware interface"))?;
        let imu = self.imu.ok_or_else(|| missing("IMU"))?;
        let contacts = self.contacts.ok_or_else(|| missing("contact sensor"))?;
        let policy = self.policy.ok_or_else(|| missing("policy"))?;
        let motion = self.reference_motion.ok_or_else(|| missing("reference motion"))?;

        let commands = match (config.commands_enabled, self.commands) {
            (true, Some(source)) => {
                tracing::info!("Reading commands from {}", source.name());
                Some(source)
            }
            (true, None) => return Err(missing("command source")),
            (false, Some(source)) => {
                tracing::debug!("Commands disabled, ignoring {}", source.name());
                None
            }
            (false, None) => None,
        };

        let layout = self.layout;
        let hwi = CalibratedHardware::wrap(hwi, &layout, &self.robot.joints_offsets)?;
        let num_joints = layout.num_joints();

        if policy.output_dim() != num_joints {
            return Err(Error::Config(format!(
                "policy '{}' produces {} actions for {} joints",
                policy.name(),
                policy.output_dim(),
                num_joints
            )));
        }

        let obs_layout = ObservationLayout::duck(num_joints, contacts.num_contacts());
        let obs_dim = obs_layout.total_dim();
        if let Some(input_dim) = policy.input_dim() {
            if input_dim != obs_dim {
                return Err(Error::Config(format!(
                    "policy '{}' expects {} observations, layout has {}",
                    policy.name(),
                    input_dim,
                    obs_dim
                )));
            }
        }

        let replay = match &config.replay_path {
            Some(path) => {
                let replay = ObservationReplay::load(path)?;
                if let Some(dim) = replay.dim() {
                    if dim != obs_dim {
                        return Err(Error::Resource(format!(
                            "recorded observations have length {}, expected {}",
                            dim, obs_dim
                        )));
                    }
                }
                Some(replay)
            }
            None => None,
        };
        let recorder = config.record_path.as_ref().map(ObservationRecorder::new);

        let mut composer = TargetComposer::new(&layout, config.action_scale);
        if let Some(cutoff) = config.cutoff_frequency {
            let filter = ActionFilter::new(num_joints, config.control_freq, cutoff)?;
            composer = composer.with_filter(filter, config.filter_warmup)?;
        }
        if let Some(max_velocity) = config.velocity_clamp {
            composer =
                composer.with_velocity_clamp(VelocityClamp::new(max_velocity, config.control_freq)?);
        }

        let phase = PhaseGenerator::new(
            motion.steps_in_period(),
            self.robot.phase_frequency_factor_offset,
        )?;
        let timer = TickTimer::new(config.control_freq)?;
        let assembler = ObservationAssembler::new(obs_layout, layout.init_pose().to_vec());
        let imu_correction = ImuCorrection::new(config.pitch_bias_deg, self.robot.imu_upside_down);

        tracing::info!(
            "Walk controller ready: {} joints, {} observations, policy '{}', {} Hz on {}",
            num_joints,
            obs_dim,
            policy.name(),
            config.control_freq,
            hwi.name()
        );

        Ok(WalkController {
            hwi,
            imu,
            imu_correction,
            contacts,
            policy,
            commands,
            peripherals: self.peripherals,
            history: ActionHistory::new(num_joints),
            assembler,
            composer,
            phase,
            state: ControlStateMachine::new(self.robot.start_paused),
            command: [0.0; COMMAND_DIM],
            recorder,
            replay,
            timer,
            started: Instant::now(),
            actuated: 0,
            consumed: 0,
            layout,
            config,
        })
    }
}

fn missing(part: &str) -> Error {
    Error::Config(format!("walk controller has no {}", part))
}

/// Fixed-rate policy controller
pub struct WalkController {
    config: RuntimeConfig,
    layout: JointLayout,
    hwi: Arc<dyn HardwareInterface>,
    imu: Arc<dyn Imu>,
    imu_correction: ImuCorrection,
    contacts: Arc<dyn ContactSensor>,
    policy: Box<dyn Policy>,
    commands: Option<Box<dyn CommandSource>>,
    peripherals: PeripheralSet,
    assembler: ObservationAssembler,
    history: ActionHistory,
    composer: TargetComposer,
    phase: PhaseGenerator,
    state: ControlStateMachine,
    command: [f64; COMMAND_DIM],
    recorder: Option<ObservationRecorder>,
    replay: Option<ObservationReplay>,
    timer: TickTimer,
    started: Instant,
    actuated: usize,
    /// Ticks that produced an observation; indexes the recording and the replay
    consumed: usize,
}

impl WalkController {
    pub fn builder(config: RuntimeConfig) -> WalkControllerBuilder {
        WalkControllerBuilder::new(config)
    }

    /// Set gains, enable torque and let the robot settle
    pub fn startup(&mut self) -> Result<()> {
        let n = self.layout.num_joints();
        let mut kp = vec![self.config.pid.p; n];
        kp[self.layout.head_range()].fill(self.config.head_kp);
        let kd = vec![self.config.pid.d; n];

        self.hwi.set_gains(&kp, &kd)?;
        self.hwi.enable_torque()?;
        tracing::info!("Torque enabled, settling for {:?}", self.config.startup_settle);
        if !self.config.startup_settle.is_zero() {
            thread::sleep(self.config.startup_settle);
        }
        Ok(())
    }

    /// Run until interrupted or the replay runs out, then shut down
    ///
    /// `interrupt` is checked at the start of every tick. Shutdown runs even
    /// when a tick fails fatally; the fatal error is returned afterwards.
    pub fn run(&mut self, interrupt: &AtomicBool) -> Result<TickStats> {
        tracing::info!("Starting");
        self.started = Instant::now();
        let result = self.run_loop(interrupt);
        let shutdown = self.shutdown();
        result?;
        shutdown?;
        Ok(*self.timer.stats())
    }

    fn run_loop(&mut self, interrupt: &AtomicBool) -> Result<()> {
        loop {
            if interrupt.load(Ordering::Relaxed) {
                self.state.handle(ControlEvent::Interrupt);
            }
            self.timer.begin();
            match self.tick()? {
                TickOutcome::ShuttingDown | TickOutcome::ReplayFinished => return Ok(()),
                TickOutcome::Paused => thread::sleep(self.config.pause_poll_interval),
                _ => {
                    let timing = self.timer.finish();
                    self.timer.pace(timing);
                }
            }
        }
    }

    /// Run one tick without pacing
    ///
    /// Only fatal errors are returned; everything recoverable is reported
    /// through the outcome.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.state.is_terminal() {
            return Ok(TickOutcome::ShuttingDown);
        }

        if let Some(source) = self.commands.as_mut() {
            let frame = source.last_command();
            self.apply_frame(&frame);
        }

        if self.state.is_paused() {
            self.timer.stats_mut().record_paused();
            return Ok(TickOutcome::Paused);
        }

        let observation = match self.observe()? {
            Assembled::Ready(observation) => observation,
            Assembled::NotReady(source) => {
                tracing::debug!("No fresh {}, skipping tick", source);
                self.timer.stats_mut().record_skipped();
                return Ok(TickOutcome::Skipped(source));
            }
        };

        self.phase.advance();

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.push(&observation);
        }

        let observation = match &self.replay {
            Some(replay) => match replay.get(self.consumed) {
                Some(recorded) => recorded.clone(),
                None => {
                    tracing::info!("Replay finished after {} observations", self.consumed);
                    return Ok(TickOutcome::ReplayFinished);
                }
            },
            None => observation,
        };
        self.consumed += 1;

        let action = match self.infer(&observation)? {
            Some(action) => action,
            None => {
                self.timer.stats_mut().record_failed();
                return Ok(TickOutcome::InferenceFailed);
            }
        };
        self.history.push(Action::new(action))?;

        let elapsed = self.started.elapsed();
        let targets = self
            .composer
            .compose(self.history.last().as_slice(), &self.command, elapsed)?;

        if let Err(e) = self.hwi.set_targets(&self.layout.targets(targets)) {
            tracing::warn!("Failed to write motor targets: {}", e);
            self.timer.stats_mut().record_failed();
            return Ok(TickOutcome::WriteFailed);
        }

        self.actuated += 1;
        Ok(TickOutcome::Actuated)
    }

    /// Stop peripherals and the contact sensor, save the recording
    ///
    /// Torque stays enabled so the motors hold the last target.
    pub fn shutdown(&mut self) -> Result<()> {
        self.state.handle(ControlEvent::Interrupt);
        self.peripherals.stop_all();
        self.contacts.stop();

        let saved = match &self.recorder {
            Some(recorder) => recorder.save(),
            None => Ok(()),
        };
        if let Err(e) = &saved {
            tracing::error!("Failed to save observations: {}", e);
        }

        self.timer.stats().log_summary();
        tracing::info!("TURNING OFF");
        saved
    }

    fn apply_frame(&mut self, frame: &CommandFrame) {
        self.command = frame.command;
        let buttons = &frame.buttons;

        if buttons.triggered(Button::DpadUp) {
            self.phase.nudge_offset(OFFSET_STEP);
        }
        if buttons.triggered(Button::DpadDown) {
            self.phase.nudge_offset(-OFFSET_STEP);
        }
        self.phase.set_sprint(buttons.is_pressed(Button::LeftBumper));

        if buttons.triggered(Button::X) {
            self.peripherals
                .dispatch(PeripheralKind::Projector, PeripheralAction::Toggle);
        }
        if buttons.triggered(Button::B) {
            self.peripherals
                .dispatch(PeripheralKind::Speaker, PeripheralAction::PlayRandomSound);
        }
        // Antennas are crossed: the right trigger drives the left antenna
        self.peripherals.dispatch(
            PeripheralKind::Antennas,
            PeripheralAction::SetAntennas {
                left: frame.right_trigger,
                right: frame.left_trigger,
            },
        );

        if buttons.triggered(Button::A) {
            if let Some(transition) = self.state.handle(ControlEvent::TogglePause) {
                match transition.to {
                    ControlState::Paused => tracing::info!("PAUSE"),
                    _ => tracing::info!("UNPAUSE"),
                }
            }
        }
    }

    fn observe(&self) -> Result<Assembled> {
        let ignore = self.layout.ignored();
        let imu = self.imu.read().map(|r| self.imu_correction.apply(r));
        let positions = self.hwi.get_positions(ignore);
        let velocities = self.hwi.get_velocities(ignore);
        let contacts = self.contacts.read();

        self.assembler.assemble(&ObservationInputs {
            imu,
            positions: positions.as_deref(),
            velocities: velocities.as_deref(),
            command: &self.command,
            history: &self.history,
            motor_targets: self.composer.motor_targets(),
            contacts: contacts.as_deref(),
            phase: self.phase.features(),
        })
    }

    /// Run the policy; `None` if this tick's inference is unusable
    fn infer(&mut self, observation: &Observation) -> Result<Option<Vec<f64>>> {
        match self.policy.infer(observation.as_slice()) {
            Ok(action) if action.len() == self.layout.num_joints() => Ok(Some(action)),
            Ok(action) => {
                tracing::error!(
                    "Policy returned {} actions for {} joints",
                    action.len(),
                    self.layout.num_joints()
                );
                Ok(None)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                tracing::error!("Inference failed: {}", e);
                Ok(None)
            }
        }
    }

    pub fn state(&self) -> ControlState {
        self.state.current()
    }

    pub fn layout(&self) -> &JointLayout {
        &self.layout
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Latest command vector
    pub fn command(&self) -> &[f64; COMMAND_DIM] {
        &self.command
    }

    pub fn phase(&self) -> &PhaseGenerator {
        &self.phase
    }

    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    /// Targets last written (head overlay included)
    pub fn motor_targets(&self) -> &[f64] {
        self.composer.motor_targets()
    }

    pub fn observation_dim(&self) -> usize {
        self.assembler.dim()
    }

    pub fn stats(&self) -> &TickStats {
        self.timer.stats()
    }

    /// Ticks that wrote targets
    pub fn actuated_ticks(&self) -> usize {
        self.actuated
    }

    /// Observations recorded so far
    pub fn recorded(&self) -> usize {
        self.recorder.as_ref().map_or(0, ObservationRecorder::len)
    }

    pub fn peripherals(&self) -> &PeripheralSet {
        &self.peripherals
    }

    /// Raise the interrupt event directly, e.g. from a supervisor
    pub fn request_shutdown(&mut self) {
        self.state.handle(ControlEvent::Interrupt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{RawInput, ScriptedSource};
    use crate::hardware::{ImuReading, SimulatedHardware, StaticContacts, StaticImu};
    use crate::neural::{ConstantPolicy, FnPolicy, ZeroPolicy};
    use crate::peripherals::LoggedPeripheral;
    use approx::assert_relative_eq;
    use std::time::Duration;

    struct Rig {
        hw: SimulatedHardware,
        imu: Arc<StaticImu>,
        contacts: Arc<StaticContacts>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                hw: SimulatedHardware::new(&JointLayout::duck(), 50.0),
                imu: Arc::new(StaticImu::new(ImuReading::level())),
                contacts: Arc::new(StaticContacts::new(vec![1.0, 1.0])),
            }
        }

        fn builder(&self, config: RuntimeConfig) -> WalkControllerBuilder {
            WalkController::builder(config.with_startup_settle(Duration::ZERO))
                .hardware(Arc::new(self.hw.clone()))
                .imu(self.imu.clone())
                .contacts(self.contacts.clone())
                .reference_motion(ReferenceMotion::with_period(20).unwrap())
        }
    }

    #[test]
    fn test_missing_parts_are_fatal() {
        let result = WalkController::builder(RuntimeConfig::default()).build();
        assert!(result.err().map_or(false, |e| e.is_fatal()));
    }

    #[test]
    fn test_policy_output_mismatch_is_fatal() {
        let rig = Rig::new();
        let result = rig
            .builder(RuntimeConfig::default())
            .policy(Box::new(ZeroPolicy::new(10)))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_commands_enabled_requires_source() {
        let rig = Rig::new();
        let result = rig
            .builder(RuntimeConfig::default().with_commands(true))
            .policy(Box::new(ZeroPolicy::new(14)))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_startup_sets_head_gains() {
        let rig = Rig::new();
        let mut controller = rig
            .builder(RuntimeConfig::default())
            .policy(Box::new(ZeroPolicy::new(14)))
            .build()
            .unwrap();
        controller.startup().unwrap();

        assert!(rig.hw.is_torque_enabled());
        let (kp, kd) = rig.hw.gains();
        assert_eq!(kp[0], 30.0);
        assert_eq!(kp[5..9], [8.0; 4]);
        assert_eq!(kp[13], 30.0);
        assert_eq!(kd[..14], [0.0; 14]);
    }

    #[test]
    fn test_constant_action_scaled() {
        let rig = Rig::new();
        let mut controller = rig
            .builder(RuntimeConfig::default())
            .policy(Box::new(ConstantPolicy::new(vec![1.0; 14])))
            .build()
            .unwrap();

        assert_eq!(controller.tick().unwrap(), TickOutcome::Actuated);
        let init = controller.layout().init_pose().to_vec();
        for (target, init) in controller.motor_targets().iter().zip(&init) {
            assert_relative_eq!(*target, init + 0.25, epsilon = 1e-12);
        }
        assert_eq!(controller.history().last().as_slice(), &[1.0; 14]);
    }

    #[test]
    fn test_head_command_overlay() {
        let rig = Rig::new();
        let mut command = [0.0; COMMAND_DIM];
        command[3..7].copy_from_slice(&[0.1, 0.2, 0.3, 0.4]);
        let mut controller = rig
            .builder(RuntimeConfig::default().with_commands(true))
            .policy(Box::new(ZeroPolicy::new(14)))
            .command_source(Box::new(ScriptedSource::new([RawInput::with_command(command)])))
            .build()
            .unwrap();

        controller.tick().unwrap();
        let written = rig.hw.last_write().unwrap();
        assert_relative_eq!(written[5], 0.1, epsilon = 1e-12);
        assert_relative_eq!(written[8], 0.4, epsilon = 1e-12);
        assert_relative_eq!(written[0], controller.layout().init_pose()[0], epsilon = 1e-12);
    }

    #[test]
    fn test_inference_failure_holds_targets() {
        let rig = Rig::new();
        let mut calls = 0;
        let policy = FnPolicy::new(14, move |_obs: &[f64]| {
            calls += 1;
            if calls == 2 {
                Err(Error::Inference("diverged".into()))
            } else {
                Ok(vec![0.5; 14])
            }
        });
        let mut controller = rig
            .builder(RuntimeConfig::default())
            .policy(Box::new(policy))
            .build()
            .unwrap();

        assert_eq!(controller.tick().unwrap(), TickOutcome::Actuated);
        let targets = controller.motor_targets().to_vec();
        assert_eq!(controller.tick().unwrap(), TickOutcome::InferenceFailed);
        assert_eq!(controller.motor_targets(), targets.as_slice());
        assert_eq!(rig.hw.write_count(), 1);
        assert_eq!(controller.stats().failed, 1);
    }

    #[test]
    fn test_wrong_action_length_fails_tick() {
        let rig = Rig::new();
        let policy = FnPolicy::new(14, |_obs: &[f64]| Ok(vec![0.0; 3]));
        let mut controller = rig
            .builder(RuntimeConfig::default())
            .policy(Box::new(policy))
            .build()
            .unwrap();

        assert_eq!(controller.tick().unwrap(), TickOutcome::InferenceFailed);
        assert_eq!(rig.hw.write_count(), 0);
        assert_eq!(controller.history().last().as_slice(), &[0.0; 14]);
    }

    #[test]
    fn test_bus_dropout_skips_tick() {
        let rig = Rig::new();
        let mut controller = rig
            .builder(RuntimeConfig::default())
            .policy(Box::new(ZeroPolicy::new(14)))
            .build()
            .unwrap();

        controller.tick().unwrap();
        rig.hw.set_available(false);
        // Reads fail first, so the tick is skipped rather than failed
        assert_eq!(
            controller.tick().unwrap(),
            TickOutcome::Skipped(SensorSource::JointPositions)
        );
        rig.hw.set_available(true);
        assert_eq!(controller.tick().unwrap(), TickOutcome::Actuated);
        assert_eq!(controller.actuated_ticks(), 2);
    }

    #[test]
    fn test_buttons_drive_phase_and_peripherals() {
        let rig = Rig::new();
        let projector = LoggedPeripheral::new(PeripheralKind::Projector);
        let antennas = LoggedPeripheral::new(PeripheralKind::Antennas);
        let (projector_log, antenna_log) = (projector.log(), antennas.log());
        let mut peripherals = PeripheralSet::empty();
        peripherals.insert(Box::new(projector));
        peripherals.insert(Box::new(antennas));

        let script = [
            RawInput::default()
                .pressing(&[Button::X, Button::DpadUp, Button::LeftBumper])
                .with_triggers(0.2, 0.8),
            RawInput::default().pressing(&[Button::X, Button::LeftBumper]),
            RawInput::default(),
        ];
        let mut controller = rig
            .builder(RuntimeConfig::default().with_commands(true))
            .policy(Box::new(ZeroPolicy::new(14)))
            .command_source(Box::new(ScriptedSource::new(script)))
            .peripherals(peripherals)
            .build()
            .unwrap();

        controller.tick().unwrap();
        assert_relative_eq!(controller.phase().frequency_offset(), OFFSET_STEP);
        assert_relative_eq!(controller.phase().frequency_factor(), 1.3);
        assert_eq!(
            antenna_log.actions()[0],
            PeripheralAction::SetAntennas { left: 0.8, right: 0.2 }
        );

        // X still held: no second toggle
        controller.tick().unwrap();
        controller.tick().unwrap();
        assert_eq!(projector_log.actions(), vec![PeripheralAction::Toggle]);
        assert_relative_eq!(controller.phase().frequency_factor(), 1.0);
        assert_relative_eq!(controller.phase().frequency_offset(), OFFSET_STEP);
    }

    #[test]
    fn test_start_paused_then_unpause() {
        let rig = Rig::new();
        let robot = RobotConfig {
            start_paused: true,
            ..Default::default()
        };
        let script = [
            RawInput::default(),
            RawInput::default().pressing(&[Button::A]),
            RawInput::default(),
        ];
        let mut controller = rig
            .builder(RuntimeConfig::default().with_commands(true))
            .robot_config(robot)
            .policy(Box::new(ZeroPolicy::new(14)))
            .command_source(Box::new(ScriptedSource::new(script)))
            .build()
            .unwrap();

        assert_eq!(controller.state(), ControlState::Paused);
        assert_eq!(controller.tick().unwrap(), TickOutcome::Paused);
        assert_eq!(controller.tick().unwrap(), TickOutcome::Actuated);
        assert_eq!(controller.state(), ControlState::Running);
        assert_eq!(controller.stats().paused, 1);
    }

    #[test]
    fn test_run_stops_on_interrupt() {
        let rig = Rig::new();
        let mut controller = rig
            .builder(RuntimeConfig::default())
            .policy(Box::new(ZeroPolicy::new(14)))
            .build()
            .unwrap();

        let interrupt = AtomicBool::new(true);
        let stats = controller.run(&interrupt).unwrap();
        assert_eq!(stats.iterations, 0);
        assert_eq!(controller.state(), ControlState::ShuttingDown);
        assert_eq!(controller.tick().unwrap(), TickOutcome::ShuttingDown);
    }

    /// Observations seen by a zero policy over `ticks` ticks
    fn observed_with_offsets(offsets: &[(&str, f64)], ticks: usize) -> (Vec<Vec<f64>>, Rig) {
        let rig = Rig::new();
        let mut robot = RobotConfig::default();
        for (name, offset) in offsets {
            robot.joints_offsets.insert(name.to_string(), *offset);
        }
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let policy = FnPolicy::new(14, move |obs: &[f64]| {
            sink.lock().push(obs.to_vec());
            Ok(vec![0.0; 14])
        });
        let mut controller = rig
            .builder(RuntimeConfig::default())
            .robot_config(robot)
            .policy(Box::new(policy))
            .build()
            .unwrap();
        for _ in 0..ticks {
            assert_eq!(controller.tick().unwrap(), TickOutcome::Actuated);
        }
        let observed = seen.lock().clone();
        (observed, rig)
    }

    #[test]
    fn test_offsets_applied_at_the_bus() {
        let (plain, _) = observed_with_offsets(&[], 3);
        let (calibrated, rig) = observed_with_offsets(&[("left_knee", 0.1)], 3);

        let targets = ObservationLayout::duck(14, 2).range_of("motor_targets").unwrap();
        for (a, b) in plain.iter().zip(&calibrated) {
            assert_eq!(a[targets.clone()], b[targets.clone()]);
        }

        // Only the bus sees the offset
        let knee = JointLayout::duck().init_pose()[3];
        let written = rig.hw.last_write().unwrap();
        assert_relative_eq!(written[3], knee + 0.1, epsilon = 1e-12);
        assert_relative_eq!(written[0], JointLayout::duck().init_pose()[0], epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_offset_is_fatal() {
        let rig = Rig::new();
        let mut robot = RobotConfig::default();
        robot.joints_offsets.insert("tail".into(), 0.1);
        let result = rig
            .builder(RuntimeConfig::default())
            .robot_config(robot)
            .policy(Box::new(ZeroPolicy::new(14)))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
