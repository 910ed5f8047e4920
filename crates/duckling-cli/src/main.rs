//! duckling: run a walking policy on a small bipedal robot
//!
//! The servo bus driver is an external collaborator; this binary drives the
//! simulated bus so a policy, a robot config and the command path can be
//! exercised end to end without hardware.
//!
//! Usage:
//!   duckling --model policy.json [OPTIONS]

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use duckling_core::command::{
    select_command_source, CommandSource, GamepadDevice, KeyboardDevice, LineKeyboard,
};
use duckling_core::config::{PidGains, RobotConfig, RuntimeConfig};
use duckling_core::control::WalkController;
use duckling_core::hardware::{
    ImuReading, JointLayout, SimulatedHardware, StaticContacts, StaticImu, NUM_FOOT_CONTACTS,
};
use duckling_core::neural::{DenseMlpPolicy, Policy};
use duckling_core::peripherals::{LoggedPeripheral, PeripheralSet};
use duckling_core::reference_motion::ReferenceMotion;

/// Run a learned walking policy at a fixed rate
#[derive(Parser, Debug)]
#[command(name = "duckling", version)]
#[command(about = "Real-time policy control loop for a small bipedal robot")]
struct Args {
    /// Policy model (.json dense weights, or .onnx with the onnx feature)
    #[arg(long)]
    model: PathBuf,

    /// Robot configuration JSON
    #[arg(long, default_value = "~/duck_config.json")]
    robot_config: PathBuf,

    /// Reference motion JSON
    #[arg(long, default_value = "./polynomial_coefficients.json")]
    reference_motion: PathBuf,

    /// Servo bus serial port
    #[arg(long, default_value = "/dev/ttyACM0")]
    serial_port: String,

    /// Control loop frequency (Hz)
    #[arg(short = 'c', long, default_value_t = 50.0)]
    control_freq: f64,

    /// Action scale applied to policy output
    #[arg(short = 'a', long, default_value_t = 0.25)]
    action_scale: f64,

    /// Proportional gain
    #[arg(short = 'p', default_value_t = 30.0)]
    kp: f64,

    /// Integral gain
    #[arg(short = 'i', default_value_t = 0.0)]
    ki: f64,

    /// Derivative gain
    #[arg(short = 'd', default_value_t = 0.0)]
    kd: f64,

    /// IMU pitch bias (deg)
    #[arg(long, default_value_t = 0.0)]
    pitch_bias: f64,

    /// Read teleoperation commands from a gamepad or the keyboard
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    commands: bool,

    /// Record observations to this file
    #[arg(long)]
    save_obs: Option<PathBuf>,

    /// Replay observations from this file instead of live sensors
    #[arg(long)]
    replay_obs: Option<PathBuf>,

    /// Action filter cutoff (Hz); unfiltered if not set
    #[arg(long)]
    cutoff_frequency: Option<f64>,

    /// Clamp motor targets to this velocity (rad/s)
    #[arg(long)]
    max_velocity: Option<f64>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn runtime_config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig::new()
            .with_serial_port(&self.serial_port)
            .with_control_freq(self.control_freq)
            .with_pid(PidGains::new(self.kp, self.ki, self.kd))
            .with_action_scale(self.action_scale)
            .with_pitch_bias(self.pitch_bias)
            .with_commands(self.commands);
        if let Some(path) = &self.save_obs {
            config = config.with_record_path(path);
        }
        if let Some(path) = &self.replay_obs {
            config = config.with_replay_path(path);
        }
        if let Some(cutoff) = self.cutoff_frequency {
            config = config.with_cutoff_frequency(cutoff);
        }
        if let Some(max_velocity) = self.max_velocity {
            config = config.with_velocity_clamp(max_velocity);
        }
        config
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .context("Failed to install interrupt handler")?;

    let config = args.runtime_config();
    config.validate().context("Invalid runtime configuration")?;

    let robot_path = expand_home(&args.robot_config);
    let robot = RobotConfig::load_or_default(&robot_path)
        .with_context(|| format!("Failed to load robot config {}", robot_path.display()))?;

    let motion = ReferenceMotion::load(&args.reference_motion).with_context(|| {
        format!(
            "Failed to load reference motion {}",
            args.reference_motion.display()
        )
    })?;
    let policy = load_policy(&args.model)
        .with_context(|| format!("Failed to load policy {}", args.model.display()))?;

    tracing::info!("duckling {} starting", duckling_core::VERSION);
    tracing::info!(
        "Servo bus {} not driven by this build, using simulated joints",
        config.serial_port
    );

    let layout = JointLayout::duck();
    let hardware = SimulatedHardware::new(&layout, config.control_freq);
    let peripherals =
        PeripheralSet::from_features(&robot.expression_features, LoggedPeripheral::factory);

    let mut builder = WalkController::builder(config.clone())
        .robot_config(robot)
        .layout(layout)
        .hardware(Arc::new(hardware))
        .imu(Arc::new(StaticImu::new(ImuReading::level())))
        .contacts(Arc::new(StaticContacts::new(vec![1.0; NUM_FOOT_CONTACTS])))
        .policy(policy)
        .peripherals(peripherals)
        .reference_motion(motion);
    if config.commands_enabled {
        builder = builder.command_source(open_commands(config.command_freq)?);
    }

    let mut controller = builder.build().context("Failed to build walk controller")?;
    controller.startup().context("Startup sequence failed")?;
    let stats = controller.run(&interrupt).context("Control loop failed")?;

    tracing::info!(
        "Finished after {} ticks ({} overruns)",
        stats.iterations,
        stats.overruns
    );
    Ok(())
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_policy(path: &Path) -> Result<Box<dyn Policy>> {
    match path.extension().and_then(|e| e.to_str()) {
        #[cfg(feature = "onnx")]
        Some("onnx") => Ok(Box::new(duckling_core::neural::OnnxPolicy::load(path)?)),
        #[cfg(not(feature = "onnx"))]
        Some("onnx") => anyhow::bail!("ONNX models need the `onnx` feature"),
        _ => Ok(Box::new(DenseMlpPolicy::load(path)?)),
    }
}

/// Gamepad if one can be opened, otherwise keys typed on stdin
fn open_commands(command_freq: f64) -> Result<Box<dyn CommandSource>> {
    let source = select_command_source(
        || -> duckling_core::Result<Box<dyn GamepadDevice>> {
            Err(duckling_core::Error::Command(
                "no gamepad driver in this build".into(),
            ))
        },
        || -> duckling_core::Result<Box<dyn KeyboardDevice>> {
            tracing::info!("Type keys and press enter, e.g. `w q`; an empty line releases all");
            Ok(Box::new(LineKeyboard::spawn(BufReader::new(std::io::stdin()))?))
        },
        command_freq,
    )
    .context("No command source available")?;
    Ok(source)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
