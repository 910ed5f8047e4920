//! Gamepad command source
//!
//! Sticks drive the walking velocity command. `Y` switches to head mode,
//! where the same sticks drive head pitch, yaw and roll instead.

use crate::math::scale_asymmetric;
use crate::neural::COMMAND_DIM;
use crate::Result;

use super::{Button, CommandFrame, CommandSource, InputPoller, InputReader, Mailbox, PolledSource, RawInput};

/// Forward velocity range (m/s)
pub const X_RANGE: [f64; 2] = [-0.15, 0.15];
/// Lateral velocity range (m/s)
pub const Y_RANGE: [f64; 2] = [-0.2, 0.2];
/// Yaw rate range (rad/s)
pub const YAW_RANGE: [f64; 2] = [-1.0, 1.0];

// rad
pub const NECK_PITCH_RANGE: [f64; 2] = [-0.34, 1.1];
pub const HEAD_PITCH_RANGE: [f64; 2] = [-0.78, 0.3];
pub const HEAD_YAW_RANGE: [f64; 2] = [-0.5, 0.5];
pub const HEAD_ROLL_RANGE: [f64; 2] = [-0.5, 0.5];

/// Trigger readings below this are reported as zero
pub const TRIGGER_DEADZONE: f64 = 0.1;

/// One raw gamepad reading
///
/// Axes are in the device convention: `[-1, 1]`, stick up and stick left
/// negative, triggers at rest `-1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GamepadState {
    pub left_stick: [f64; 2],
    pub right_stick: [f64; 2],
    pub left_trigger: f64,
    pub right_trigger: f64,
    pub buttons: [bool; Button::COUNT],
}

impl Default for GamepadState {
    fn default() -> Self {
        Self {
            left_stick: [0.0; 2],
            right_stick: [0.0; 2],
            left_trigger: -1.0,
            right_trigger: -1.0,
            buttons: [false; Button::COUNT],
        }
    }
}

/// A physical gamepad
pub trait GamepadDevice: Send {
    fn poll(&mut self) -> Result<GamepadState>;
}

impl<D: GamepadDevice + ?Sized> GamepadDevice for Box<D> {
    fn poll(&mut self) -> Result<GamepadState> {
        (**self).poll()
    }
}

#[inline]
fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn trigger(axis: f64) -> f64 {
    let value = round3((axis + 1.0) / 2.0);
    if value < TRIGGER_DEADZONE {
        0.0
    } else {
        value
    }
}

/// Maps gamepad readings to command vectors
#[derive(Debug, Clone, Default)]
pub struct GamepadMapper {
    head_mode: bool,
    only_head: bool,
    prev_y: bool,
    command: [f64; COMMAND_DIM],
}

impl GamepadMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permanently drive the head; `Y` no longer switches modes
    pub fn head_only() -> Self {
        Self {
            head_mode: true,
            only_head: true,
            ..Self::default()
        }
    }

    pub fn is_head_mode(&self) -> bool {
        self.head_mode
    }

    pub fn map(&mut self, state: &GamepadState) -> RawInput {
        let y_pressed = state.buttons[Button::Y as usize];
        if y_pressed && !self.prev_y && !self.only_head {
            self.head_mode = !self.head_mode;
            tracing::info!("Head control mode {}", if self.head_mode { "on" } else { "off" });
        }
        self.prev_y = y_pressed;

        let l_x = -state.left_stick[0];
        let l_y = -state.left_stick[1];
        let r_x = -state.right_stick[0];

        if self.head_mode {
            self.command[0] = 0.0;
            self.command[1] = 0.0;
            self.command[2] = 0.0;
            self.command[3] = 0.0;
            // Head ranges are applied mirrored: positive deflection uses the low bound
            self.command[4] = scale_asymmetric(l_y, HEAD_PITCH_RANGE[1], HEAD_PITCH_RANGE[0]);
            self.command[5] = scale_asymmetric(l_x, HEAD_YAW_RANGE[1], HEAD_YAW_RANGE[0]);
            self.command[6] = scale_asymmetric(r_x, HEAD_ROLL_RANGE[1], HEAD_ROLL_RANGE[0]);
        } else {
            self.command[0] = scale_asymmetric(l_y, X_RANGE[0], X_RANGE[1]);
            self.command[1] = scale_asymmetric(l_x, Y_RANGE[0], Y_RANGE[1]);
            self.command[2] = scale_asymmetric(r_x, YAW_RANGE[0], YAW_RANGE[1]);
        }

        let mut command = self.command;
        for c in &mut command {
            *c = round3(*c);
        }

        RawInput {
            command,
            pressed: state.buttons,
            left_trigger: trigger(state.left_trigger),
            right_trigger: trigger(state.right_trigger),
        }
    }
}

struct GamepadReader<D> {
    device: D,
    mapper: GamepadMapper,
}

impl<D: GamepadDevice> InputReader for GamepadReader<D> {
    fn read(&mut self) -> Result<RawInput> {
        let state = self.device.poll()?;
        Ok(self.mapper.map(&state))
    }
}

/// Gamepad polled in the background at the command rate
#[derive(Debug)]
pub struct GamepadSource {
    inner: PolledSource,
}

impl GamepadSource {
    /// Start polling `device` at `command_freq` Hz
    pub fn spawn<D>(device: D, command_freq: f64) -> Result<Self>
    where
        D: GamepadDevice + 'static,
    {
        Self::spawn_with_mapper(device, GamepadMapper::new(), command_freq)
    }

    pub fn spawn_with_mapper<D>(device: D, mapper: GamepadMapper, command_freq: f64) -> Result<Self>
    where
        D: GamepadDevice + 'static,
    {
        let mailbox = Mailbox::new();
        let reader = GamepadReader { device, mapper };
        let poller = InputPoller::spawn("gamepad", reader, command_freq, mailbox.clone())?;
        Ok(Self {
            inner: PolledSource::new("gamepad", mailbox, Some(poller)),
        })
    }
}

impl CommandSource for GamepadSource {
    fn last_command(&mut self) -> CommandFrame {
        self.inner.last_command()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
