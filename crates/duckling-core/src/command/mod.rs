//! Teleoperation command sources
//!
//! Devices are polled on a background thread into a single-slot
//! [`Mailbox`]; the control thread reads the latest command without
//! blocking and keeps the previous one when nothing new arrived.

mod gamepad;
mod keyboard;
mod mailbox;
mod poller;
mod scripted;
mod source;

pub use gamepad::{
    GamepadDevice, GamepadMapper, GamepadSource, GamepadState, HEAD_PITCH_RANGE, HEAD_ROLL_RANGE,
    HEAD_YAW_RANGE, NECK_PITCH_RANGE, TRIGGER_DEADZONE, X_RANGE, YAW_RANGE, Y_RANGE,
};
pub use keyboard::{map_keys, parse_line, IdleKeyboard, Key, KeyboardDevice, KeyboardSource, LineKeyboard};
pub use mailbox::Mailbox;
pub use poller::{InputPoller, InputReader};
pub use scripted::{ScriptHandle, ScriptedSource};
pub use source::{
    Button, ButtonEdgeDetector, ButtonState, Buttons, CommandFrame, CommandSource, PolledSource,
    RawInput,
};

use crate::Result;

/// Open the gamepad, falling back to the keyboard if it fails to initialize
pub fn select_command_source<G, K>(
    open_gamepad: G,
    open_keyboard: K,
    command_freq: f64,
) -> Result<Box<dyn CommandSource>>
where
    G: FnOnce() -> Result<Box<dyn GamepadDevice>>,
    K: FnOnce() -> Result<Box<dyn KeyboardDevice>>,
{
    match open_gamepad().and_then(|device| GamepadSource::spawn(device, command_freq)) {
        Ok(source) => {
            tracing::info!("Using gamepad for commands");
            Ok(Box::new(source))
        }
        Err(e) => {
            tracing::warn!("No gamepad available ({}), using keyboard instead", e);
            let source = KeyboardSource::spawn(open_keyboard()?, command_freq)?;
            Ok(Box::new(source))
        }
    }
}
