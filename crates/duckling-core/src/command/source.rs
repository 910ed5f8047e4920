//! Command frames, button edges and the command source interface

use std::fmt;

use crate::neural::COMMAND_DIM;

use super::{InputPoller, Mailbox};

/// Named buttons understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
    LeftBumper,
    DpadUp,
    DpadDown,
}

impl Button {
    pub const COUNT: usize = 7;

    pub const ALL: [Button; Button::COUNT] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::LeftBumper,
        Button::DpadUp,
        Button::DpadDown,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
            Button::LeftBumper => "LB",
            Button::DpadUp => "dpad_up",
            Button::DpadDown => "dpad_down",
        };
        f.write_str(name)
    }
}

/// Pressed state of one button plus whether it was pressed this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    /// Rising edge: pressed now, released in the previous frame
    pub triggered: bool,
    pub is_pressed: bool,
}

/// State of every named button for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Buttons {
    states: [ButtonState; Button::COUNT],
}

impl Buttons {
    pub fn get(&self, button: Button) -> ButtonState {
        self.states[button.index()]
    }

    pub fn triggered(&self, button: Button) -> bool {
        self.get(button).triggered
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.get(button).is_pressed
    }

    /// Buttons with a rising edge this frame
    pub fn edges(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|b| self.triggered(*b))
    }
}

/// Raw device reading before edge detection
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawInput {
    pub command: [f64; COMMAND_DIM],
    pub pressed: [bool; Button::COUNT],
    pub left_trigger: f64,
    pub right_trigger: f64,
}

impl RawInput {
    /// A reading with only a command vector
    pub fn with_command(command: [f64; COMMAND_DIM]) -> Self {
        Self {
            command,
            ..Default::default()
        }
    }

    /// Mark `buttons` as held
    pub fn pressing(mut self, buttons: &[Button]) -> Self {
        for button in buttons {
            self.pressed[button.index()] = true;
        }
        self
    }

    pub fn with_triggers(mut self, left: f64, right: f64) -> Self {
        self.left_trigger = left;
        self.right_trigger = right;
        self
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button.index()]
    }

    pub(crate) fn set_pressed(&mut self, button: Button, pressed: bool) {
        self.pressed[button.index()] = pressed;
    }
}

/// Latest teleoperation command with button edges
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CommandFrame {
    /// `[vx, vy, yaw, neck_pitch, head_pitch, head_yaw, head_roll]`
    pub command: [f64; COMMAND_DIM],
    pub buttons: Buttons,
    pub left_trigger: f64,
    pub right_trigger: f64,
}

/// Turns pressed states into rising edges
///
/// A held button yields exactly one `triggered` frame no matter how many
/// frames it stays down.
#[derive(Debug, Clone, Default)]
pub struct ButtonEdgeDetector {
    previous: [bool; Button::COUNT],
}

impl ButtonEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, pressed: &[bool; Button::COUNT]) -> Buttons {
        let mut buttons = Buttons::default();
        for (i, state) in buttons.states.iter_mut().enumerate() {
            state.is_pressed = pressed[i];
            state.triggered = pressed[i] && !self.previous[i];
        }
        self.previous = *pressed;
        buttons
    }
}

/// A teleoperation command source
pub trait CommandSource: Send {
    /// Latest command; never blocks, repeats the previous command when no
    /// new reading has arrived
    fn last_command(&mut self) -> CommandFrame;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// A source whose readings are produced by a background [`InputPoller`]
///
/// The control thread only ever touches the mailbox.
#[derive(Debug)]
pub struct PolledSource {
    name: String,
    mailbox: Mailbox<RawInput>,
    latest: RawInput,
    edges: ButtonEdgeDetector,
    poller: Option<InputPoller>,
}

impl PolledSource {
    pub fn new(name: impl Into<String>, mailbox: Mailbox<RawInput>, poller: Option<InputPoller>) -> Self {
        Self {
            name: name.into(),
            mailbox,
            latest: RawInput::default(),
            edges: ButtonEdgeDetector::new(),
            poller,
        }
    }

    /// Stop the background poller, if any
    pub fn stop(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }
}

impl CommandSource for PolledSource {
    fn last_command(&mut self) -> CommandFrame {
        if let Some(raw) = self.mailbox.take() {
            self.latest = raw;
        }
        CommandFrame {
            command: self.latest.command,
            buttons: self.edges.update(&self.latest.pressed),
            left_trigger: self.latest.left_trigger,
            right_trigger: self.latest.right_trigger,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
