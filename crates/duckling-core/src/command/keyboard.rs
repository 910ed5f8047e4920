//! Keyboard command source
//!
//! | Keys            | Effect                       |
//! |-----------------|------------------------------|
//! | `W` / `S`       | forward / backward           |
//! | `A` / `D`       | left / right                 |
//! | `Q` / `E`       | turn left / right            |
//! | arrows          | head pitch / yaw, ±0.5 rad   |
//! | `Space`         | A (pause)                    |
//! | `LShift`        | B (sound)                    |
//! | `X`, `Y`        | X (projector) and right trigger, Y |
//! | `LCtrl`         | LB (sprint)                  |
//! | `R` / `F`       | d-pad up / down              |
//! | `Z`             | left trigger                 |

use std::io::BufRead;
use std::thread;

use crate::neural::COMMAND_DIM;
use crate::Result;

use super::gamepad::{X_RANGE, YAW_RANGE, Y_RANGE};
use super::{Button, CommandFrame, CommandSource, InputPoller, InputReader, Mailbox, PolledSource, RawInput};

/// Head command per arrow key (rad)
const HEAD_STEP: f64 = 0.5;

/// Keys with a meaning for the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    S,
    A,
    D,
    Q,
    E,
    Up,
    Down,
    Left,
    Right,
    Space,
    LShift,
    LCtrl,
    X,
    Y,
    R,
    F,
    Z,
}

impl Key {
    /// Parse a key name as typed on a line: a single letter or one of
    /// `up`, `down`, `left`, `right`, `space`, `shift`, `ctrl`
    pub fn from_name(name: &str) -> Option<Key> {
        let key = match name.to_ascii_lowercase().as_str() {
            "w" => Key::W,
            "s" => Key::S,
            "a" => Key::A,
            "d" => Key::D,
            "q" => Key::Q,
            "e" => Key::E,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "space" => Key::Space,
            "shift" | "lshift" => Key::LShift,
            "ctrl" | "lctrl" => Key::LCtrl,
            "x" => Key::X,
            "y" => Key::Y,
            "r" => Key::R,
            "f" => Key::F,
            "z" => Key::Z,
            _ => return None,
        };
        Some(key)
    }
}

/// A keyboard reporting which keys are held
pub trait KeyboardDevice: Send {
    fn pressed_keys(&mut self) -> Result<Vec<Key>>;
}

impl<D: KeyboardDevice + ?Sized> KeyboardDevice for Box<D> {
    fn pressed_keys(&mut self) -> Result<Vec<Key>> {
        (**self).pressed_keys()
    }
}

/// Map held keys to a raw command reading
pub fn map_keys(keys: &[Key]) -> RawInput {
    let held = |k: Key| if keys.contains(&k) { 1.0 } else { 0.0 };

    let vx = held(Key::W) - held(Key::S);
    let vy = held(Key::A) - held(Key::D);
    let yaw = held(Key::Q) - held(Key::E);
    let head_pitch = (held(Key::Up) - held(Key::Down)) * HEAD_STEP;
    let head_yaw = (held(Key::Left) - held(Key::Right)) * HEAD_STEP;

    let mut command = [0.0; COMMAND_DIM];
    command[0] = vx * X_RANGE[1];
    command[1] = vy * Y_RANGE[1];
    command[2] = yaw * YAW_RANGE[1];
    command[4] = head_pitch;
    command[5] = head_yaw;

    let mut raw = RawInput::with_command(command).with_triggers(held(Key::Z), held(Key::X));
    for (key, button) in [
        (Key::Space, Button::A),
        (Key::LShift, Button::B),
        (Key::X, Button::X),
        (Key::Y, Button::Y),
        (Key::LCtrl, Button::LeftBumper),
        (Key::R, Button::DpadUp),
        (Key::F, Button::DpadDown),
    ] {
        raw.set_pressed(button, keys.contains(&key));
    }
    raw
}

struct KeyboardReader<D> {
    device: D,
}

impl<D: KeyboardDevice> InputReader for KeyboardReader<D> {
    fn read(&mut self) -> Result<RawInput> {
        Ok(map_keys(&self.device.pressed_keys()?))
    }
}

/// Keyboard polled in the background at the command rate
#[derive(Debug)]
pub struct KeyboardSource {
    inner: PolledSource,
}

impl KeyboardSource {
    /// Start polling `device` at `command_freq` Hz
    pub fn spawn<D>(device: D, command_freq: f64) -> Result<Self>
    where
        D: KeyboardDevice + 'static,
    {
        let mailbox = Mailbox::new();
        let poller = InputPoller::spawn(
            "keyboard",
            KeyboardReader { device },
            command_freq,
            mailbox.clone(),
        )?;
        Ok(Self {
            inner: PolledSource::new("keyboard", mailbox, Some(poller)),
        })
    }
}

impl CommandSource for KeyboardSource {
    fn last_command(&mut self) -> CommandFrame {
        self.inner.last_command()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// A keyboard with nothing pressed
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleKeyboard;

impl KeyboardDevice for IdleKeyboard {
    fn pressed_keys(&mut self) -> Result<Vec<Key>> {
        Ok(Vec::new())
    }
}

/// Keyboard driven by text lines, e.g. a terminal on stdin
///
/// Each line replaces the set of held keys: `w q` holds forward and turn
/// left, an empty line releases everything. Keys stay held until a line
/// without them arrives, so `space` presses A once; pressing it again takes
/// a line without `space` in between. Unknown names are ignored.
#[derive(Debug)]
pub struct LineKeyboard {
    updates: Mailbox<Vec<Key>>,
    held: Vec<Key>,
}

impl LineKeyboard {
    /// Read lines from `reader` on a detached thread
    ///
    /// The thread ends at end of input; a blocked read cannot be cancelled.
    pub fn spawn<R>(reader: R) -> Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let updates = Mailbox::new();
        let producer = updates.clone();
        thread::Builder::new()
            .name("line-keyboard".into())
            .spawn(move || {
                for line in reader.lines() {
                    match line {
                        Ok(line) => {
                            producer.post(parse_line(&line));
                        }
                        Err(e) => {
                            tracing::warn!("Keyboard input closed: {}", e);
                            break;
                        }
                    }
                }
            })?;
        Ok(Self {
            updates,
            held: Vec::new(),
        })
    }
}

impl KeyboardDevice for LineKeyboard {
    fn pressed_keys(&mut self) -> Result<Vec<Key>> {
        if let Some(keys) = self.updates.take() {
            self.held = keys;
        }
        Ok(self.held.clone())
    }
}

/// Parse one line of key names
pub fn parse_line(line: &str) -> Vec<Key> {
    let mut keys = Vec::new();
    for token in line.split_whitespace() {
        if let Some(key) = Key::from_name(token) {
            keys.push(key);
        } else {
            keys.extend(
                token
                    .chars()
                    .filter_map(|c| Key::from_name(c.encode_utf8(&mut [0; 4]))),
            );
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ButtonEdgeDetector;
    use approx::assert_relative_eq;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    #[test]
    fn test_movement_keys() {
        let raw = map_keys(&[Key::W, Key::D, Key::Q]);
        assert_relative_eq!(raw.command[0], 0.15);
        assert_relative_eq!(raw.command[1], -0.2);
        assert_relative_eq!(raw.command[2], 1.0);

        let raw = map_keys(&[Key::W, Key::S]);
        assert_eq!(raw.command[0], 0.0);
    }

    #[test]
    fn test_head_keys() {
        let raw = map_keys(&[Key::Up, Key::Right]);
        assert_relative_eq!(raw.command[4], 0.5);
        assert_relative_eq!(raw.command[5], -0.5);
    }

    #[test]
    fn test_button_and_trigger_keys() {
        let raw = map_keys(&[Key::Space, Key::LCtrl, Key::R, Key::X]);
        assert!(raw.is_pressed(Button::A));
        assert!(raw.is_pressed(Button::LeftBumper));
        assert!(raw.is_pressed(Button::DpadUp));
        assert!(raw.is_pressed(Button::X));
        assert!(!raw.is_pressed(Button::B));
        assert_eq!(raw.right_trigger, 1.0);
        assert_eq!(raw.left_trigger, 0.0);
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("wq"), vec![Key::W, Key::Q]);
        assert_eq!(parse_line("space up"), vec![Key::Space, Key::Up]);
        assert_eq!(parse_line(" w ? "), vec![Key::W]);
        assert!(parse_line("").is_empty());
    }

    #[test]
    fn test_line_keyboard_latches() {
        let input = Cursor::new(b"w\n".to_vec());
        let mut keyboard = LineKeyboard::spawn(input).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut keys = Vec::new();
        while keys.is_empty() && Instant::now() < deadline {
            keys = keyboard.pressed_keys().unwrap();
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(keys, vec![Key::W]);
        // Still held without new input
        assert_eq!(keyboard.pressed_keys().unwrap(), vec![Key::W]);
    }

    #[test]
    fn test_repeated_line_presses_once() {
        let mut edges = ButtonEdgeDetector::new();
        let pauses: Vec<bool> = ["space", "space", "", "space"]
            .iter()
            .map(|line| edges.update(&map_keys(&parse_line(line)).pressed).triggered(Button::A))
            .collect();
        assert_eq!(pauses, vec![true, false, false, true]);
    }

    #[test]
    fn test_idle_keyboard_source() {
        let mut source = KeyboardSource::spawn(IdleKeyboard, 100.0).unwrap();
        assert_eq!(source.name(), "keyboard");
        let frame = source.last_command();
        assert_eq!(frame.command, [0.0; COMMAND_DIM]);
        assert_eq!(frame.buttons.edges().count(), 0);
    }
}
