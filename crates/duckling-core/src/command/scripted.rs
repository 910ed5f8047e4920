//! Scripted command source for tests and dry runs

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{ButtonEdgeDetector, CommandFrame, CommandSource, RawInput};

/// Plays back queued readings, one per call
///
/// When the queue runs dry the last reading is repeated, so a held button
/// stays held without re-triggering.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    queue: Arc<Mutex<VecDeque<RawInput>>>,
    latest: RawInput,
    edges: ButtonEdgeDetector,
}

/// Handle for queueing readings into a [`ScriptedSource`] after it has been
/// handed to a controller
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    queue: Arc<Mutex<VecDeque<RawInput>>>,
}

impl ScriptHandle {
    pub fn push(&self, raw: RawInput) {
        self.queue.lock().push_back(raw);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = RawInput>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Default::default()
        }
    }

    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            queue: Arc::clone(&self.queue),
        }
    }
}

impl CommandSource for ScriptedSource {
    fn last_command(&mut self) -> CommandFrame {
        if let Some(raw) = self.queue.lock().pop_front() {
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
        "scripted"
    }
}
