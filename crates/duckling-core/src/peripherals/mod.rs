//! Optional expressive peripherals
//!
//! Eyes, projector, speaker and antennas are enabled per robot. The
//! controller addresses them through [`PeripheralSet::try_get`] and
//! [`PeripheralSet::dispatch`]; a peripheral that fails to initialize or to
//! act is logged and disabled for the rest of the run.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::config::ExpressionFeatures;
use crate::{Error, Result};

/// Kinds of expressive peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeripheralKind {
    Eyes,
    Projector,
    Speaker,
    Antennas,
}

impl PeripheralKind {
    pub const ALL: [PeripheralKind; 4] = [
        PeripheralKind::Eyes,
        PeripheralKind::Projector,
        PeripheralKind::Speaker,
        PeripheralKind::Antennas,
    ];

    /// Kinds enabled by a feature set
    pub fn enabled_in(features: &ExpressionFeatures) -> impl Iterator<Item = PeripheralKind> + '_ {
        Self::ALL.into_iter().filter(move |kind| match kind {
            PeripheralKind::Eyes => features.eyes,
            PeripheralKind::Projector => features.projector,
            PeripheralKind::Speaker => features.speaker,
            PeripheralKind::Antennas => features.antennas,
        })
    }
}

impl fmt::Display for PeripheralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeripheralKind::Eyes => "eyes",
            PeripheralKind::Projector => "projector",
            PeripheralKind::Speaker => "speaker",
            PeripheralKind::Antennas => "antennas",
        };
        f.write_str(name)
    }
}

/// A request to a peripheral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PeripheralAction {
    /// Switch on/off (projector)
    Toggle,
    /// Play one sound from the library (speaker)
    PlayRandomSound,
    /// Antenna positions in `[0, 1]`
    SetAntennas { left: f64, right: f64 },
}

/// An expressive peripheral
pub trait Peripheral: Send {
    fn kind(&self) -> PeripheralKind;

    fn act(&mut self, action: PeripheralAction) -> Result<()>;

    /// Release the device at shutdown
    fn stop(&mut self) -> Result<()>;
}

/// The enabled peripherals of one run
#[derive(Default)]
pub struct PeripheralSet {
    devices: Vec<Box<dyn Peripheral>>,
}

impl fmt::Debug for PeripheralSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.devices.iter().map(|d| d.kind()))
            .finish()
    }
}

impl PeripheralSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Construct every enabled peripheral with `factory`
    ///
    /// Construction failures are logged and leave that peripheral disabled.
    pub fn from_features<F>(features: &ExpressionFeatures, mut factory: F) -> Self
    where
        F: FnMut(PeripheralKind) -> Result<Box<dyn Peripheral>>,
    {
        let mut set = Self::empty();
        for kind in PeripheralKind::enabled_in(features) {
            match factory(kind) {
                Ok(device) => {
                    tracing::info!("Enabled {}", kind);
                    set.insert(device);
                }
                Err(e) => tracing::warn!("Failed to initialize {}: {}; disabled", kind, e),
            }
        }
        set
    }

    /// Add a peripheral, replacing one of the same kind
    pub fn insert(&mut self, device: Box<dyn Peripheral>) {
        let kind = device.kind();
        self.devices.retain(|d| d.kind() != kind);
        self.devices.push(device);
    }

    pub fn is_enabled(&self, kind: PeripheralKind) -> bool {
        self.devices.iter().any(|d| d.kind() == kind)
    }

    pub fn enabled(&self) -> impl Iterator<Item = PeripheralKind> + '_ {
        self.devices.iter().map(|d| d.kind())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Get a peripheral if it is enabled
    pub fn try_get(&mut self, kind: PeripheralKind) -> Option<&mut dyn Peripheral> {
        for device in self.devices.iter_mut() {
            if device.kind() == kind {
                return Some(device.as_mut());
            }
        }
        None
    }

    /// Send `action` to `kind` if enabled
    ///
    /// Returns whether the action was carried out. A failing peripheral is
    /// disabled.
    pub fn dispatch(&mut self, kind: PeripheralKind, action: PeripheralAction) -> bool {
        let Some(device) = self.try_get(kind) else {
            return false;
        };
        match device.act(action) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{} failed: {}; disabled for this run", kind, e);
                self.remove(kind);
                false
            }
        }
    }

    /// Stop every peripheral; failures are logged
    pub fn stop_all(&mut self) {
        for device in &mut self.devices {
            if let Err(e) = device.stop() {
                tracing::warn!("Failed to stop {}: {}", device.kind(), e);
            } else {
                tracing::debug!("Stopped {}", device.kind());
            }
        }
    }

    fn remove(&mut self, kind: PeripheralKind) {
        if let Some(idx) = self.devices.iter().position(|d| d.kind() == kind) {
            let mut device = self.devices.remove(idx);
            let _ = device.stop();
        }
    }
}

/// Actions kept by a [`PeripheralLog`]; older ones are dropped
pub const PERIPHERAL_LOG_CAPACITY: usize = 64;

/// Shared log of the most recent requests to a [`LoggedPeripheral`]
#[derive(Debug, Clone, Default)]
pub struct PeripheralLog {
    entries: Arc<Mutex<VecDeque<PeripheralAction>>>,
    stopped: Arc<Mutex<bool>>,
}

impl PeripheralLog {
    /// Logged actions, oldest first
    pub fn actions(&self) -> Vec<PeripheralAction> {
        self.entries.lock().iter().copied().collect()
    }

    fn push(&self, action: PeripheralAction) {
        let mut entries = self.entries.lock();
        if entries.len() == PERIPHERAL_LOG_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(action);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }
}

/// A peripheral without a device behind it that logs every request
///
/// Stands in for real hardware in dry runs and tests. Actions that make no
/// sense for its kind are rejected.
#[derive(Debug)]
pub struct LoggedPeripheral {
    kind: PeripheralKind,
    on: bool,
    log: PeripheralLog,
}

impl LoggedPeripheral {
    pub fn new(kind: PeripheralKind) -> Self {
        Self {
            kind,
            on: false,
            log: PeripheralLog::default(),
        }
    }

    /// Boxed, for use as a [`PeripheralSet::from_features`] factory
    pub fn factory(kind: PeripheralKind) -> Result<Box<dyn Peripheral>> {
        Ok(Box::new(Self::new(kind)))
    }

    pub fn log(&self) -> PeripheralLog {
        self.log.clone()
    }
}

impl Peripheral for LoggedPeripheral {
    fn kind(&self) -> PeripheralKind {
        self.kind
    }

    fn act(&mut self, action: PeripheralAction) -> Result<()> {
        match (self.kind, action) {
            (PeripheralKind::Projector, PeripheralAction::Toggle) => {
                self.on = !self.on;
                tracing::info!("Projector {}", if self.on { "on" } else { "off" });
            }
            (PeripheralKind::Speaker, PeripheralAction::PlayRandomSound) => {
                tracing::info!("Playing a random sound");
            }
            (PeripheralKind::Antennas, PeripheralAction::SetAntennas { left, right }) => {
                if !(0.0..=1.0).contains(&left) || !(0.0..=1.0).contains(&right) {
                    return Err(Error::Peripheral(format!(
                        "antenna positions out of range: {}, {}",
                        left, right
                    )));
                }
                tracing::trace!("Antennas at {:.3}, {:.3}", left, right);
            }
            (kind, action) => {
                return Err(Error::Peripheral(format!(
                    "{} does not support {:?}",
                    kind, action
                )))
            }
        }
        self.log.push(action);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        *self.log.stopped.lock() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_features() -> ExpressionFeatures {
        ExpressionFeatures {
            eyes: true,
            projector: true,
            speaker: true,
            antennas: true,
        }
    }

    #[test]
    fn test_only_enabled_are_built() {
        let features = ExpressionFeatures {
            projector: true,
            ..Default::default()
        };
        let mut set = PeripheralSet::from_features(&features, LoggedPeripheral::factory);
        assert_eq!(set.len(), 1);
        assert!(set.try_get(PeripheralKind::Projector).is_some());
        assert!(set.try_get(PeripheralKind::Speaker).is_none());
        assert!(!set.dispatch(PeripheralKind::Speaker, PeripheralAction::PlayRandomSound));
    }

    #[test]
    fn test_init_failure_disables() {
        let set = PeripheralSet::from_features(&all_features(), |kind| match kind {
            PeripheralKind::Speaker => Err(Error::Peripheral("no audio device".into())),
            other => LoggedPeripheral::factory(other),
        });
        assert_eq!(set.len(), 3);
        assert!(!set.is_enabled(PeripheralKind::Speaker));
    }

    #[test]
    fn test_dispatch_failure_disables() {
        let antennas = LoggedPeripheral::new(PeripheralKind::Antennas);
        let log = antennas.log();
        let mut set = PeripheralSet::empty();
        set.insert(Box::new(antennas));

        assert!(set.dispatch(
            PeripheralKind::Antennas,
            PeripheralAction::SetAntennas { left: 0.5, right: 0.0 }
        ));
        assert!(!set.dispatch(PeripheralKind::Antennas, PeripheralAction::Toggle));
        assert!(!set.is_enabled(PeripheralKind::Antennas));
        assert!(log.is_stopped());
        assert_eq!(log.actions().len(), 1);
    }

    #[test]
    fn test_log_keeps_most_recent() {
        let antennas = LoggedPeripheral::new(PeripheralKind::Antennas);
        let log = antennas.log();
        let mut set = PeripheralSet::empty();
        set.insert(Box::new(antennas));

        for tick in 0..1000 {
            let left = tick as f64 / 1000.0;
            assert!(set.dispatch(
                PeripheralKind::Antennas,
                PeripheralAction::SetAntennas { left, right: 0.0 }
            ));
        }
        let actions = log.actions();
        assert_eq!(actions.len(), PERIPHERAL_LOG_CAPACITY);
        assert_eq!(
            actions.last(),
            Some(&PeripheralAction::SetAntennas { left: 0.999, right: 0.0 })
        );
    }

    #[test]
    fn test_stop_all() {
        let eyes = LoggedPeripheral::new(PeripheralKind::Eyes);
        let projector = LoggedPeripheral::new(PeripheralKind::Projector);
        let logs = [eyes.log(), projector.log()];
        let mut set = PeripheralSet::empty();
        set.insert(Box::new(eyes));
        set.insert(Box::new(projector));

        set.stop_all();
        assert!(logs.iter().all(PeripheralLog::is_stopped));
    }
}
