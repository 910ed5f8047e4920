//! Observation recording and replay
//!
//! A recording is a JSON array with one observation array per actuated
//! tick. Replaying it feeds the same observations to the policy, which makes
//! the produced motor targets reproducible.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::neural::Observation;
use crate::{Error, Result};

/// Accumulates observations for one run
#[derive(Debug, Clone)]
pub struct ObservationRecorder {
    path: PathBuf,
    observations: Vec<Vec<f64>>,
}

impl ObservationRecorder {
    /// Record into `path`, written by [`save`](Self::save)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            observations: Vec::new(),
        }
    }

    pub fn push(&mut self, observation: &Observation) {
        self.observations.push(observation.as_slice().to_vec());
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every recorded observation
    pub fn save(&self) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.observations)?;
        writer.flush()?;
        tracing::info!(
            "Saved {} observations to {}",
            self.observations.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// A recorded observation sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationReplay {
    observations: Vec<Observation>,
}

impl ObservationReplay {
    /// Load a recording
    ///
    /// Every observation must have the same length.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ResourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let reader = BufReader::new(File::open(path)?);
        let raw: Vec<Vec<f64>> = serde_json::from_reader(reader)
            .map_err(|e| Error::Resource(format!("{}: {}", path.display(), e)))?;
        let replay = Self::from_observations(raw.into_iter().map(Observation::new).collect())?;
        tracing::info!("Replaying {} observations from {}", replay.len(), path.display());
        Ok(replay)
    }

    pub fn from_observations(observations: Vec<Observation>) -> Result<Self> {
        if let Some(first) = observations.first() {
            let dim = first.len();
            if let Some((i, obs)) = observations.iter().enumerate().find(|(_, o)| o.len() != dim) {
                return Err(Error::Resource(format!(
                    "observation {} has length {}, expected {}",
                    i,
                    obs.len(),
                    dim
                )));
            }
        }
        Ok(Self { observations })
    }

    /// Observation length, if the recording is not empty
    pub fn dim(&self) -> Option<usize> {
        self.observations.first().map(Observation::len)
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
