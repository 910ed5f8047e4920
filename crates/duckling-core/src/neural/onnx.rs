//! ONNX policy inference via `ort`
//!
//! Requires the `onnx` feature.

use ort::session::Session;
use ort::value::{TensorRef, ValueType};
use parking_lot::Mutex;
use std::path::Path;

use crate::{Error, Result};

use super::Policy;

const INPUT_CANDIDATES: &[&str] = &["obs", "observation"];
const OUTPUT_CANDIDATES: &[&str] = &["continuous_actions", "action", "actions"];

/// A policy backed by an ONNX Runtime session
///
/// The model takes a `[1, obs_dim]` float tensor and returns `[1, action_dim]`.
/// Named inputs and outputs are preferred; otherwise the first of each is used.
pub struct OnnxPolicy {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_dim: usize,
    output_dim: usize,
    buffer: Vec<f32>,
}

impl std::fmt::Debug for OnnxPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPolicy")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_dim", &self.input_dim)
            .field("output_dim", &self.output_dim)
            .finish_non_exhaustive()
    }
}

impl OnnxPolicy {
    /// Load a model from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ResourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let session: Session = Session::builder()
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| Error::Resource(format!("{}: {}", path.display(), e)))?;

        let input_name = pick_name(session.inputs().iter().map(|i| i.name()), INPUT_CANDIDATES)
            .ok_or_else(|| Error::Resource("model has no inputs".into()))?;
        let output_name =
            pick_name(session.outputs().iter().map(|o| o.name()), OUTPUT_CANDIDATES)
                .ok_or_else(|| Error::Resource("model has no outputs".into()))?;

        let input_dim = session
            .inputs()
            .iter()
            .find(|i| i.name() == input_name)
            .and_then(|i| feature_dim(i.dtype()))
            .ok_or_else(|| Error::Resource(format!("cannot read shape of input '{}'", input_name)))?;
        let output_dim = session
            .outputs()
            .iter()
            .find(|o| o.name() == output_name)
            .and_then(|o| feature_dim(o.dtype()))
            .ok_or_else(|| {
                Error::Resource(format!("cannot read shape of output '{}'", output_name))
            })?;

        tracing::info!(
            "Loaded ONNX policy from {} ({}[{}] -> {}[{}])",
            path.display(),
            input_name,
            input_dim,
            output_name,
            output_dim
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_dim,
            output_dim,
            buffer: vec![0.0; input_dim],
        })
    }
}

impl Policy for OnnxPolicy {
    fn infer(&mut self, observation: &[f64]) -> Result<Vec<f64>> {
        if observation.len() != self.input_dim {
            return Err(Error::Inference(format!(
                "observation has {} values, model expects {}",
                observation.len(),
                self.input_dim
            )));
        }
        for (dst, &src) in self.buffer.iter_mut().zip(observation) {
            *dst = src as f32;
        }

        let input = TensorRef::<f32>::from_array_view(([1_usize, self.input_dim], &*self.buffer))
            .map_err(|e| Error::Inference(e.to_string()))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| Error::Inference(e.to_string()))?;
        let (_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(e.to_string()))?;

        if data.len() < self.output_dim {
            return Err(Error::Inference(format!(
                "model returned {} values, expected {}",
                data.len(),
                self.output_dim
            )));
        }
        Ok(data[..self.output_dim].iter().map(|&v| f64::from(v)).collect())
    }

    fn input_dim(&self) -> Option<usize> {
        Some(self.input_dim)
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn name(&self) -> &str {
        "OnnxPolicy"
    }
}

fn pick_name<'a>(names: impl Iterator<Item = &'a str>, candidates: &[&str]) -> Option<String> {
    let names: Vec<&str> = names.collect();
    candidates
        .iter()
        .find(|c| names.contains(*c))
        .copied()
        .or_else(|| names.first().copied())
        .map(str::to_string)
}

/// Second dimension of a `[batch, features]` tensor
fn feature_dim(dtype: &ValueType) -> Option<usize> {
    match dtype {
        ValueType::Tensor { shape, .. } if shape.len() >= 2 && shape[1] > 0 => {
            Some(shape[1] as usize)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_name_prefers_candidates() {
        let names = ["foo", "obs"];
        assert_eq!(pick_name(names.into_iter(), INPUT_CANDIDATES).as_deref(), Some("obs"));
        let names = ["input_0"];
        assert_eq!(pick_name(names.into_iter(), INPUT_CANDIDATES).as_deref(), Some("input_0"));
        assert!(pick_name(std::iter::empty(), INPUT_CANDIDATES).is_none());
    }

    #[test]
    fn test_missing_model() {
        let err = OnnxPolicy::load("/nonexistent/policy.onnx").unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }
}
